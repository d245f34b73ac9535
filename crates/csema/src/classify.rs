//! Classification of constant expressions and address constants.
//!
//! These predicates implement the constant-context rules of C99 6.6: what
//! may appear in array bounds, case labels and static initializers. They
//! are pure queries over the typed AST; unknown or invalid forms classify
//! as non-constant instead of failing.

use crate::ast::{BinaryOp, ExprKind, Expression, Initializer, UnaryOp};
use crate::context::Context;
use crate::entity::{EntityKind, StorageClass};
use crate::fold::fold_constant_to_bool;
use crate::types::{AtomicTypeFlags, TypeKind, TypeRef};

/// The type an expression would have without the usual array-to-pointer
/// and function-to-pointer conversions.
fn unconverted_type(ctx: &Context, expression: &Expression) -> TypeRef {
    match &expression.kind {
        ExprKind::Reference(entity) | ExprKind::EnumValueReference(entity) => {
            match ctx.entity(*entity).declaration() {
                Some(decl) => decl.ty,
                None => expression.ty,
            }
        }
        ExprKind::Select(select) => match ctx.entity(select.member).declaration() {
            Some(decl) => decl.ty,
            None => expression.ty,
        },
        ExprKind::ArrayAccess { array, .. } => {
            let array_type = ctx.typeref_target(unconverted_type(ctx, array));
            match &ctx.ty(array_type).kind {
                TypeKind::Array(a) => a.element_type,
                _ => expression.ty,
            }
        }
        ExprKind::Unary(UnaryOp::Dereference, value) => {
            let value_type = ctx.typeref_target(value.ty);
            match &ctx.ty(value_type).kind {
                TypeKind::Pointer(pointer) => pointer.points_to,
                _ => expression.ty,
            }
        }
        _ => expression.ty,
    }
}

/// Check if the given expression is a call to a builtin function returning
/// a constant result.
fn is_builtin_const_call(ctx: &Context, expression: &Expression) -> bool {
    let call = match &expression.kind {
        ExprKind::Call(call) => call,
        _ => return false,
    };
    let entity = match &call.function.kind {
        ExprKind::Reference(entity) => *entity,
        _ => return false,
    };
    match &ctx.entity(entity).kind {
        EntityKind::Function(function) => function.builtin.is_always_constant(),
        _ => false,
    }
}

fn is_constant_pointer(ctx: &Context, expression: &Expression) -> bool {
    if is_constant_expression(ctx, expression) {
        return true;
    }

    match &expression.kind {
        ExprKind::Unary(UnaryOp::Cast, value) => is_constant_pointer(ctx, value),
        _ => false,
    }
}

fn is_object_with_constant_address(ctx: &Context, expression: &Expression) -> bool {
    match &expression.kind {
        ExprKind::Select(select) => {
            let compound_type = ctx.typeref_target(select.compound.ty);
            if matches!(ctx.ty(compound_type).kind, TypeKind::Pointer(_)) {
                is_constant_pointer(ctx, &select.compound)
            } else {
                is_object_with_constant_address(ctx, &select.compound)
            }
        }
        ExprKind::ArrayAccess { array, index, .. } => {
            is_constant_expression(ctx, index)
                && (is_object_with_constant_address(ctx, array)
                    || is_constant_pointer(ctx, array))
        }
        ExprKind::Unary(UnaryOp::Dereference, value) => is_constant_pointer(ctx, value),
        _ => false,
    }
}

fn is_object_with_linker_constant_address(ctx: &Context, expression: &Expression) -> bool {
    match &expression.kind {
        ExprKind::Unary(UnaryOp::Dereference, value) => is_address_constant(ctx, value),

        ExprKind::Select(select) => {
            let compound_type = ctx.typeref_target(select.compound.ty);
            if matches!(ctx.ty(compound_type).kind, TypeKind::Pointer(_)) {
                // it's a ->
                is_address_constant(ctx, &select.compound)
            } else {
                is_object_with_linker_constant_address(ctx, &select.compound)
            }
        }

        ExprKind::ArrayAccess { array, index, .. } => {
            is_constant_expression(ctx, index) && is_address_constant(ctx, array)
        }

        ExprKind::Reference(entity) => {
            let entity = ctx.entity(*entity);
            match entity.declaration() {
                Some(decl) => match decl.storage_class {
                    StorageClass::None | StorageClass::Extern | StorageClass::Static => {
                        match &entity.kind {
                            EntityKind::Variable(variable) => !variable.thread_local,
                            _ => true,
                        }
                    }
                    StorageClass::Register | StorageClass::Typedef | StorageClass::Auto => false,
                },
                None => false,
            }
        }

        _ => false,
    }
}

/// A pointer cast keeps an address constant when the destination is a
/// pointer or an integer at least as wide as a pointer.
fn cast_keeps_address_constant(ctx: &Context, expression: &Expression, value: &Expression) -> bool {
    let dest = ctx.typeref_target(expression.ty);
    let pointer_like = match &ctx.ty(dest).kind {
        TypeKind::Pointer(_) => true,
        TypeKind::Atomic(akind) => {
            ctx.get_atomic_type_flags(*akind)
                .contains(AtomicTypeFlags::INTEGER)
                && ctx.get_atomic_type_size(*akind)
                    >= ctx.get_atomic_type_size(ctx.get_intptr_kind())
        }
        _ => false,
    };
    if !pointer_like {
        return false;
    }
    is_constant_expression(ctx, value) || is_address_constant(ctx, value)
}

pub fn is_address_constant(ctx: &Context, expression: &Expression) -> bool {
    match &expression.kind {
        ExprKind::StringLiteral(_)
        | ExprKind::WideStringLiteral(_)
        | ExprKind::Funcname(_)
        | ExprKind::LabelAddress(_) => true,

        ExprKind::Unary(UnaryOp::TakeAddress, value) => {
            is_object_with_linker_constant_address(ctx, value)
        }

        ExprKind::Unary(UnaryOp::Dereference, value) => {
            let real_type = ctx.typeref_target(unconverted_type(ctx, value));
            // dereferencing a function is a NOP
            if matches!(ctx.ty(real_type).kind, TypeKind::Function(_)) {
                is_address_constant(ctx, value)
            } else {
                cast_keeps_address_constant(ctx, expression, value)
            }
        }

        ExprKind::Unary(UnaryOp::Cast, value) | ExprKind::Unary(UnaryOp::ImplicitCast, value) => {
            cast_keeps_address_constant(ctx, expression, value)
        }

        ExprKind::Binary(op, left, right)
            if matches!(op, BinaryOp::Add | BinaryOp::Sub) =>
        {
            if ctx.is_type_pointer(left.ty) {
                is_address_constant(ctx, left) && is_constant_expression(ctx, right)
            } else if ctx.is_type_pointer(right.ty) {
                is_constant_expression(ctx, left) && is_address_constant(ctx, right)
            } else {
                false
            }
        }

        ExprKind::Reference(entity) => {
            let entity_ref = ctx.entity(*entity);
            let decl = match entity_ref.declaration() {
                Some(decl) => decl,
                None => return false,
            };
            let ty = ctx.typeref_target(decl.ty);
            match &ctx.ty(ty).kind {
                TypeKind::Function(_) => true,
                TypeKind::Array(_) => is_object_with_linker_constant_address(ctx, expression),
                // Prevent stray errors
                TypeKind::Invalid => true,
                _ => false,
            }
        }

        ExprKind::ArrayAccess { array, index, .. } => {
            let ty = ctx.typeref_target(unconverted_type(ctx, expression));
            matches!(ctx.ty(ty).kind, TypeKind::Array(_))
                && is_constant_expression(ctx, index)
                && is_address_constant(ctx, array)
        }

        ExprKind::Conditional(conditional) => {
            if !is_constant_expression(ctx, &conditional.condition) {
                return false;
            }
            match fold_constant_to_bool(ctx, &conditional.condition) {
                Ok(true) => match &conditional.true_expression {
                    Some(t) => is_address_constant(ctx, t),
                    None => is_address_constant(ctx, &conditional.condition),
                },
                Ok(false) => is_address_constant(ctx, &conditional.false_expression),
                Err(_) => false,
            }
        }

        _ => false,
    }
}

pub fn is_constant_expression(ctx: &Context, expression: &Expression) -> bool {
    match &expression.kind {
        ExprKind::Literal(_)
        | ExprKind::ClassifyType(_)
        | ExprKind::Offsetof(_)
        | ExprKind::AlignOf(_)
        | ExprKind::BuiltinConstantP(_)
        | ExprKind::BuiltinTypesCompatibleP { .. }
        | ExprKind::EnumValueReference(_)
        | ExprKind::Invalid => true,

        ExprKind::SizeOf(typeprop) => {
            let ty = ctx.typeref_target(typeprop.ty);
            match &ctx.ty(ty).kind {
                TypeKind::Array(array) => !array.is_vla(),
                _ => true,
            }
        }

        ExprKind::StringLiteral(_)
        | ExprKind::WideStringLiteral(_)
        | ExprKind::Funcname(_)
        | ExprKind::LabelAddress(_)
        | ExprKind::Select(_)
        | ExprKind::VaStart { .. }
        | ExprKind::VaArg { .. }
        | ExprKind::VaCopy { .. }
        | ExprKind::Statement(_)
        | ExprKind::Reference(_)
        | ExprKind::ArrayAccess { .. }
        | ExprKind::Throw(_) => false,

        ExprKind::Unary(op, value) => match op {
            UnaryOp::TakeAddress => is_object_with_constant_address(ctx, value),
            UnaryOp::Negate | UnaryOp::Plus | UnaryOp::BitwiseNegate | UnaryOp::Not => {
                is_constant_expression(ctx, value)
            }
            UnaryOp::Cast | UnaryOp::ImplicitCast => {
                ctx.is_type_scalar(expression.ty) && is_constant_expression(ctx, value)
            }
            UnaryOp::PostfixIncrement
            | UnaryOp::PostfixDecrement
            | UnaryOp::PrefixIncrement
            | UnaryOp::PrefixDecrement
            | UnaryOp::Assume
            | UnaryOp::Dereference
            | UnaryOp::Delete
            | UnaryOp::DeleteArray => false,
        },

        ExprKind::Call(_) => is_builtin_const_call(ctx, expression),

        ExprKind::Binary(op, left, right) => {
            use BinaryOp::*;
            match op {
                LogicalAnd => {
                    if !is_constant_expression(ctx, left) {
                        return false;
                    }
                    if fold_constant_to_bool(ctx, left) == Ok(false) {
                        return true;
                    }
                    is_constant_expression(ctx, right)
                }
                LogicalOr => {
                    if !is_constant_expression(ctx, left) {
                        return false;
                    }
                    if fold_constant_to_bool(ctx, left) == Ok(true) {
                        return true;
                    }
                    is_constant_expression(ctx, right)
                }
                Assign | MulAssign | DivAssign | ModAssign | AddAssign | SubAssign
                | ShiftLeftAssign | ShiftRightAssign | BitwiseAndAssign | BitwiseXorAssign
                | BitwiseOrAssign | Comma => false,
                _ => {
                    is_constant_expression(ctx, left) && is_constant_expression(ctx, right)
                }
            }
        }

        ExprKind::CompoundLiteral(literal) => {
            is_constant_initializer(ctx, &literal.initializer)
        }

        ExprKind::Conditional(conditional) => {
            if !is_constant_expression(ctx, &conditional.condition) {
                return false;
            }
            match fold_constant_to_bool(ctx, &conditional.condition) {
                Ok(true) => match &conditional.true_expression {
                    Some(t) => is_constant_expression(ctx, t),
                    None => true,
                },
                Ok(false) => is_constant_expression(ctx, &conditional.false_expression),
                // Cannot decide which branch is taken, require both.
                Err(_) => {
                    let true_ok = match &conditional.true_expression {
                        Some(t) => is_constant_expression(ctx, t),
                        None => true,
                    };
                    true_ok && is_constant_expression(ctx, &conditional.false_expression)
                }
            }
        }
    }
}

pub fn is_constant_initializer(ctx: &Context, initializer: &Initializer) -> bool {
    match initializer {
        Initializer::String(_) | Initializer::WideString(_) | Initializer::Designator(_) => true,
        Initializer::Value(value) => is_constant_expression(ctx, value),
        Initializer::List(initializers) => initializers
            .iter()
            .all(|sub| is_constant_initializer(ctx, sub)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LiteralExpr;
    use crate::config::Config;
    use crate::diagnostic::SourcePosition;
    use crate::symbol::StringValue;

    fn pos(ctx: &Context) -> SourcePosition {
        ctx.builtin_position()
    }

    fn int_lit(ctx: &Context, text: &str) -> Expression {
        Expression::new(
            ExprKind::Literal(LiteralExpr {
                kind: crate::ast::LiteralKind::Integer,
                value: StringValue::chars(text),
                suffix: None,
            }),
            ctx.predef.type_int,
            pos(ctx),
        )
    }

    fn reference(ctx: &Context, entity: crate::entity::EntityId, ty: TypeRef) -> Expression {
        Expression::new(ExprKind::Reference(entity), ty, pos(ctx))
    }

    fn binary(ctx: &Context, op: BinaryOp, l: Expression, r: Expression) -> Expression {
        Expression::new(
            ExprKind::Binary(op, Box::new(l), Box::new(r)),
            ctx.predef.type_int,
            pos(ctx),
        )
    }

    #[test]
    fn literals_and_arithmetic_are_constant() {
        let ctx = Context::new(Config::default());
        let e = binary(&ctx, BinaryOp::Add, int_lit(&ctx, "1"), int_lit(&ctx, "2"));
        assert!(is_constant_expression(&ctx, &e));
    }

    #[test]
    fn references_are_not_constant() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let var = ctx.define_variable(x, int);
        let e = reference(&ctx, var, int);
        assert!(!is_constant_expression(&ctx, &e));
    }

    #[test]
    fn short_circuit_and_ignores_right_side() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let var = ctx.define_variable(x, int);
        let non_constant = reference(&ctx, var, int);

        // (0 && x) is constant although x is not
        let and = binary(&ctx, BinaryOp::LogicalAnd, int_lit(&ctx, "0"), non_constant.clone());
        assert!(is_constant_expression(&ctx, &and));

        // (1 && x) is not
        let and = binary(&ctx, BinaryOp::LogicalAnd, int_lit(&ctx, "1"), non_constant.clone());
        assert!(!is_constant_expression(&ctx, &and));

        // (1 || x) is constant
        let or = binary(&ctx, BinaryOp::LogicalOr, int_lit(&ctx, "1"), non_constant);
        assert!(is_constant_expression(&ctx, &or));
    }

    #[test]
    fn conditional_selects_the_taken_branch() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let var = ctx.define_variable(x, int);
        let non_constant = reference(&ctx, var, int);

        let cond = Expression::new(
            ExprKind::Conditional(crate::ast::ConditionalExpr {
                condition: Box::new(int_lit(&ctx, "1")),
                true_expression: Some(Box::new(int_lit(&ctx, "2"))),
                false_expression: Box::new(non_constant.clone()),
            }),
            int,
            pos(&ctx),
        );
        assert!(is_constant_expression(&ctx, &cond));

        let cond = Expression::new(
            ExprKind::Conditional(crate::ast::ConditionalExpr {
                condition: Box::new(int_lit(&ctx, "0")),
                true_expression: Some(Box::new(int_lit(&ctx, "2"))),
                false_expression: Box::new(non_constant),
            }),
            int,
            pos(&ctx),
        );
        assert!(!is_constant_expression(&ctx, &cond));
    }

    #[test]
    fn address_of_static_object_is_address_constant() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let var = ctx.define_variable(x, int);
        if let EntityKind::Variable(v) = &mut ctx.entity_mut(var).kind {
            v.decl.storage_class = StorageClass::Static;
        }
        let int_ptr = ctx.predef.type_int_ptr;

        let addr = Expression::new(
            ExprKind::Unary(UnaryOp::TakeAddress, Box::new(reference(&ctx, var, int))),
            int_ptr,
            pos(&ctx),
        );
        assert!(is_address_constant(&ctx, &addr));

        // an automatic variable's address is not a link-time constant
        if let EntityKind::Variable(v) = &mut ctx.entity_mut(var).kind {
            v.decl.storage_class = StorageClass::Auto;
        }
        assert!(!is_address_constant(&ctx, &addr));
    }

    #[test]
    fn string_literals_are_address_constants() {
        let ctx = Context::new(Config::default());
        let e = Expression::new(
            ExprKind::StringLiteral(StringValue::literal("hi")),
            ctx.predef.type_char_ptr,
            pos(&ctx),
        );
        assert!(is_address_constant(&ctx, &e));
        assert!(!is_constant_expression(&ctx, &e));
    }

    #[test]
    fn constant_initializers() {
        let ctx = Context::new(Config::default());
        let init = Initializer::List(vec![
            Initializer::Value(int_lit(&ctx, "1")),
            Initializer::String(StringValue::literal("x")),
        ]);
        assert!(is_constant_initializer(&ctx, &init));
    }
}
