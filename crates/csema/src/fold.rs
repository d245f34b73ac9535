//! Best-effort compile-time evaluation of integer constant expressions.
//!
//! Used by the constant classifier (short-circuit operators, conditional
//! branch selection) and by the attribute resolver (`aligned(n)`). Folding
//! is read-only over the context; a compound type that has not been laid
//! out yet simply fails to fold its `sizeof`.

use thiserror::Error;

use crate::ast::{BinaryOp, ExprKind, Expression, LiteralKind, UnaryOp};
use crate::context::Context;
use crate::entity::EntityKind;
use crate::types::TypeKind;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FoldError {
    #[error("expression is not constant")]
    NotConstant,
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),
    #[error("division by zero in constant expression")]
    DivisionByZero,
}

fn fold_literal(kind: LiteralKind, bytes: &[u8]) -> Result<i64, FoldError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| FoldError::InvalidLiteral(String::from_utf8_lossy(bytes).into_owned()))?;
    let parse = |radix| {
        i64::from_str_radix(text, radix)
            .map_err(|_| FoldError::InvalidLiteral(text.to_string()))
    };
    match kind {
        LiteralKind::Integer => parse(10),
        LiteralKind::IntegerOctal => {
            if text.len() <= 1 {
                // a plain "0"
                parse(10)
            } else {
                parse(8)
            }
        }
        LiteralKind::IntegerHexadecimal => parse(16),
        LiteralKind::Character | LiteralKind::WideCharacter => bytes
            .first()
            .map(|&b| i64::from(b))
            .ok_or_else(|| FoldError::InvalidLiteral(String::new())),
        LiteralKind::Boolean => Ok((bytes == b"true") as i64),
        LiteralKind::MsNoop => Ok(0),
        LiteralKind::FloatingPoint | LiteralKind::FloatingPointHexadecimal => {
            Err(FoldError::NotConstant)
        }
    }
}

/// The value of an enumerator: its own expression if it has one, otherwise
/// one more than its predecessor.
fn fold_enum_value(ctx: &Context, entity: crate::entity::EntityId) -> Result<i64, FoldError> {
    let enum_value = match &ctx.entity(entity).kind {
        EntityKind::EnumValue(v) => v,
        _ => return Err(FoldError::NotConstant),
    };
    if let Some(value) = &enum_value.value {
        return fold_constant_to_int(ctx, value);
    }

    let enum_entity = match &ctx.ty(ctx.typeref_target(enum_value.enum_type)).kind {
        TypeKind::Enum(enum_type) => enum_type.entity,
        _ => return Err(FoldError::NotConstant),
    };
    let values = match &ctx.entity(enum_entity).kind {
        EntityKind::Enum(e) => &e.values,
        _ => return Err(FoldError::NotConstant),
    };

    let mut current: i64 = -1;
    for &value_entity in values {
        current = match &ctx.entity(value_entity).kind {
            EntityKind::EnumValue(v) => match &v.value {
                Some(expr) => fold_constant_to_int(ctx, expr)?,
                None => current.wrapping_add(1),
            },
            _ => return Err(FoldError::NotConstant),
        };
        if value_entity == entity {
            return Ok(current);
        }
    }
    Err(FoldError::NotConstant)
}

pub fn fold_constant_to_int(ctx: &Context, expression: &Expression) -> Result<i64, FoldError> {
    match &expression.kind {
        ExprKind::Literal(literal) => fold_literal(literal.kind, &literal.value.bytes),
        ExprKind::EnumValueReference(entity) => fold_enum_value(ctx, *entity),

        ExprKind::Unary(op, value) => {
            let folded = fold_constant_to_int(ctx, value)?;
            match op {
                UnaryOp::Negate => Ok(folded.wrapping_neg()),
                UnaryOp::Plus => Ok(folded),
                UnaryOp::BitwiseNegate => Ok(!folded),
                UnaryOp::Not => Ok((folded == 0) as i64),
                // Value-preserving for the integer cases we care about;
                // target-width truncation is left to the code generator.
                UnaryOp::Cast | UnaryOp::ImplicitCast => {
                    if ctx.is_type_scalar(expression.ty) {
                        Ok(folded)
                    } else {
                        Err(FoldError::NotConstant)
                    }
                }
                _ => Err(FoldError::NotConstant),
            }
        }

        ExprKind::Binary(op, left, right) => {
            use BinaryOp::*;
            match op {
                LogicalAnd => {
                    let l = fold_constant_to_int(ctx, left)?;
                    if l == 0 {
                        return Ok(0);
                    }
                    Ok((fold_constant_to_int(ctx, right)? != 0) as i64)
                }
                LogicalOr => {
                    let l = fold_constant_to_int(ctx, left)?;
                    if l != 0 {
                        return Ok(1);
                    }
                    Ok((fold_constant_to_int(ctx, right)? != 0) as i64)
                }
                _ => {
                    let l = fold_constant_to_int(ctx, left)?;
                    let r = fold_constant_to_int(ctx, right)?;
                    match op {
                        Add => Ok(l.wrapping_add(r)),
                        Sub => Ok(l.wrapping_sub(r)),
                        Mul => Ok(l.wrapping_mul(r)),
                        Div => {
                            if r == 0 {
                                Err(FoldError::DivisionByZero)
                            } else {
                                Ok(l.wrapping_div(r))
                            }
                        }
                        Mod => {
                            if r == 0 {
                                Err(FoldError::DivisionByZero)
                            } else {
                                Ok(l.wrapping_rem(r))
                            }
                        }
                        BitwiseAnd => Ok(l & r),
                        BitwiseOr => Ok(l | r),
                        BitwiseXor => Ok(l ^ r),
                        ShiftLeft => Ok(l.wrapping_shl(r as u32 & 63)),
                        ShiftRight => Ok(l.wrapping_shr(r as u32 & 63)),
                        Equal => Ok((l == r) as i64),
                        NotEqual => Ok((l != r) as i64),
                        Less => Ok((l < r) as i64),
                        LessEqual => Ok((l <= r) as i64),
                        Greater => Ok((l > r) as i64),
                        GreaterEqual => Ok((l >= r) as i64),
                        _ => Err(FoldError::NotConstant),
                    }
                }
            }
        }

        ExprKind::Conditional(conditional) => {
            let condition = fold_constant_to_int(ctx, &conditional.condition)?;
            if condition != 0 {
                match &conditional.true_expression {
                    Some(t) => fold_constant_to_int(ctx, t),
                    // cond ?: f yields the condition value
                    None => Ok(condition),
                }
            } else {
                fold_constant_to_int(ctx, &conditional.false_expression)
            }
        }

        ExprKind::SizeOf(typeprop) => ctx
            .try_type_size(typeprop.ty)
            .map(i64::from)
            .ok_or(FoldError::NotConstant),
        ExprKind::AlignOf(typeprop) => ctx
            .try_type_alignment(typeprop.ty)
            .map(i64::from)
            .ok_or(FoldError::NotConstant),

        ExprKind::BuiltinConstantP(value) => {
            Ok(crate::classify::is_constant_expression(ctx, value) as i64)
        }
        ExprKind::BuiltinTypesCompatibleP { left, right } => {
            // Qualifiers are ignored, per GCC semantics. Hash-consing makes
            // the comparison a kind comparison on the resolved types.
            let l = ctx.ty(ctx.typeref_target(*left)).kind.clone();
            let r = ctx.ty(ctx.typeref_target(*right)).kind.clone();
            Ok((l == r) as i64)
        }

        _ => Err(FoldError::NotConstant),
    }
}

pub fn fold_constant_to_bool(ctx: &Context, expression: &Expression) -> Result<bool, FoldError> {
    Ok(fold_constant_to_int(ctx, expression)? != 0)
}
