//! End-to-end scenarios exercising several subsystems together, the way a
//! parser driving this crate would.

use pretty_assertions::assert_eq;

use crate::ast::{
    BinaryOp, CallExpr, CompoundStatement, ExprKind, Expression, Initializer, LiteralExpr,
    LiteralKind, Statement, StatementKind, UnaryOp,
};
use crate::classify::{is_address_constant, is_constant_expression};
use crate::config::Config;
use crate::context::Context;
use crate::entity::{EntityKind, StorageClass, TranslationUnit};
use crate::format_check::check_format;
use crate::mangle::{create_name_linux_elf, create_name_macho, create_name_win32};
use crate::printer::print_ast;
use crate::symbol::StringValue;
use crate::types::{AtomicKind, Qualifiers, Type, TypeKind};

fn int_lit(ctx: &Context, text: &str) -> Expression {
    Expression::new(
        ExprKind::Literal(LiteralExpr {
            kind: LiteralKind::Integer,
            value: StringValue::chars(text),
            suffix: None,
        }),
        ctx.predef.type_int,
        ctx.builtin_position(),
    )
}

/// Builds, lays out and prints a small translation unit:
///
/// ```c
/// struct point { int x; int y; };
/// static int origin_x = 0;
/// void reset(int n) { return; }
/// ```
#[test]
fn small_translation_unit() {
    let mut ctx = Context::new(Config::default());
    let int = ctx.predef.type_int;
    let void = ctx.predef.type_void;

    let point = ctx.intern("point");
    let point = ctx.define_compound(Some(point), false);
    let x = ctx.intern("x");
    let y = ctx.intern("y");
    ctx.add_compound_member(point, x, int);
    ctx.add_compound_member(point, y, int);
    ctx.compound_mut(point).complete = true;
    let point_type = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(point)));

    let origin_x = ctx.intern("origin_x");
    let origin_x = ctx.define_variable(origin_x, int);
    let zero = int_lit(&ctx, "0");
    if let EntityKind::Variable(v) = &mut ctx.entity_mut(origin_x).kind {
        v.decl.declared_storage_class = StorageClass::Static;
        v.decl.storage_class = StorageClass::Static;
        v.initializer = Some(Initializer::Value(zero));
    }

    let fty = ctx.make_function_1_type(void, int);
    let reset = ctx.intern("reset");
    let reset = ctx.define_function(reset, fty);
    let n = ctx.intern("n");
    let pos = ctx.builtin_position();
    let param = ctx.alloc_entity(crate::entity::Entity {
        kind: EntityKind::Parameter(crate::entity::Parameter {
            decl: crate::entity::Declaration::new(int),
            address_taken: false,
            read: false,
        }),
        namespc: crate::entity::NamespaceKind::Normal,
        symbol: Some(n),
        pos,
        parent: Some(reset),
    });
    let body = Statement::new(
        StatementKind::Compound(CompoundStatement {
            statements: vec![Statement::new(StatementKind::Return(None), pos)],
            stmt_expr: false,
        }),
        pos,
    );
    if let EntityKind::Function(function) = &mut ctx.entity_mut(reset).kind {
        function.parameters.append(param);
        function.body = Some(body);
    }

    // layout runs lazily and caches its results
    assert_eq!(ctx.get_type_size(point_type), 8);
    assert_eq!(ctx.get_type_alignment(point_type), 4);
    assert!(ctx.compound(point).layouted);

    // the static variable's initializer is a constant initializer
    if let EntityKind::Variable(v) = &ctx.entity(origin_x).kind {
        let init = v.initializer.as_ref().unwrap();
        assert!(crate::classify::is_constant_initializer(&ctx, init));
    }

    // mangling is stable and injective across the three entities
    let sym_var = create_name_linux_elf(&mut ctx, origin_x);
    let sym_fn = create_name_linux_elf(&mut ctx, reset);
    assert_eq!(ctx.name(sym_var), "origin_x");
    assert_eq!(ctx.name(sym_fn), "reset");
    assert_ne!(sym_var, sym_fn);

    let mut unit = TranslationUnit::default();
    unit.scope.append(point);
    unit.scope.append(origin_x);
    unit.scope.append(reset);

    assert_eq!(
        print_ast(&ctx, &unit),
        "struct point {\n\
         \tint x;\n\
         \tint y;\n\
         };\n\
         static int origin_x = 0;\n\
         void reset(int n)\n\
         {\n\
         \treturn;\n\
         }\n\
         \n"
    );
}

#[test]
fn address_constant_arithmetic() {
    // &array[2] and buffer + 1 are address constants; p + 1 with automatic
    // p is not
    let mut ctx = Context::new(Config::default());
    let int = ctx.predef.type_int;
    let int_ptr = ctx.predef.type_int_ptr;
    let array_type = ctx.make_array_type(int, 8, Qualifiers::empty());

    let buffer = ctx.intern("buffer");
    let buffer = ctx.define_variable(buffer, array_type);
    if let EntityKind::Variable(v) = &mut ctx.entity_mut(buffer).kind {
        v.decl.storage_class = StorageClass::Static;
    }

    let pos = ctx.builtin_position();
    let buffer_ref = Expression::new(ExprKind::Reference(buffer), array_type, pos);
    // array-to-pointer decay inserted by the semantic analysis
    let decayed = Expression::new(
        ExprKind::Unary(UnaryOp::ImplicitCast, Box::new(buffer_ref.clone())),
        int_ptr,
        pos,
    );

    let sum = Expression::new(
        ExprKind::Binary(
            BinaryOp::Add,
            Box::new(decayed),
            Box::new(int_lit(&ctx, "1")),
        ),
        int_ptr,
        pos,
    );
    assert!(is_address_constant(&ctx, &sum));

    let element_addr = Expression::new(
        ExprKind::Unary(
            UnaryOp::TakeAddress,
            Box::new(Expression::new(
                ExprKind::ArrayAccess {
                    array: Box::new(buffer_ref),
                    index: Box::new(int_lit(&ctx, "2")),
                    flipped: false,
                },
                int,
                pos,
            )),
        ),
        int_ptr,
        pos,
    );
    assert!(is_address_constant(&ctx, &element_addr));

    let p = ctx.intern("p");
    let p = ctx.define_variable(p, int_ptr);
    if let EntityKind::Variable(v) = &mut ctx.entity_mut(p).kind {
        v.decl.storage_class = StorageClass::Auto;
    }
    let p_ref = Expression::new(ExprKind::Reference(p), int_ptr, pos);
    let moving = Expression::new(
        ExprKind::Binary(
            BinaryOp::Add,
            Box::new(p_ref),
            Box::new(int_lit(&ctx, "1")),
        ),
        int_ptr,
        pos,
    );
    assert!(!is_address_constant(&ctx, &moving));
}

#[test]
fn sizeof_is_constant_even_for_compounds() {
    let mut ctx = Context::new(Config::default());
    let int = ctx.predef.type_int;

    let s = ctx.intern("S");
    let compound = ctx.define_compound(Some(s), false);
    let a = ctx.intern("a");
    ctx.add_compound_member(compound, a, int);
    ctx.compound_mut(compound).complete = true;
    let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));

    let pos = ctx.builtin_position();
    let size_of = Expression::new(
        ExprKind::SizeOf(crate::ast::TypePropExpr {
            ty,
            expression: None,
        }),
        ctx.predef.type_size_t,
        pos,
    );
    assert!(is_constant_expression(&ctx, &size_of));

    // after layout it even folds to its value
    assert_eq!(ctx.get_type_size(ty), 4);
    assert_eq!(crate::fold::fold_constant_to_int(&ctx, &size_of), Ok(4));
}

#[test]
fn format_check_follows_conditional_format_strings() {
    let mut ctx = Context::new(Config::default());
    let int = ctx.predef.type_int;
    let const_char_ptr = {
        let const_char = ctx.get_qualified_type(ctx.predef.type_char, Qualifiers::CONST);
        ctx.make_pointer_type(const_char, Qualifiers::empty())
    };
    let fty = ctx.make_function_1_type_variadic(int, const_char_ptr);
    let name = ctx.intern("printf");
    let printf = ctx.define_function(name, fty);
    let pos = ctx.builtin_position();

    let function = Expression::new(ExprKind::Reference(printf), fty, pos);
    let fmt = Expression::new(
        ExprKind::Conditional(crate::ast::ConditionalExpr {
            condition: Box::new(int_lit(&ctx, "1")),
            true_expression: Some(Box::new(Expression::new(
                ExprKind::StringLiteral(StringValue::literal("%d")),
                ctx.predef.type_char_ptr,
                pos,
            ))),
            false_expression: Box::new(Expression::new(
                ExprKind::StringLiteral(StringValue::literal("%d %d")),
                ctx.predef.type_char_ptr,
                pos,
            )),
        }),
        ctx.predef.type_char_ptr,
        pos,
    );

    // two arguments satisfy the longer branch, no warning
    let call = CallExpr {
        function: Box::new(function),
        arguments: vec![fmt, int_lit(&ctx, "1"), int_lit(&ctx, "2")],
    };
    check_format(&mut ctx, &call);
    assert_eq!(ctx.diagnostics.warning_messages().len(), 0);
}

#[test]
fn win32_and_macho_names_differ_from_elf() {
    let mut ctx = Context::new(Config::default());
    let void = ctx.predef.type_void;
    let fty = ctx.make_function_0_type(void);
    let name = ctx.intern("frobnicate");
    let entity = ctx.define_function(name, fty);

    let elf = create_name_linux_elf(&mut ctx, entity);
    let win = create_name_win32(&mut ctx, entity);
    let macho = create_name_macho(&mut ctx, entity);
    assert_eq!(ctx.name(elf), "frobnicate");
    assert_eq!(ctx.name(win), "_frobnicate");
    assert_eq!(ctx.name(macho), "_frobnicate");
}

#[test]
fn typedef_of_array_pushes_qualifiers_to_elements() {
    // typedef int row[4]; const row r; -- r's element type is const int
    let mut ctx = Context::new(Config::default());
    let int = ctx.predef.type_int;
    let array = ctx.make_array_type(int, 4, Qualifiers::empty());
    let row = ctx.intern("row");
    let row = ctx.define_typedef(row, array);
    let named = ctx.identify_new_type(Type::qualified(
        Qualifiers::CONST,
        TypeKind::Typedef(crate::types::TypedefType {
            entity: row,
            resolved: None,
        }),
    ));

    let skipped = ctx.skip_typeref(named);
    match &ctx.ty(skipped).kind {
        TypeKind::Array(array) => {
            assert_eq!(ctx.ty(array.element_type).qualifiers, Qualifiers::CONST);
            assert!(matches!(
                ctx.ty(array.element_type).kind,
                TypeKind::Atomic(AtomicKind::Int)
            ));
        }
        kind => panic!("expected array, got {:?}", kind),
    }
    // the array itself stays unqualified
    assert!(ctx.ty(skipped).qualifiers.is_empty());
}

#[test]
fn enum_values_fold_with_implicit_successors() {
    // enum E { A, B, C = 10, D };
    let mut ctx = Context::new(Config::default());
    let pos = ctx.builtin_position();
    let e = ctx.intern("E");
    let enum_entity = ctx.alloc_entity(crate::entity::Entity {
        kind: EntityKind::Enum(crate::entity::EnumEntity {
            alias: None,
            complete: true,
            values: Vec::new(),
        }),
        namespc: crate::entity::NamespaceKind::Tag,
        symbol: Some(e),
        pos,
        parent: None,
    });
    let enum_type = ctx.identify_new_type(Type::new(TypeKind::Enum(crate::types::EnumType {
        entity: enum_entity,
        akind: AtomicKind::Int,
    })));

    let mut ids = Vec::new();
    for (name, value) in &[("A", None), ("B", None), ("C", Some("10")), ("D", None)] {
        let symbol = ctx.intern(name);
        let value = value.map(|text| int_lit(&ctx, text));
        let id = ctx.alloc_entity(crate::entity::Entity {
            kind: EntityKind::EnumValue(crate::entity::EnumValue { value, enum_type }),
            namespc: crate::entity::NamespaceKind::Normal,
            symbol: Some(symbol),
            pos,
            parent: Some(enum_entity),
        });
        ids.push(id);
    }
    if let EntityKind::Enum(enum_data) = &mut ctx.entity_mut(enum_entity).kind {
        enum_data.values = ids.clone();
    }

    let expected = [0, 1, 10, 11];
    for (&id, &value) in ids.iter().zip(&expected) {
        let reference = Expression::new(ExprKind::EnumValueReference(id), enum_type, pos);
        assert!(is_constant_expression(&ctx, &reference));
        assert_eq!(crate::fold::fold_constant_to_int(&ctx, &reference), Ok(value));
    }
}
