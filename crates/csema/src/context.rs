//! The translation-unit context.
//!
//! Everything the original kept in process-wide globals (the AST and type
//! obstacks, the symbol table, the type hash table, the predefined types and
//! the atomic property table) lives in one [`Context`] value. Creating a
//! context is `init_*`, dropping it is `exit_*`; all mutation happens through
//! `&mut` access, the phases after parsing treat it as read-mostly.

use crate::ast::Expression;
use crate::config::Config;
use crate::diagnostic::{Diagnostics, SourcePosition};
use crate::entity::Entity;
use crate::symbol::{Symbol, SymbolTable};
use crate::types::{
    build_atomic_properties, build_kinds_by_size, AtomicKind, AtomicProperties, BuiltinType,
    Qualifiers, Type, TypeExprId, TypeKind, TypeRef, TypeTable, ATOMIC_KIND_COUNT,
    KINDS_BY_SIZE_LIMIT, SIGNED_SIZE_CANDIDATES, UNSIGNED_SIZE_CANDIDATES,
};

/// The predefined type singletons, the moral equivalent of the original's
/// `type_int`, `type_char_ptr`, … globals. Built once at context creation;
/// mainly consumed by the format checker and the builtin machinery.
#[derive(Clone, Copy, Debug)]
pub struct PredefTypes {
    pub type_error: TypeRef,
    pub type_void: TypeRef,
    pub type_char: TypeRef,
    pub type_signed_char: TypeRef,
    pub type_unsigned_char: TypeRef,
    pub type_short: TypeRef,
    pub type_unsigned_short: TypeRef,
    pub type_int: TypeRef,
    pub type_unsigned_int: TypeRef,
    pub type_long: TypeRef,
    pub type_unsigned_long: TypeRef,
    pub type_long_long: TypeRef,
    pub type_unsigned_long_long: TypeRef,
    pub type_bool: TypeRef,
    pub type_float: TypeRef,
    pub type_double: TypeRef,
    pub type_long_double: TypeRef,
    pub type_wchar_t: TypeRef,

    pub type_char_ptr: TypeRef,
    pub type_wchar_t_ptr: TypeRef,
    pub type_void_ptr: TypeRef,
    pub type_int_ptr: TypeRef,
    pub type_signed_char_ptr: TypeRef,
    pub type_short_ptr: TypeRef,
    pub type_long_ptr: TypeRef,
    pub type_long_long_ptr: TypeRef,
    pub type_intmax_t_ptr: TypeRef,
    pub type_ssize_t_ptr: TypeRef,
    pub type_ptrdiff_t_ptr: TypeRef,

    pub type_intmax_t: TypeRef,
    pub type_uintmax_t: TypeRef,
    pub type_size_t: TypeRef,
    pub type_ssize_t: TypeRef,
    pub type_ptrdiff_t: TypeRef,
    pub type_uptrdiff_t: TypeRef,
    pub type_wint_t: TypeRef,
    pub type_int32: TypeRef,
    pub type_unsigned_int32: TypeRef,
    pub type_int64: TypeRef,
    pub type_unsigned_int64: TypeRef,

    pub type_valist: TypeRef,
}

impl PredefTypes {
    fn placeholder() -> Self {
        // TypeRef(0) is the pre-seeded error type; every field is
        // overwritten before the context is handed out.
        let e = TypeRef(0);
        PredefTypes {
            type_error: e,
            type_void: e,
            type_char: e,
            type_signed_char: e,
            type_unsigned_char: e,
            type_short: e,
            type_unsigned_short: e,
            type_int: e,
            type_unsigned_int: e,
            type_long: e,
            type_unsigned_long: e,
            type_long_long: e,
            type_unsigned_long_long: e,
            type_bool: e,
            type_float: e,
            type_double: e,
            type_long_double: e,
            type_wchar_t: e,
            type_char_ptr: e,
            type_wchar_t_ptr: e,
            type_void_ptr: e,
            type_int_ptr: e,
            type_signed_char_ptr: e,
            type_short_ptr: e,
            type_long_ptr: e,
            type_long_long_ptr: e,
            type_intmax_t_ptr: e,
            type_ssize_t_ptr: e,
            type_ptrdiff_t_ptr: e,
            type_intmax_t: e,
            type_uintmax_t: e,
            type_size_t: e,
            type_ssize_t: e,
            type_ptrdiff_t: e,
            type_uptrdiff_t: e,
            type_wint_t: e,
            type_int32: e,
            type_unsigned_int32: e,
            type_int64: e,
            type_unsigned_int64: e,
            type_valist: e,
        }
    }

    fn create(ctx: &mut Context) -> Self {
        use AtomicKind::*;

        let none = Qualifiers::empty();
        let atomic = |ctx: &mut Context, kind| ctx.make_atomic_type(kind, none);

        let type_void = atomic(ctx, Void);
        let type_char = atomic(ctx, Char);
        let type_signed_char = atomic(ctx, SignedChar);
        let type_unsigned_char = atomic(ctx, UnsignedChar);
        let type_short = atomic(ctx, Short);
        let type_unsigned_short = atomic(ctx, UnsignedShort);
        let type_int = atomic(ctx, Int);
        let type_unsigned_int = atomic(ctx, UnsignedInt);
        let type_long = atomic(ctx, Long);
        let type_unsigned_long = atomic(ctx, UnsignedLong);
        let type_long_long = atomic(ctx, LongLong);
        let type_unsigned_long_long = atomic(ctx, UnsignedLongLong);
        let type_bool = atomic(ctx, Bool);
        let type_float = atomic(ctx, Float);
        let type_double = atomic(ctx, Double);
        let type_long_double = atomic(ctx, LongDouble);
        let type_wchar_t = atomic(ctx, WcharT);

        let type_char_ptr = ctx.make_pointer_type(type_char, none);
        let type_wchar_t_ptr = ctx.make_pointer_type(type_wchar_t, none);
        let type_void_ptr = ctx.make_pointer_type(type_void, none);
        let type_int_ptr = ctx.make_pointer_type(type_int, none);
        let type_signed_char_ptr = ctx.make_pointer_type(type_signed_char, none);
        let type_short_ptr = ctx.make_pointer_type(type_short, none);
        let type_long_ptr = ctx.make_pointer_type(type_long, none);
        let type_long_long_ptr = ctx.make_pointer_type(type_long_long, none);

        let intptr = ctx.get_intptr_kind();
        let uintptr = ctx.get_uintptr_kind();
        let type_intmax_t = type_long_long;
        let type_uintmax_t = type_unsigned_long_long;
        let type_size_t = atomic(ctx, uintptr);
        let type_ssize_t = atomic(ctx, intptr);
        let type_ptrdiff_t = atomic(ctx, intptr);
        let type_uptrdiff_t = atomic(ctx, uintptr);
        let type_wint_t = type_unsigned_int;
        let type_int32 = ctx
            .find_signed_int_atomic_type_kind_for_size(4)
            .map(|kind| ctx.make_atomic_type(kind, none))
            .unwrap_or(type_int);
        let type_unsigned_int32 = ctx
            .find_unsigned_int_atomic_type_kind_for_size(4)
            .map(|kind| ctx.make_atomic_type(kind, none))
            .unwrap_or(type_unsigned_int);
        let type_int64 = ctx
            .find_signed_int_atomic_type_kind_for_size(8)
            .map(|kind| ctx.make_atomic_type(kind, none))
            .unwrap_or(type_long_long);
        let type_unsigned_int64 = ctx
            .find_unsigned_int_atomic_type_kind_for_size(8)
            .map(|kind| ctx.make_atomic_type(kind, none))
            .unwrap_or(type_unsigned_long_long);

        let type_intmax_t_ptr = ctx.make_pointer_type(type_intmax_t, none);
        let type_ssize_t_ptr = ctx.make_pointer_type(type_ssize_t, none);
        let type_ptrdiff_t_ptr = ctx.make_pointer_type(type_ptrdiff_t, none);

        let valist_symbol = ctx.symbols.intern("__builtin_va_list");
        let type_valist = ctx.identify_new_type(Type::new(TypeKind::Builtin(BuiltinType {
            symbol: valist_symbol,
            real_type: type_char_ptr,
        })));

        PredefTypes {
            type_error: TypeRef(0),
            type_void,
            type_char,
            type_signed_char,
            type_unsigned_char,
            type_short,
            type_unsigned_short,
            type_int,
            type_unsigned_int,
            type_long,
            type_unsigned_long,
            type_long_long,
            type_unsigned_long_long,
            type_bool,
            type_float,
            type_double,
            type_long_double,
            type_wchar_t,
            type_char_ptr,
            type_wchar_t_ptr,
            type_void_ptr,
            type_int_ptr,
            type_signed_char_ptr,
            type_short_ptr,
            type_long_ptr,
            type_long_long_ptr,
            type_intmax_t_ptr,
            type_ssize_t_ptr,
            type_ptrdiff_t_ptr,
            type_intmax_t,
            type_uintmax_t,
            type_size_t,
            type_ssize_t,
            type_ptrdiff_t,
            type_uptrdiff_t,
            type_wint_t,
            type_int32,
            type_unsigned_int32,
            type_int64,
            type_unsigned_int64,
            type_valist,
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub symbols: SymbolTable,
    pub(crate) types: TypeTable,
    pub(crate) entities: Vec<Entity>,
    pub(crate) type_exprs: Vec<Expression>,
    pub diagnostics: Diagnostics,
    pub(crate) atomic_props: [AtomicProperties; ATOMIC_KIND_COUNT],
    pub(crate) signed_kinds_by_size: [Option<AtomicKind>; KINDS_BY_SIZE_LIMIT],
    pub(crate) unsigned_kinds_by_size: [Option<AtomicKind>; KINDS_BY_SIZE_LIMIT],
    pub predef: PredefTypes,
    builtin_pos: SourcePosition,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let atomic_props = build_atomic_properties(&config);
        let signed_kinds_by_size = build_kinds_by_size(&atomic_props, &SIGNED_SIZE_CANDIDATES);
        let unsigned_kinds_by_size =
            build_kinds_by_size(&atomic_props, &UNSIGNED_SIZE_CANDIDATES);

        let mut symbols = SymbolTable::new();
        let builtin_name = symbols.intern("<built-in>");

        let mut ctx = Context {
            config,
            symbols,
            types: TypeTable::new(),
            entities: Vec::new(),
            type_exprs: Vec::new(),
            diagnostics: Diagnostics::new(),
            atomic_props,
            signed_kinds_by_size,
            unsigned_kinds_by_size,
            predef: PredefTypes::placeholder(),
            builtin_pos: SourcePosition {
                input_name: builtin_name,
                line: 0,
            },
        };
        ctx.predef = PredefTypes::create(&mut ctx);
        ctx
    }

    pub fn ty(&self, r: TypeRef) -> &Type {
        self.types.get(r)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        self.symbols.intern(s)
    }

    pub fn name(&self, symbol: Symbol) -> &str {
        self.symbols.name(symbol)
    }

    /// Position used for declarations and types invented by the front-end.
    pub fn builtin_position(&self) -> SourcePosition {
        self.builtin_pos
    }

    /// Stores an expression that becomes part of a type (a VLA size, a
    /// bit-field width, a `typeof` operand).
    pub fn alloc_type_expr(&mut self, expr: Expression) -> TypeExprId {
        let id = TypeExprId(self.type_exprs.len() as u32);
        self.type_exprs.push(expr);
        id
    }

    pub fn type_expr(&self, id: TypeExprId) -> &Expression {
        &self.type_exprs[id.0 as usize]
    }
}
