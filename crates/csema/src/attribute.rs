//! GNU `__attribute__` and MS `__declspec` resolution.
//!
//! The parser collects raw attribute lists; the two entry points here fold
//! them into type changes (`packed`, calling conventions, `mode`) and
//! declaration modifier bits (`handle_entity_attributes`).

use crate::ast::{ExprKind, Expression};
use crate::context::Context;
use crate::diagnostic::SourcePosition;
use crate::entity::{DeclModifiers, EntityId, EntityKind};
use crate::fold::fold_constant_to_int;
use crate::symbol::Symbol;
use crate::types::{AtomicKind, CallingConvention, TypeKind, TypeRef};

/// All attribute names the front-end recognizes. The enumeration is a
/// closed set; unknown names never reach this type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttributeKind {
    GnuConst,
    GnuVolatile,
    GnuCdecl,
    GnuStdcall,
    GnuFastcall,
    GnuDeprecated,
    GnuNoinline,
    GnuReturnsTwice,
    GnuNoreturn,
    GnuNaked,
    GnuPure,
    GnuAlwaysInline,
    GnuMalloc,
    GnuWeak,
    GnuConstructor,
    GnuDestructor,
    GnuNothrow,
    GnuTransparentUnion,
    GnuCommon,
    GnuNocommon,
    GnuPacked,
    GnuShared,
    GnuNotshared,
    GnuUsed,
    GnuUnused,
    GnuNoInstrumentFunction,
    GnuWarnUnusedResult,
    GnuLongcall,
    GnuShortcall,
    GnuLongCall,
    GnuShortCall,
    GnuFunctionVector,
    GnuInterrupt,
    GnuInterruptHandler,
    GnuNmiHandler,
    GnuNesting,
    GnuNear,
    GnuFar,
    GnuSignal,
    GnuEightbitData,
    GnuTinyData,
    GnuSaveall,
    GnuFlatten,
    GnuSseregparm,
    GnuExternallyVisible,
    GnuMayAlias,
    GnuMsStruct,
    GnuGccStruct,
    GnuDllimport,
    GnuDllexport,
    GnuAligned,
    GnuAlias,
    GnuSection,
    GnuFormat,
    GnuFormatArg,
    GnuWeakref,
    GnuNonnull,
    GnuTlsModel,
    GnuVisibility,
    GnuRegparm,
    GnuMode,
    GnuModel,
    GnuTrapExit,
    GnuSpSwitch,
    GnuSentinel,

    MsAlign,
    MsAllocate,
    MsCdecl,
    MsStdcall,
    MsFastcall,
    MsThiscall,
    MsDllimport,
    MsDllexport,
    MsNaked,
    MsNoinline,
    MsReturnsTwice,
    MsNoreturn,
    MsNothrow,
    MsNovtable,
    MsProperty,
    MsSelectany,
    MsThread,
    MsUuid,
    MsDeprecated,
    MsRestrict,
    MsNoalias,
}

impl AttributeKind {
    pub fn name(self) -> &'static str {
        use AttributeKind::*;
        match self {
            GnuConst => "const",
            GnuVolatile => "volatile",
            GnuCdecl => "cdecl",
            GnuStdcall => "stdcall",
            GnuFastcall => "fastcall",
            GnuDeprecated => "deprecated",
            GnuNoinline => "noinline",
            GnuReturnsTwice => "returns_twice",
            GnuNoreturn => "noreturn",
            GnuNaked => "naked",
            GnuPure => "pure",
            GnuAlwaysInline => "always_inline",
            GnuMalloc => "malloc",
            GnuWeak => "weak",
            GnuConstructor => "constructor",
            GnuDestructor => "destructor",
            GnuNothrow => "nothrow",
            GnuTransparentUnion => "transparent_union",
            GnuCommon => "common",
            GnuNocommon => "nocommon",
            GnuPacked => "packed",
            GnuShared => "shared",
            GnuNotshared => "notshared",
            GnuUsed => "used",
            GnuUnused => "unused",
            GnuNoInstrumentFunction => "no_instrument_function",
            GnuWarnUnusedResult => "warn_unused_result",
            GnuLongcall => "longcall",
            GnuShortcall => "shortcall",
            GnuLongCall => "long_call",
            GnuShortCall => "short_call",
            GnuFunctionVector => "function_vector",
            GnuInterrupt => "interrupt",
            GnuInterruptHandler => "interrupt_handler",
            GnuNmiHandler => "nmi_handler",
            GnuNesting => "nesting",
            GnuNear => "near",
            GnuFar => "far",
            GnuSignal => "signal",
            GnuEightbitData => "eightbit_data",
            GnuTinyData => "tiny_data",
            GnuSaveall => "saveall",
            GnuFlatten => "flatten",
            GnuSseregparm => "sseregparm",
            GnuExternallyVisible => "externally_visible",
            GnuMayAlias => "may_alias",
            GnuMsStruct => "ms_struct",
            GnuGccStruct => "gcc_struct",
            GnuDllimport => "dllimport",
            GnuDllexport => "dllexport",
            GnuAligned => "aligned",
            GnuAlias => "alias",
            GnuSection => "section",
            GnuFormat => "format",
            GnuFormatArg => "format_arg",
            GnuWeakref => "weakref",
            GnuNonnull => "nonnull",
            GnuTlsModel => "tls_model",
            GnuVisibility => "visibility",
            GnuRegparm => "regparm",
            GnuMode => "mode",
            GnuModel => "model",
            GnuTrapExit => "trap_exit",
            GnuSpSwitch => "sp_switch",
            GnuSentinel => "sentinel",

            MsAlign => "align",
            MsAllocate => "allocate",
            MsCdecl => "__cdecl",
            MsStdcall => "__stdcall",
            MsFastcall => "__fastcall",
            MsThiscall => "__thiscall",
            MsDllimport => "dllimport",
            MsDllexport => "dllexport",
            MsNaked => "naked",
            MsNoinline => "noinline",
            MsReturnsTwice => "returns_twice",
            MsNoreturn => "noreturn",
            MsNothrow => "nothrow",
            MsNovtable => "novtable",
            MsProperty => "property",
            MsSelectany => "selectany",
            MsThread => "thread",
            MsUuid => "uuid",
            MsDeprecated => "deprecated",
            MsRestrict => "restrict",
            MsNoalias => "noalias",
        }
    }
}

#[derive(Clone, Debug)]
pub enum AttributeArgument {
    Symbol(Symbol),
    Expression(Expression),
}

/// MS `property(get=…, put=…)` payload.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PropertyArgument {
    pub get_symbol: Option<Symbol>,
    pub put_symbol: Option<Symbol>,
}

#[derive(Clone, Debug)]
pub enum AttributePayload {
    Arguments(Vec<AttributeArgument>),
    Property(PropertyArgument),
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub pos: SourcePosition,
    pub payload: AttributePayload,
}

impl Attribute {
    pub fn new(kind: AttributeKind, pos: SourcePosition) -> Self {
        Attribute {
            kind,
            pos,
            payload: AttributePayload::Arguments(Vec::new()),
        }
    }

    pub fn with_arguments(
        kind: AttributeKind,
        pos: SourcePosition,
        arguments: Vec<AttributeArgument>,
    ) -> Self {
        Attribute {
            kind,
            pos,
            payload: AttributePayload::Arguments(arguments),
        }
    }

    pub fn arguments(&self) -> &[AttributeArgument] {
        match &self.payload {
            AttributePayload::Arguments(arguments) => arguments,
            AttributePayload::Property(_) => &[],
        }
    }
}

/// Compares an attribute key against a source spelling, ignoring an
/// enclosing pair of double underscores on the spelling (`__mode__`
/// matches `mode`).
fn equal_modulo_underscores(key: &str, spelling: &str) -> bool {
    if spelling.starts_with("__") && spelling.ends_with("__") && spelling.len() >= 4 {
        return key == &spelling[2..spelling.len() - 2];
    }
    key == spelling
}

fn is_po2(x: i64) -> bool {
    (x & (x - 1)) == 0
}

fn handle_attribute_mode(ctx: &mut Context, attribute: &Attribute, orig_type: TypeRef) -> TypeRef {
    let ty = ctx.skip_typeref(orig_type);

    let symbol = match attribute.arguments().first() {
        Some(AttributeArgument::Symbol(symbol)) => *symbol,
        _ => {
            ctx.diagnostics.error(
                attribute.pos,
                "__attribute__((mode)) requires a mode argument".into(),
            );
            return orig_type;
        }
    };

    // at least: byte, word, pointer, list of machine modes;
    // __XXX__ is interpreted as XXX
    let sign = ctx.is_type_signed(ty);
    let akind = {
        let spelling = ctx.name(symbol);
        if equal_modulo_underscores("QI", spelling) || equal_modulo_underscores("byte", spelling) {
            Some(if sign {
                AtomicKind::Char
            } else {
                AtomicKind::UnsignedChar
            })
        } else if equal_modulo_underscores("HI", spelling) {
            Some(if sign {
                AtomicKind::Short
            } else {
                AtomicKind::UnsignedShort
            })
        } else if equal_modulo_underscores("SI", spelling)
            || equal_modulo_underscores("word", spelling)
            || equal_modulo_underscores("pointer", spelling)
        {
            Some(if sign {
                AtomicKind::Int
            } else {
                AtomicKind::UnsignedInt
            })
        } else if equal_modulo_underscores("DI", spelling) {
            Some(if sign {
                AtomicKind::LongLong
            } else {
                AtomicKind::UnsignedLongLong
            })
        } else {
            None
        }
    };
    let akind = match akind {
        Some(akind) => akind,
        None => {
            if ctx.diagnostics.warnings.other {
                let spelling = ctx.name(symbol).to_string();
                ctx.diagnostics.warn(
                    attribute.pos,
                    format!("ignoring unknown mode '{}'", spelling),
                );
            }
            return orig_type;
        }
    };

    match ctx.ty(ty).kind.clone() {
        TypeKind::Atomic(_) => {
            let mut copy = ctx.duplicate_type(ty);
            copy.kind = TypeKind::Atomic(akind);
            ctx.identify_new_type(copy)
        }
        TypeKind::Enum(mut enum_type) => {
            let mut copy = ctx.duplicate_type(ty);
            enum_type.akind = akind;
            copy.kind = TypeKind::Enum(enum_type);
            ctx.identify_new_type(copy)
        }
        TypeKind::Pointer(_) => {
            ctx.diagnostics.warn(
                attribute.pos,
                "__attribute__((mode)) on pointers not implemented yet (ignored)".into(),
            );
            ty
        }
        _ => {
            ctx.diagnostics.error(
                attribute.pos,
                "__attribute__((mode)) only allowed on integer, enum or pointer type".into(),
            );
            orig_type
        }
    }
}

fn handle_attribute_aligned(ctx: &mut Context, attribute: &Attribute, entity: EntityId) {
    // no argument means maximum useful alignment for the target
    let mut alignment: i64 = 32;
    if let Some(argument) = attribute.arguments().first() {
        let expression = match argument {
            AttributeArgument::Expression(expression) => expression,
            AttributeArgument::Symbol(_) => {
                ctx.diagnostics.error(
                    attribute.pos,
                    "alignment must be an integer constant expression".into(),
                );
                return;
            }
        };
        alignment = match fold_constant_to_int(ctx, expression) {
            Ok(value) => value,
            Err(_) => {
                ctx.diagnostics.error(
                    attribute.pos,
                    "alignment must be an integer constant expression".into(),
                );
                return;
            }
        };
    }

    if !is_po2(alignment) {
        ctx.diagnostics.error(
            attribute.pos,
            format!("alignment must be a power of 2 but is {}", alignment),
        );
        return;
    }
    if alignment <= 0 {
        ctx.diagnostics.error(
            attribute.pos,
            format!("alignment must be bigger than 0 but is {}", alignment),
        );
        return;
    }
    let alignment = alignment as u32;

    let mut ignored = false;
    match &mut ctx.entity_mut(entity).kind {
        EntityKind::Variable(v) => v.decl.alignment = alignment,
        EntityKind::Parameter(p) => p.decl.alignment = alignment,
        EntityKind::CompoundMember(m) => m.decl.alignment = alignment,
        EntityKind::Function(f) => f.decl.alignment = alignment,
        EntityKind::Typedef(typedef) => typedef.alignment = alignment,
        EntityKind::Struct(compound) | EntityKind::Union(compound) => {
            if alignment > compound.alignment {
                compound.alignment = alignment;
            }
        }
        _ => ignored = true,
    }

    if ignored && ctx.diagnostics.warnings.other {
        let name = ctx
            .entity(entity)
            .symbol
            .map(|s| ctx.name(s).to_string())
            .unwrap_or_default();
        ctx.diagnostics.warn(
            attribute.pos,
            format!("alignment attribute specification on '{}' ignored", name),
        );
    }
}

fn warn_arguments(ctx: &mut Context, attribute: &Attribute) {
    if attribute.arguments().is_empty() {
        return;
    }
    if ctx.diagnostics.warnings.other {
        ctx.diagnostics.warn(
            attribute.pos,
            format!("attribute '{}' needs no arguments", attribute.kind.name()),
        );
    }
}

fn handle_attribute_packed_entity(ctx: &mut Context, attribute: &Attribute, entity: EntityId) {
    warn_arguments(ctx, attribute);
    if let Some(compound) = ctx.entity_mut(entity).compound_mut() {
        compound.packed = true;
        return;
    }
    if ctx.diagnostics.warnings.other {
        let kind_name = ctx.entity(entity).kind_name();
        let name = ctx
            .entity(entity)
            .symbol
            .map(|s| ctx.name(s).to_string())
            .unwrap_or_default();
        ctx.diagnostics.warn(
            attribute.pos,
            format!("packed attribute on {} '{}' ignored", kind_name, name),
        );
    }
}

fn handle_attribute_packed_type(ctx: &mut Context, attribute: &Attribute, ty: TypeRef) {
    match ctx.ty(ty).kind {
        TypeKind::CompoundStruct(compound) => {
            handle_attribute_packed_entity(ctx, attribute, compound)
        }
        _ => {
            let name = crate::printer::type_to_string(ctx, ty);
            ctx.diagnostics.warn(
                attribute.pos,
                format!("packed attribute on type '{}' ignored", name),
            );
        }
    }
}

fn change_calling_convention(
    ctx: &mut Context,
    ty: TypeRef,
    calling_convention: CallingConvention,
) -> TypeRef {
    // only applies directly to function types, never through a typeref
    let function = match &ctx.ty(ty).kind {
        TypeKind::Function(function) => function.clone(),
        _ => return ty,
    };

    if function.calling_convention == calling_convention {
        return ty;
    }

    let mut copy = ctx.duplicate_type(ty);
    let mut function = function;
    function.calling_convention = calling_convention;
    copy.kind = TypeKind::Function(function);
    ctx.identify_new_type(copy)
}

/// Folds type-changing attributes into `ty` and returns the adjusted
/// (identified) type.
pub fn handle_type_attributes(
    ctx: &mut Context,
    attributes: &[Attribute],
    mut ty: TypeRef,
) -> TypeRef {
    for attribute in attributes {
        match attribute.kind {
            AttributeKind::GnuPacked => handle_attribute_packed_type(ctx, attribute, ty),
            AttributeKind::GnuCdecl | AttributeKind::MsCdecl => {
                ty = change_calling_convention(ctx, ty, CallingConvention::Cdecl);
            }
            AttributeKind::GnuStdcall | AttributeKind::MsStdcall => {
                ty = change_calling_convention(ctx, ty, CallingConvention::Stdcall);
            }
            AttributeKind::GnuFastcall | AttributeKind::MsFastcall => {
                ty = change_calling_convention(ctx, ty, CallingConvention::Fastcall);
            }
            AttributeKind::MsThiscall => {
                ty = change_calling_convention(ctx, ty, CallingConvention::Thiscall);
            }
            AttributeKind::GnuMode => {
                ty = handle_attribute_mode(ctx, attribute, ty);
            }
            _ => {}
        }
    }
    ty
}

/// Applies an attribute list to an entity: adjusts its type, folds
/// modifier bits and handles `packed` and alignment requests.
pub fn handle_entity_attributes(ctx: &mut Context, attributes: &[Attribute], entity: EntityId) {
    let typedef_ty = match &ctx.entity(entity).kind {
        EntityKind::Typedef(typedef) => Some(typedef.ty),
        _ => None,
    };
    if let Some(ty) = typedef_ty {
        let ty = handle_type_attributes(ctx, attributes, ty);
        if let EntityKind::Typedef(typedef) = &mut ctx.entity_mut(entity).kind {
            typedef.ty = ty;
        }
    } else if let Some(ty) = ctx.entity(entity).declaration().map(|decl| decl.ty) {
        let ty = handle_type_attributes(ctx, attributes, ty);
        ctx.entity_mut(entity).declaration_mut().unwrap().ty = ty;
    }

    let mut modifiers = DeclModifiers::empty();
    for attribute in attributes {
        use AttributeKind::*;
        match attribute.kind {
            GnuConst => modifiers |= DeclModifiers::CONST,
            GnuDeprecated => modifiers |= DeclModifiers::DEPRECATED,
            GnuNoinline => modifiers |= DeclModifiers::NOINLINE,
            GnuReturnsTwice => modifiers |= DeclModifiers::RETURNS_TWICE,
            GnuNoreturn => modifiers |= DeclModifiers::NORETURN,
            GnuNaked => modifiers |= DeclModifiers::NAKED,
            GnuPure => modifiers |= DeclModifiers::PURE,
            GnuAlwaysInline => modifiers |= DeclModifiers::FORCEINLINE,
            GnuMalloc => modifiers |= DeclModifiers::MALLOC,
            GnuConstructor => modifiers |= DeclModifiers::CONSTRUCTOR,
            GnuDestructor => modifiers |= DeclModifiers::DESTRUCTOR,
            GnuNothrow => modifiers |= DeclModifiers::NOTHROW,
            GnuTransparentUnion => modifiers |= DeclModifiers::TRANSPARENT_UNION,
            GnuUsed => modifiers |= DeclModifiers::USED,
            GnuUnused => modifiers |= DeclModifiers::UNUSED,
            GnuDllimport => modifiers |= DeclModifiers::DLLIMPORT,
            GnuDllexport => modifiers |= DeclModifiers::DLLEXPORT,
            GnuWeak => modifiers |= DeclModifiers::WEAK,

            MsAllocate => modifiers |= DeclModifiers::MALLOC,
            MsDllimport => modifiers |= DeclModifiers::DLLIMPORT,
            MsDllexport => modifiers |= DeclModifiers::DLLEXPORT,
            MsNaked => modifiers |= DeclModifiers::NAKED,
            MsNoinline => modifiers |= DeclModifiers::NOINLINE,
            MsReturnsTwice => modifiers |= DeclModifiers::RETURNS_TWICE,
            MsNoreturn => modifiers |= DeclModifiers::NORETURN,
            MsNothrow => modifiers |= DeclModifiers::NOTHROW,
            MsThread => modifiers |= DeclModifiers::THREAD,
            MsDeprecated => modifiers |= DeclModifiers::DEPRECATED,
            MsRestrict => modifiers |= DeclModifiers::RESTRICT,
            MsNoalias => modifiers |= DeclModifiers::NOALIAS,

            GnuPacked => handle_attribute_packed_entity(ctx, attribute, entity),
            MsAlign | GnuAligned => handle_attribute_aligned(ctx, attribute, entity),
            _ => {}
        }
    }

    if !modifiers.is_empty() {
        match &mut ctx.entity_mut(entity).kind {
            EntityKind::Typedef(typedef) => typedef.modifiers |= modifiers,
            EntityKind::Struct(compound) | EntityKind::Union(compound) => {
                compound.modifiers |= modifiers
            }
            EntityKind::CompoundMember(m) => m.decl.modifiers |= modifiers,
            EntityKind::Variable(v) => v.decl.modifiers |= modifiers,
            EntityKind::Function(f) => f.decl.modifiers |= modifiers,
            _ => {}
        }
    }
}

/// The message of an MS `deprecated("…")` attribute, if present.
pub fn get_deprecated_string(attributes: &[Attribute]) -> Option<String> {
    for attribute in attributes {
        if attribute.kind != AttributeKind::MsDeprecated {
            continue;
        }
        let argument = attribute.arguments().first()?;
        let expression = match argument {
            AttributeArgument::Expression(expression) => expression,
            AttributeArgument::Symbol(_) => return None,
        };
        match &expression.kind {
            ExprKind::StringLiteral(value) => {
                let bytes = value
                    .bytes
                    .split(|&b| b == 0)
                    .next()
                    .unwrap_or(&value.bytes);
                return Some(String::from_utf8_lossy(bytes).into_owned());
            }
            _ => return None,
        }
    }
    None
}

fn attribute_argument_equal(arg1: &AttributeArgument, arg2: &AttributeArgument) -> bool {
    match (arg1, arg2) {
        (AttributeArgument::Symbol(sym1), AttributeArgument::Symbol(sym2)) => sym1 == sym2,
        // expression comparison is not implemented
        (AttributeArgument::Expression(_), AttributeArgument::Expression(_)) => false,
        _ => false,
    }
}

pub fn attributes_equal(attr1: &Attribute, attr2: &Attribute) -> bool {
    if attr1.kind != attr2.kind {
        return false;
    }

    match (&attr1.payload, &attr2.payload) {
        (AttributePayload::Property(prop1), AttributePayload::Property(prop2)) => prop1 == prop2,
        (AttributePayload::Arguments(args1), AttributePayload::Arguments(args2)) => {
            args1.len() == args2.len()
                && args1
                    .iter()
                    .zip(args2)
                    .all(|(a, b)| attribute_argument_equal(a, b))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{LiteralExpr, LiteralKind};
    use crate::config::Config;
    use crate::symbol::StringValue;
    use crate::types::Qualifiers;

    fn mode_attribute(ctx: &mut Context, spelling: &str) -> Attribute {
        let symbol = ctx.intern(spelling);
        let pos = ctx.builtin_position();
        Attribute::with_arguments(
            AttributeKind::GnuMode,
            pos,
            vec![AttributeArgument::Symbol(symbol)],
        )
    }

    fn int_expr(ctx: &Context, text: &str) -> Expression {
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

    #[test]
    fn mode_di_widens_to_long_long() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let attr = mode_attribute(&mut ctx, "__DI__");
        let widened = handle_type_attributes(&mut ctx, &[attr], int);
        assert!(matches!(
            ctx.ty(widened).kind,
            TypeKind::Atomic(AtomicKind::LongLong)
        ));

        let unsigned = ctx.make_atomic_type(AtomicKind::UnsignedInt, Qualifiers::empty());
        let attr = mode_attribute(&mut ctx, "DI");
        let widened = handle_type_attributes(&mut ctx, &[attr], unsigned);
        assert!(matches!(
            ctx.ty(widened).kind,
            TypeKind::Atomic(AtomicKind::UnsignedLongLong)
        ));
    }

    #[test]
    fn unknown_mode_warns_and_keeps_the_type() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let attr = mode_attribute(&mut ctx, "__XYZZY__");
        let result = handle_type_attributes(&mut ctx, &[attr], int);
        assert_eq!(result, int);
        assert!(ctx
            .diagnostics
            .warning_messages()
            .iter()
            .any(|m| m.contains("unknown mode")));
    }

    #[test]
    fn aligned_requires_a_power_of_two()  {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let var = ctx.define_variable(x, int);

        let pos = ctx.builtin_position();
        let three = int_expr(&ctx, "3");
        let attr = Attribute::with_arguments(
            AttributeKind::GnuAligned,
            pos,
            vec![AttributeArgument::Expression(three)],
        );
        handle_entity_attributes(&mut ctx, &[attr], var);
        assert_eq!(ctx.diagnostics.error_count(), 1);
        assert_eq!(ctx.entity(var).declaration().unwrap().alignment, 0);

        let sixteen = int_expr(&ctx, "16");
        let attr = Attribute::with_arguments(
            AttributeKind::GnuAligned,
            pos,
            vec![AttributeArgument::Expression(sixteen)],
        );
        handle_entity_attributes(&mut ctx, &[attr], var);
        assert_eq!(ctx.entity(var).declaration().unwrap().alignment, 16);
    }

    #[test]
    fn modifiers_fold_into_the_declaration() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let void = ctx.predef.type_void;
        let fty = ctx.make_function_1_type(void, int);
        let f = ctx.intern("f");
        let func = ctx.define_function(f, fty);

        let pos = ctx.builtin_position();
        let attrs = vec![
            Attribute::new(AttributeKind::GnuNoreturn, pos),
            Attribute::new(AttributeKind::GnuPure, pos),
            Attribute::new(AttributeKind::MsDllimport, pos),
        ];
        handle_entity_attributes(&mut ctx, &attrs, func);
        let modifiers = ctx.entity(func).declaration().unwrap().modifiers;
        assert!(modifiers.contains(DeclModifiers::NORETURN));
        assert!(modifiers.contains(DeclModifiers::PURE));
        assert!(modifiers.contains(DeclModifiers::DLLIMPORT));
    }

    #[test]
    fn stdcall_attribute_changes_the_calling_convention() {
        let mut ctx = Context::new(Config::default());
        let void = ctx.predef.type_void;
        let int = ctx.predef.type_int;
        let fty = ctx.make_function_1_type(void, int);

        let pos = ctx.builtin_position();
        let attr = Attribute::new(AttributeKind::GnuStdcall, pos);
        let changed = handle_type_attributes(&mut ctx, &[attr], fty);
        assert_ne!(changed, fty);
        match &ctx.ty(changed).kind {
            TypeKind::Function(function) => {
                assert_eq!(function.calling_convention, CallingConvention::Stdcall);
            }
            _ => panic!("expected function type"),
        }
    }

    #[test]
    fn packed_attribute_marks_the_compound() {
        let mut ctx = Context::new(Config::default());
        let s = ctx.intern("S");
        let compound = ctx.define_compound(Some(s), false);
        let ty = ctx.identify_new_type(crate::types::Type::new(TypeKind::CompoundStruct(
            compound,
        )));
        let pos = ctx.builtin_position();
        let attr = Attribute::new(AttributeKind::GnuPacked, pos);
        handle_type_attributes(&mut ctx, &[attr], ty);
        assert!(ctx.compound(compound).packed);
    }

    #[test]
    fn attributes_equal_compares_kind_and_arguments() {
        let mut ctx = Context::new(Config::default());
        let pos = ctx.builtin_position();
        let a = ctx.intern("a");
        let b = ctx.intern("b");

        let attr1 = Attribute::with_arguments(
            AttributeKind::GnuSection,
            pos,
            vec![AttributeArgument::Symbol(a)],
        );
        let attr2 = Attribute::with_arguments(
            AttributeKind::GnuSection,
            pos,
            vec![AttributeArgument::Symbol(a)],
        );
        let attr3 = Attribute::with_arguments(
            AttributeKind::GnuSection,
            pos,
            vec![AttributeArgument::Symbol(b)],
        );
        assert!(attributes_equal(&attr1, &attr2));
        assert!(!attributes_equal(&attr1, &attr3));
        assert!(!attributes_equal(
            &attr1,
            &Attribute::new(AttributeKind::GnuPacked, pos)
        ));
    }
}
