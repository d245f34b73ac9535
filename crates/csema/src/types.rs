//! The type graph.
//!
//! Types are tagged variants kept in a hash-cons table owned by the
//! [`Context`](crate::context::Context): every constructor ends in
//! [`identify_new_type`](crate::context::Context::identify_new_type), so two
//! structurally equal types always share one [`TypeRef`] and identity
//! comparison of refs is structural equality. An identified type is never
//! mutated; to derive a changed type, clone it with `duplicate_type` and
//! identify the copy.
//!
//! Qualifier placement follows C semantics: qualifying an array qualifies
//! its element type, never the array itself.

use std::collections::HashMap;
use std::fmt;
use std::mem::discriminant;

use bitflags::bitflags;

use crate::config::{CMode, Config};
use crate::context::Context;
use crate::entity::{DeclModifiers, EntityId, EntityKind};
use crate::symbol::Symbol;

/// Reference to an identified type. Equality is structural equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(pub(crate) u32);

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ty({})", self.0)
    }
}

/// Reference to an expression embedded in a type (a VLA size, a bit-field
/// width or a `typeof` operand). Two types built from the same embedded
/// expression share the id, which stands in for pointer equality in the
/// hash-cons key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeExprId(pub(crate) u32);

impl fmt::Debug for TypeExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TyExpr({})", self.0)
    }
}

bitflags! {
    /// `const`/`volatile`/`restrict` qualifier set.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct Qualifiers: u8 {
        const CONST    = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
    }
}

/// The fundamental scalar kinds.
///
/// (C99 6.2.5)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum AtomicKind {
    Void,
    Bool,
    WcharT,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
}

pub const ATOMIC_KIND_COUNT: usize = 17;

impl AtomicKind {
    pub const ALL: [AtomicKind; ATOMIC_KIND_COUNT] = [
        AtomicKind::Void,
        AtomicKind::Bool,
        AtomicKind::WcharT,
        AtomicKind::Char,
        AtomicKind::SignedChar,
        AtomicKind::UnsignedChar,
        AtomicKind::Short,
        AtomicKind::UnsignedShort,
        AtomicKind::Int,
        AtomicKind::UnsignedInt,
        AtomicKind::Long,
        AtomicKind::UnsignedLong,
        AtomicKind::LongLong,
        AtomicKind::UnsignedLongLong,
        AtomicKind::Float,
        AtomicKind::Double,
        AtomicKind::LongDouble,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct AtomicTypeFlags: u8 {
        const INTEGER    = 1 << 0;
        const FLOAT      = 1 << 1;
        const ARITHMETIC = 1 << 2;
        const COMPLEX    = 1 << 3;
        const SIGNED     = 1 << 4;
    }
}

/// Size, alignment and classification of one atomic kind.
#[derive(Clone, Copy, Debug)]
pub struct AtomicProperties {
    pub size: u32,
    pub alignment: u32,
    pub flags: AtomicTypeFlags,
}

impl AtomicProperties {
    const NONE: AtomicProperties = AtomicProperties {
        size: 0,
        alignment: 0,
        flags: AtomicTypeFlags::empty(),
    };
}

/// Name-binding policy of a function type, governs mangling.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Linkage {
    C,
    Cxx,
}

/// Machine-level parameter passing contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CallingConvention {
    Default,
    Cdecl,
    Stdcall,
    Fastcall,
    Thiscall,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PointerType {
    pub points_to: TypeRef,
    /// MS `__based(variable)` extension.
    pub base_variable: Option<EntityId>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ReferenceType {
    pub refers_to: TypeRef,
}

/// Size of an array type. An unknown size only ever matches an unknown
/// size in the hash-cons key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ArraySize {
    Unknown,
    Constant(u64),
    /// Variable length array, size determined by the referenced expression.
    Variable(TypeExprId),
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType {
    pub element_type: TypeRef,
    pub size: ArraySize,
    /// `[static n]` in a parameter declaration.
    pub is_static: bool,
    /// Size was derived from the initializer rather than written out.
    pub has_implicit_size: bool,
}

impl ArrayType {
    pub fn is_vla(&self) -> bool {
        matches!(self.size, ArraySize::Variable(_))
    }
}

/// A single function parameter. The name is kept for printing K&R style
/// declarations but takes no part in type identity.
#[derive(Clone, Debug)]
pub struct FunctionParameter {
    pub ty: TypeRef,
    pub symbol: Option<Symbol>,
}

impl PartialEq for FunctionParameter {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl Eq for FunctionParameter {}

impl std::hash::Hash for FunctionParameter {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FunctionType {
    pub return_type: TypeRef,
    pub parameters: Vec<FunctionParameter>,
    pub variadic: bool,
    /// Declared without a prototype (`f()` in the C89 sense).
    pub unspecified_parameters: bool,
    pub kr_style_parameters: bool,
    pub linkage: Linkage,
    pub calling_convention: CallingConvention,
    pub modifiers: DeclModifiers,
}

impl FunctionType {
    pub fn new(return_type: TypeRef) -> Self {
        FunctionType {
            return_type,
            parameters: Vec::new(),
            variadic: false,
            unspecified_parameters: false,
            kr_style_parameters: false,
            linkage: Linkage::C,
            calling_convention: CallingConvention::Default,
            modifiers: DeclModifiers::empty(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct EnumType {
    pub entity: EntityId,
    /// The underlying atomic kind the enum is represented as.
    pub akind: AtomicKind,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BitfieldType {
    pub base_type: TypeRef,
    pub bit_size: u32,
    pub size_expression: Option<TypeExprId>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypedefType {
    pub entity: EntityId,
    pub resolved: Option<TypeRef>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeofType {
    pub expression: Option<TypeExprId>,
    pub typeof_type: Option<TypeRef>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BuiltinType {
    pub symbol: Symbol,
    pub real_type: TypeRef,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeKind {
    Error,
    Invalid,
    Atomic(AtomicKind),
    Complex(AtomicKind),
    Imaginary(AtomicKind),
    Pointer(PointerType),
    Reference(ReferenceType),
    Array(ArrayType),
    Function(FunctionType),
    CompoundStruct(EntityId),
    CompoundUnion(EntityId),
    Enum(EnumType),
    Bitfield(BitfieldType),
    Typedef(TypedefType),
    Typeof(TypeofType),
    Builtin(BuiltinType),
}

/// A type: a variant payload plus a qualifier set. The pair is the
/// hash-cons key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Type {
    pub qualifiers: Qualifiers,
    pub kind: TypeKind,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Type {
            qualifiers: Qualifiers::empty(),
            kind,
        }
    }

    pub fn qualified(qualifiers: Qualifiers, kind: TypeKind) -> Self {
        Type { qualifiers, kind }
    }
}

/// The hash-cons table.
#[derive(Debug, Default)]
pub(crate) struct TypeTable {
    types: Vec<Type>,
    table: HashMap<Type, TypeRef>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable::default();
        // Pre-seed the sentinels so that a default TypeRef is harmless.
        table.identify(Type::new(TypeKind::Error));
        table.identify(Type::new(TypeKind::Invalid));
        table
    }

    pub fn identify(&mut self, ty: Type) -> TypeRef {
        if let Some(&existing) = self.table.get(&ty) {
            return existing;
        }
        let r = TypeRef(self.types.len() as u32);
        log::trace!("new type {:?}: {:?}", r, ty.kind);
        self.types.push(ty.clone());
        self.table.insert(ty, r);
        r
    }

    pub fn get(&self, r: TypeRef) -> &Type {
        &self.types[r.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

pub(crate) fn build_atomic_properties(
    config: &Config,
) -> [AtomicProperties; ATOMIC_KIND_COUNT] {
    use AtomicKind::*;

    let int_flags = AtomicTypeFlags::INTEGER | AtomicTypeFlags::ARITHMETIC;
    let sint_flags = int_flags | AtomicTypeFlags::SIGNED;
    let float_flags =
        AtomicTypeFlags::FLOAT | AtomicTypeFlags::ARITHMETIC | AtomicTypeFlags::SIGNED;

    let mut props = [AtomicProperties::NONE; ATOMIC_KIND_COUNT];
    let mut set = |kind: AtomicKind, size: u32, alignment: u32, flags: AtomicTypeFlags| {
        props[kind.index()] = AtomicProperties {
            size,
            alignment,
            flags,
        };
    };

    let char_flags = if config.char_is_signed {
        sint_flags
    } else {
        int_flags
    };
    let int_size = if config.machine_size < 32 { 2 } else { 4 };
    let long_size = if config.machine_size < 64 { 4 } else { 8 };
    let llong_size = if config.machine_size < 32 { 4 } else { 8 };

    set(Void, 0, 0, AtomicTypeFlags::empty());
    set(Char, 1, 1, char_flags);
    set(SignedChar, 1, 1, sint_flags);
    set(UnsignedChar, 1, 1, int_flags);
    set(Short, 2, 2, sint_flags);
    set(UnsignedShort, 2, 2, int_flags);
    set(Int, int_size, int_size, sint_flags);
    set(UnsignedInt, int_size, int_size, int_flags);
    set(Long, long_size, long_size, sint_flags);
    set(UnsignedLong, long_size, long_size, int_flags);
    set(LongLong, llong_size, llong_size, sint_flags);
    set(UnsignedLongLong, llong_size, llong_size, int_flags);
    set(Float, 4, 4, float_flags);
    set(Double, 8, 8, float_flags);
    set(LongDouble, 16, 16, float_flags);

    if config.machine_size == 32 {
        // x86 convention: 8 and 12 byte scalars keep 4 byte alignment.
        props[Double.index()].alignment = 4;
        props[LongDouble.index()].size = 12;
        props[LongDouble.index()].alignment = 4;
        props[LongLong.index()].alignment = 4;
        props[UnsignedLongLong.index()].alignment = 4;
    }
    if config.force_long_double_size > 0 {
        props[LongDouble.index()].size = config.force_long_double_size;
        props[LongDouble.index()].alignment = config.force_long_double_size;
    }

    props[Bool.index()] = props[UnsignedChar.index()];
    props[WcharT.index()] = props[config.wchar_kind.index()];

    props
}

impl Context {
    /// Hashes the given type and returns the canonical representative.
    pub fn identify_new_type(&mut self, ty: Type) -> TypeRef {
        self.types.identify(ty)
    }

    /// Shallow copy for modification; the caller must re-identify.
    pub fn duplicate_type(&self, ty: TypeRef) -> Type {
        self.ty(ty).clone()
    }

    pub fn make_atomic_type(&mut self, akind: AtomicKind, qualifiers: Qualifiers) -> TypeRef {
        self.identify_new_type(Type::qualified(qualifiers, TypeKind::Atomic(akind)))
    }

    pub fn make_complex_type(&mut self, akind: AtomicKind, qualifiers: Qualifiers) -> TypeRef {
        self.identify_new_type(Type::qualified(qualifiers, TypeKind::Complex(akind)))
    }

    pub fn make_imaginary_type(&mut self, akind: AtomicKind, qualifiers: Qualifiers) -> TypeRef {
        self.identify_new_type(Type::qualified(qualifiers, TypeKind::Imaginary(akind)))
    }

    pub fn make_pointer_type(&mut self, points_to: TypeRef, qualifiers: Qualifiers) -> TypeRef {
        self.identify_new_type(Type::qualified(
            qualifiers,
            TypeKind::Pointer(PointerType {
                points_to,
                base_variable: None,
            }),
        ))
    }

    pub fn make_based_pointer_type(
        &mut self,
        points_to: TypeRef,
        qualifiers: Qualifiers,
        variable: EntityId,
    ) -> TypeRef {
        self.identify_new_type(Type::qualified(
            qualifiers,
            TypeKind::Pointer(PointerType {
                points_to,
                base_variable: Some(variable),
            }),
        ))
    }

    pub fn make_reference_type(&mut self, refers_to: TypeRef) -> TypeRef {
        self.identify_new_type(Type::new(TypeKind::Reference(ReferenceType { refers_to })))
    }

    pub fn make_array_type(
        &mut self,
        element_type: TypeRef,
        size: u64,
        qualifiers: Qualifiers,
    ) -> TypeRef {
        self.identify_new_type(Type::qualified(
            qualifiers,
            TypeKind::Array(ArrayType {
                element_type,
                size: ArraySize::Constant(size),
                is_static: false,
                has_implicit_size: false,
            }),
        ))
    }

    pub fn make_function_0_type(&mut self, return_type: TypeRef) -> TypeRef {
        let function = FunctionType::new(return_type);
        self.identify_new_type(Type::new(TypeKind::Function(function)))
    }

    pub fn make_function_1_type(&mut self, return_type: TypeRef, argument: TypeRef) -> TypeRef {
        let mut function = FunctionType::new(return_type);
        function.parameters.push(FunctionParameter {
            ty: argument,
            symbol: None,
        });
        self.identify_new_type(Type::new(TypeKind::Function(function)))
    }

    pub fn make_function_1_type_variadic(
        &mut self,
        return_type: TypeRef,
        argument: TypeRef,
    ) -> TypeRef {
        let mut function = FunctionType::new(return_type);
        function.parameters.push(FunctionParameter {
            ty: argument,
            symbol: None,
        });
        function.variadic = true;
        self.identify_new_type(Type::new(TypeKind::Function(function)))
    }

    pub fn make_function_2_type(
        &mut self,
        return_type: TypeRef,
        argument1: TypeRef,
        argument2: TypeRef,
    ) -> TypeRef {
        let mut function = FunctionType::new(return_type);
        for &ty in &[argument1, argument2] {
            function.parameters.push(FunctionParameter { ty, symbol: None });
        }
        self.identify_new_type(Type::new(TypeKind::Function(function)))
    }

    pub fn make_function_type(
        &mut self,
        return_type: TypeRef,
        argument_types: &[TypeRef],
        modifiers: DeclModifiers,
    ) -> TypeRef {
        let mut function = FunctionType::new(return_type);
        function.modifiers = modifiers;
        for &ty in argument_types {
            function.parameters.push(FunctionParameter { ty, symbol: None });
        }
        self.identify_new_type(Type::new(TypeKind::Function(function)))
    }

    /// Follows `Typedef`/`Typeof` chains without collecting qualifiers.
    /// The result is never a typeref variant (except behind `Error`).
    pub(crate) fn typeref_target(&self, mut ty: TypeRef) -> TypeRef {
        loop {
            let t = self.ty(ty);
            match &t.kind {
                TypeKind::Typedef(td) => {
                    ty = match td.resolved {
                        Some(resolved) => resolved,
                        None => match &self.entity(td.entity).kind {
                            EntityKind::Typedef(tde) => tde.ty,
                            _ => panic!("typedef type does not reference a typedef entity"),
                        },
                    };
                }
                TypeKind::Typeof(to) => {
                    ty = match to.typeof_type {
                        Some(target) => target,
                        None => {
                            let expr = to
                                .expression
                                .expect("typeof without type or expression");
                            self.type_expr(expr).ty
                        }
                    };
                }
                _ => return ty,
            }
        }
    }

    /// Skips all typerefs, accumulating their qualifiers onto the
    /// underlying type. For array types the qualifiers land on the element
    /// type. The result is identified.
    pub fn skip_typeref(&mut self, orig: TypeRef) -> TypeRef {
        let mut qualifiers = Qualifiers::empty();
        let mut ty = orig;
        loop {
            let t = self.ty(ty);
            match &t.kind {
                TypeKind::Error => return ty,
                TypeKind::Typedef(td) => {
                    qualifiers |= t.qualifiers;
                    ty = match td.resolved {
                        Some(resolved) => resolved,
                        None => match &self.entity(td.entity).kind {
                            EntityKind::Typedef(tde) => tde.ty,
                            _ => panic!("typedef type does not reference a typedef entity"),
                        },
                    };
                }
                TypeKind::Typeof(to) => {
                    qualifiers |= t.qualifiers;
                    ty = match to.typeof_type {
                        Some(target) => target,
                        None => {
                            let expr = to
                                .expression
                                .expect("typeof without type or expression");
                            self.type_expr(expr).ty
                        }
                    };
                }
                _ => break,
            }
        }

        if qualifiers.is_empty() {
            return ty;
        }

        let mut copy = self.duplicate_type(ty);
        // const applied through a typedef of an array type qualifies the
        // element type.
        if let TypeKind::Array(ref mut array) = copy.kind {
            let mut element = self.duplicate_type(array.element_type);
            element.qualifiers |= qualifiers;
            array.element_type = self.identify_new_type(element);
        } else {
            copy.qualifiers |= qualifiers;
        }
        self.identify_new_type(copy)
    }

    /// Returns the unqualified variant of `ty` (which must not be a
    /// typeref; typerefs are resolved first).
    pub fn get_unqualified_type(&mut self, ty: TypeRef) -> TypeRef {
        let ty = self.typeref_target(ty);
        if self.ty(ty).qualifiers.is_empty() {
            return ty;
        }
        let mut copy = self.duplicate_type(ty);
        copy.qualifiers = Qualifiers::empty();
        self.identify_new_type(copy)
    }

    /// Adds `qual` to the type. For array types the element type is
    /// adjusted instead. Returns the original reference when nothing
    /// changes.
    pub fn get_qualified_type(&mut self, orig: TypeRef, qual: Qualifiers) -> TypeRef {
        let ty = self.skip_typeref(orig);

        let copy = match self.ty(ty).kind {
            TypeKind::Array(ref array) => {
                let element_type = array.element_type;
                let qualified_element = self.get_qualified_type(element_type, qual);
                if qualified_element == element_type {
                    return orig;
                }
                let mut copy = self.duplicate_type(ty);
                match copy.kind {
                    TypeKind::Array(ref mut array) => array.element_type = qualified_element,
                    _ => unreachable!(),
                }
                copy
            }
            TypeKind::Invalid => return ty,
            _ => {
                if self.ty(ty).qualifiers.contains(qual) {
                    return orig;
                }
                let mut copy = self.duplicate_type(ty);
                copy.qualifiers |= qual;
                copy
            }
        };

        self.identify_new_type(copy)
    }

    /// The effective qualifiers of a type, looking through typerefs (and,
    /// if requested, through array types onto their elements).
    pub fn get_type_qualifier(&self, orig: TypeRef, skip_array_type: bool) -> Qualifiers {
        let mut qualifiers = Qualifiers::empty();
        let mut ty = orig;
        loop {
            let t = self.ty(ty);
            match &t.kind {
                TypeKind::Error => return Qualifiers::empty(),
                TypeKind::Typedef(_) | TypeKind::Typeof(_) => {
                    qualifiers |= t.qualifiers;
                    ty = self.typeref_step(ty);
                }
                TypeKind::Array(array) if skip_array_type => {
                    ty = array.element_type;
                }
                _ => return t.qualifiers | qualifiers,
            }
        }
    }

    fn typeref_step(&self, ty: TypeRef) -> TypeRef {
        match &self.ty(ty).kind {
            TypeKind::Typedef(td) => match td.resolved {
                Some(resolved) => resolved,
                None => match &self.entity(td.entity).kind {
                    EntityKind::Typedef(tde) => tde.ty,
                    _ => panic!("typedef type does not reference a typedef entity"),
                },
            },
            TypeKind::Typeof(to) => match to.typeof_type {
                Some(target) => target,
                None => {
                    let expr = to.expression.expect("typeof without type or expression");
                    self.type_expr(expr).ty
                }
            },
            _ => ty,
        }
    }

    // -- predicates ---------------------------------------------------

    fn resolved_kind(&self, ty: TypeRef) -> &TypeKind {
        &self.ty(self.typeref_target(ty)).kind
    }

    pub fn is_type_valid(&self, ty: TypeRef) -> bool {
        !matches!(self.resolved_kind(ty), TypeKind::Invalid)
    }

    pub fn is_type_integer(&self, ty: TypeRef) -> bool {
        match self.resolved_kind(ty) {
            TypeKind::Enum(_) | TypeKind::Bitfield(_) => true,
            TypeKind::Atomic(akind) => self
                .get_atomic_type_flags(*akind)
                .contains(AtomicTypeFlags::INTEGER),
            _ => false,
        }
    }

    pub fn is_type_enum(&self, ty: TypeRef) -> bool {
        matches!(self.resolved_kind(ty), TypeKind::Enum(_))
    }

    pub fn is_type_float(&self, ty: TypeRef) -> bool {
        match self.resolved_kind(ty) {
            TypeKind::Atomic(akind) => self
                .get_atomic_type_flags(*akind)
                .contains(AtomicTypeFlags::FLOAT),
            _ => false,
        }
    }

    pub fn is_type_signed(&self, ty: TypeRef) -> bool {
        match self.resolved_kind(ty) {
            // enum types are int for now
            TypeKind::Enum(_) => true,
            TypeKind::Bitfield(bitfield) => self.is_type_signed(bitfield.base_type),
            TypeKind::Atomic(akind) => self
                .get_atomic_type_flags(*akind)
                .contains(AtomicTypeFlags::SIGNED),
            _ => false,
        }
    }

    pub fn is_type_arithmetic(&self, ty: TypeRef) -> bool {
        match self.resolved_kind(ty) {
            TypeKind::Bitfield(_) | TypeKind::Enum(_) => true,
            TypeKind::Atomic(akind) | TypeKind::Complex(akind) | TypeKind::Imaginary(akind) => {
                self.get_atomic_type_flags(*akind)
                    .contains(AtomicTypeFlags::ARITHMETIC)
            }
            _ => false,
        }
    }

    /// Integer or floating type (C99 6.2.5 (17)).
    pub fn is_type_real(&self, ty: TypeRef) -> bool {
        self.is_type_integer(ty) || self.is_type_float(ty)
    }

    pub fn is_type_scalar(&self, ty: TypeRef) -> bool {
        match self.resolved_kind(ty) {
            TypeKind::Pointer(_) => true,
            TypeKind::Builtin(builtin) => self.is_type_scalar(builtin.real_type),
            _ => self.is_type_arithmetic(ty),
        }
    }

    pub fn is_type_pointer(&self, ty: TypeRef) -> bool {
        matches!(self.resolved_kind(ty), TypeKind::Pointer(_))
    }

    pub fn is_type_array(&self, ty: TypeRef) -> bool {
        matches!(self.resolved_kind(ty), TypeKind::Array(_))
    }

    pub fn is_type_function(&self, ty: TypeRef) -> bool {
        matches!(self.resolved_kind(ty), TypeKind::Function(_))
    }

    /// True if the type is only a forward declaration or otherwise
    /// incomplete.
    pub fn is_type_incomplete(&self, ty: TypeRef) -> bool {
        match self.resolved_kind(ty) {
            TypeKind::CompoundStruct(compound) | TypeKind::CompoundUnion(compound) => {
                !self.compound(*compound).complete
            }
            TypeKind::Enum(_) => false,
            TypeKind::Array(array) => matches!(array.size, ArraySize::Unknown),
            TypeKind::Atomic(akind) | TypeKind::Complex(akind) | TypeKind::Imaginary(akind) => {
                *akind == AtomicKind::Void
            }
            TypeKind::Bitfield(_)
            | TypeKind::Function(_)
            | TypeKind::Pointer(_)
            | TypeKind::Reference(_)
            | TypeKind::Builtin(_)
            | TypeKind::Error => false,
            TypeKind::Invalid => panic!("invalid type in is_type_incomplete"),
            TypeKind::Typedef(_) | TypeKind::Typeof(_) => unreachable!(),
        }
    }

    pub fn is_type_complete(&self, ty: TypeRef) -> bool {
        !self.is_type_incomplete(ty)
    }

    /// An object type is anything that is neither a function nor
    /// incomplete.
    pub fn is_type_object(&self, ty: TypeRef) -> bool {
        !self.is_type_function(ty) && !self.is_type_incomplete(ty)
    }

    pub fn is_builtin_va_list(&self, ty: TypeRef) -> bool {
        let target = self.typeref_target(ty);
        let valist = self.predef.type_valist;
        match (&self.ty(target).kind, &self.ty(valist).kind) {
            (TypeKind::Builtin(a), TypeKind::Builtin(b)) => a.symbol == b.symbol,
            _ => false,
        }
    }

    // -- compatibility ------------------------------------------------

    fn function_types_compatible(&mut self, func1: &FunctionType, func2: &FunctionType) -> bool {
        let ret1 = self.skip_typeref(func1.return_type);
        let ret2 = self.skip_typeref(func2.return_type);
        if !self.types_compatible(ret1, ret2) {
            return false;
        }

        if func1.linkage != func2.linkage {
            return false;
        }

        let effective = |cc: CallingConvention, config: &Config| match cc {
            CallingConvention::Default => config.default_calling_convention,
            other => other,
        };
        if effective(func1.calling_convention, &self.config)
            != effective(func2.calling_convention, &self.config)
        {
            return false;
        }

        if func1.variadic != func2.variadic {
            return false;
        }

        // can parameters be compared?
        if (func1.unspecified_parameters && !func1.kr_style_parameters)
            || (func2.unspecified_parameters && !func2.kr_style_parameters)
        {
            return true;
        }

        if func1.parameters.len() != func2.parameters.len() {
            return false;
        }
        for (parameter1, parameter2) in func1.parameters.iter().zip(&func2.parameters) {
            let ty1 = self.skip_typeref(parameter1.ty);
            let ty2 = self.skip_typeref(parameter2.ty);
            let ty1 = self.get_unqualified_type(ty1);
            let ty2 = self.get_unqualified_type(ty2);
            if !self.types_compatible(ty1, ty2) {
                return false;
            }
        }
        true
    }

    fn array_types_compatible(&mut self, array1: &ArrayType, array2: &ArrayType) -> bool {
        let element1 = self.skip_typeref(array1.element_type);
        let element2 = self.skip_typeref(array2.element_type);
        if !self.types_compatible(element1, element2) {
            return false;
        }

        match (array1.size, array2.size) {
            (ArraySize::Constant(size1), ArraySize::Constant(size2)) => size1 == size2,
            _ => true,
        }
    }

    /// C compatibility of two types (C99 6.2.7). Both sides are skipped
    /// first.
    pub fn types_compatible(&mut self, ty1: TypeRef, ty2: TypeRef) -> bool {
        let ty1 = self.skip_typeref(ty1);
        let ty2 = self.skip_typeref(ty2);

        // shortcut: hash-consing makes identity equality structural
        if ty1 == ty2 {
            return true;
        }

        if !self.is_type_valid(ty1) || !self.is_type_valid(ty2) {
            return true;
        }

        // the error type is compatible with everything
        if matches!(self.ty(ty1).kind, TypeKind::Error)
            || matches!(self.ty(ty2).kind, TypeKind::Error)
        {
            return true;
        }

        let type1 = self.ty(ty1);
        let type2 = self.ty(ty2);
        if type1.qualifiers != type2.qualifiers {
            return false;
        }
        if discriminant(&type1.kind) != discriminant(&type2.kind) {
            return false;
        }

        match (type1.kind.clone(), type2.kind.clone()) {
            (TypeKind::Function(func1), TypeKind::Function(func2)) => {
                self.function_types_compatible(&func1, &func2)
            }
            (TypeKind::Atomic(kind1), TypeKind::Atomic(kind2))
            | (TypeKind::Complex(kind1), TypeKind::Complex(kind2))
            | (TypeKind::Imaginary(kind1), TypeKind::Imaginary(kind2)) => kind1 == kind2,
            (TypeKind::Array(array1), TypeKind::Array(array2)) => {
                self.array_types_compatible(&array1, &array2)
            }
            (TypeKind::Pointer(pointer1), TypeKind::Pointer(pointer2)) => {
                let to1 = self.skip_typeref(pointer1.points_to);
                let to2 = self.skip_typeref(pointer2.points_to);
                self.types_compatible(to1, to2)
            }
            (TypeKind::Reference(ref1), TypeKind::Reference(ref2)) => {
                let to1 = self.skip_typeref(ref1.refers_to);
                let to2 = self.skip_typeref(ref2.refers_to);
                self.types_compatible(to1, to2)
            }
            // Compound and enum types are hash-consed by their entity, so
            // any compatibility beyond identity fell out above. Name-based
            // cross-unit compatibility is intentionally not implemented.
            (TypeKind::CompoundStruct(_), _)
            | (TypeKind::CompoundUnion(_), _)
            | (TypeKind::Enum(_), _)
            | (TypeKind::Builtin(_), _) => false,
            (TypeKind::Bitfield(_), _) => {
                panic!("type compatibility check for bitfield type")
            }
            (TypeKind::Error, _) => true,
            _ => false,
        }
    }

    // -- sizes and alignments -----------------------------------------

    pub fn get_type_size(&mut self, ty: TypeRef) -> u32 {
        match self.ty(ty).kind.clone() {
            TypeKind::Error => 0,
            TypeKind::Atomic(akind) => self.get_atomic_type_size(akind),
            TypeKind::Complex(akind) => self.get_atomic_type_size(akind) * 2,
            TypeKind::Imaginary(akind) => self.get_atomic_type_size(akind),
            TypeKind::CompoundUnion(compound) => {
                self.layout_union_type(ty);
                self.compound(compound).size
            }
            TypeKind::CompoundStruct(compound) => {
                self.layout_struct_type(ty);
                self.compound(compound).size
            }
            TypeKind::Enum(enum_type) => self.get_atomic_type_size(enum_type.akind),
            TypeKind::Function(_) => 0,
            TypeKind::Reference(_) | TypeKind::Pointer(_) => self.config.pointer_size(),
            TypeKind::Array(array) => {
                let element_size = self.get_type_size(array.element_type);
                match array.size {
                    ArraySize::Constant(size) => size as u32 * element_size,
                    ArraySize::Unknown | ArraySize::Variable(_) => 0,
                }
            }
            TypeKind::Bitfield(_) => 0,
            TypeKind::Builtin(builtin) => self.get_type_size(builtin.real_type),
            TypeKind::Typedef(_) | TypeKind::Typeof(_) => {
                let target = self.typeref_step(ty);
                self.get_type_size(target)
            }
            TypeKind::Invalid => panic!("invalid type in get_type_size"),
        }
    }

    pub fn get_type_alignment(&mut self, ty: TypeRef) -> u32 {
        match self.ty(ty).kind.clone() {
            TypeKind::Error => 0,
            TypeKind::Atomic(akind)
            | TypeKind::Complex(akind)
            | TypeKind::Imaginary(akind) => self.get_atomic_type_alignment(akind),
            TypeKind::CompoundUnion(compound) => {
                self.layout_union_type(ty);
                self.compound(compound).alignment
            }
            TypeKind::CompoundStruct(compound) => {
                self.layout_struct_type(ty);
                self.compound(compound).alignment
            }
            TypeKind::Enum(enum_type) => self.get_atomic_type_alignment(enum_type.akind),
            TypeKind::Function(_) => 4,
            TypeKind::Reference(_) | TypeKind::Pointer(_) => self.config.pointer_size(),
            TypeKind::Array(array) => self.get_type_alignment(array.element_type),
            TypeKind::Bitfield(_) => 0,
            TypeKind::Builtin(builtin) => self.get_type_alignment(builtin.real_type),
            TypeKind::Typedef(typedef) => {
                let underlying = self.typeref_step(ty);
                let mut alignment = self.get_type_alignment(underlying);
                if let EntityKind::Typedef(tde) = &self.entity(typedef.entity).kind {
                    if tde.alignment > alignment {
                        alignment = tde.alignment;
                    }
                }
                alignment
            }
            TypeKind::Typeof(_) => {
                let target = self.typeref_step(ty);
                self.get_type_alignment(target)
            }
            TypeKind::Invalid => panic!("invalid type in get_type_alignment"),
        }
    }

    /// Read-only size computation for constant folding. Compound types are
    /// only sized if they have already been laid out.
    pub(crate) fn try_type_size(&self, ty: TypeRef) -> Option<u32> {
        match &self.ty(self.typeref_target(ty)).kind {
            TypeKind::Atomic(akind) => Some(self.get_atomic_type_size(*akind)),
            TypeKind::Complex(akind) => Some(self.get_atomic_type_size(*akind) * 2),
            TypeKind::Imaginary(akind) => Some(self.get_atomic_type_size(*akind)),
            TypeKind::Enum(enum_type) => Some(self.get_atomic_type_size(enum_type.akind)),
            TypeKind::Pointer(_) | TypeKind::Reference(_) => Some(self.config.pointer_size()),
            TypeKind::CompoundStruct(compound) | TypeKind::CompoundUnion(compound) => {
                let compound = self.compound(*compound);
                if compound.layouted {
                    Some(compound.size)
                } else {
                    None
                }
            }
            TypeKind::Array(array) => match array.size {
                ArraySize::Constant(size) => {
                    let element = self.try_type_size(array.element_type)?;
                    Some(size as u32 * element)
                }
                _ => None,
            },
            TypeKind::Builtin(builtin) => self.try_type_size(builtin.real_type),
            _ => None,
        }
    }

    pub(crate) fn try_type_alignment(&self, ty: TypeRef) -> Option<u32> {
        match &self.ty(self.typeref_target(ty)).kind {
            TypeKind::Atomic(akind)
            | TypeKind::Complex(akind)
            | TypeKind::Imaginary(akind) => Some(self.get_atomic_type_alignment(*akind)),
            TypeKind::Enum(enum_type) => Some(self.get_atomic_type_alignment(enum_type.akind)),
            TypeKind::Pointer(_) | TypeKind::Reference(_) => Some(self.config.pointer_size()),
            TypeKind::CompoundStruct(compound) | TypeKind::CompoundUnion(compound) => {
                let compound = self.compound(*compound);
                if compound.layouted {
                    Some(compound.alignment)
                } else {
                    None
                }
            }
            TypeKind::Array(array) => self.try_type_alignment(array.element_type),
            TypeKind::Builtin(builtin) => self.try_type_alignment(builtin.real_type),
            _ => None,
        }
    }

    /// The declaration modifiers a type carries (through typedefs and
    /// builtins).
    pub fn get_type_modifiers(&self, ty: TypeRef) -> DeclModifiers {
        match &self.ty(ty).kind {
            TypeKind::CompoundStruct(compound) | TypeKind::CompoundUnion(compound) => {
                self.compound(*compound).modifiers
            }
            TypeKind::Function(function) => function.modifiers,
            TypeKind::Builtin(builtin) => self.get_type_modifiers(builtin.real_type),
            TypeKind::Typedef(typedef) => {
                let mut modifiers = match &self.entity(typedef.entity).kind {
                    EntityKind::Typedef(tde) => tde.modifiers,
                    _ => DeclModifiers::empty(),
                };
                modifiers |= self.get_type_modifiers(self.typeref_step(ty));
                modifiers
            }
            TypeKind::Typeof(_) => self.get_type_modifiers(self.typeref_step(ty)),
            _ => DeclModifiers::empty(),
        }
    }

    // -- atomic kinds -------------------------------------------------

    pub fn get_atomic_type_size(&self, kind: AtomicKind) -> u32 {
        self.atomic_props[kind.index()].size
    }

    pub fn get_atomic_type_alignment(&self, kind: AtomicKind) -> u32 {
        self.atomic_props[kind.index()].alignment
    }

    pub fn get_atomic_type_flags(&self, kind: AtomicKind) -> AtomicTypeFlags {
        self.atomic_props[kind.index()].flags
    }

    pub fn get_atomic_kind_name(&self, kind: AtomicKind) -> &'static str {
        match kind {
            AtomicKind::Void => "void",
            AtomicKind::WcharT => "wchar_t",
            AtomicKind::Bool => {
                if self.config.c_mode.contains(CMode::CXX) {
                    "bool"
                } else {
                    "_Bool"
                }
            }
            AtomicKind::Char => "char",
            AtomicKind::SignedChar => "signed char",
            AtomicKind::UnsignedChar => "unsigned char",
            AtomicKind::Int => "int",
            AtomicKind::UnsignedInt => "unsigned int",
            AtomicKind::Short => "short",
            AtomicKind::UnsignedShort => "unsigned short",
            AtomicKind::Long => "long",
            AtomicKind::UnsignedLong => "unsigned long",
            AtomicKind::LongLong => "long long",
            AtomicKind::UnsignedLongLong => "unsigned long long",
            AtomicKind::LongDouble => "long double",
            AtomicKind::Float => "float",
            AtomicKind::Double => "double",
        }
    }

    /// The signed integer kind with pointer width.
    pub fn get_intptr_kind(&self) -> AtomicKind {
        if self.config.machine_size <= 32 {
            AtomicKind::Int
        } else if self.config.machine_size <= 64 {
            AtomicKind::Long
        } else {
            AtomicKind::LongLong
        }
    }

    /// The unsigned integer kind with pointer width.
    pub fn get_uintptr_kind(&self) -> AtomicKind {
        if self.config.machine_size <= 32 {
            AtomicKind::UnsignedInt
        } else if self.config.machine_size <= 64 {
            AtomicKind::UnsignedLong
        } else {
            AtomicKind::UnsignedLongLong
        }
    }

    /// The smallest signed integer kind with exactly `size` bytes.
    pub fn find_signed_int_atomic_type_kind_for_size(&self, size: u32) -> Option<AtomicKind> {
        self.signed_kinds_by_size
            .get(size as usize)
            .copied()
            .flatten()
    }

    /// The smallest unsigned integer kind with exactly `size` bytes.
    pub fn find_unsigned_int_atomic_type_kind_for_size(&self, size: u32) -> Option<AtomicKind> {
        self.unsigned_kinds_by_size
            .get(size as usize)
            .copied()
            .flatten()
    }
}

pub(crate) const KINDS_BY_SIZE_LIMIT: usize = 17;

pub(crate) fn build_kinds_by_size(
    props: &[AtomicProperties; ATOMIC_KIND_COUNT],
    candidates: &[AtomicKind],
) -> [Option<AtomicKind>; KINDS_BY_SIZE_LIMIT] {
    let mut kinds = [None; KINDS_BY_SIZE_LIMIT];
    for size in 0..KINDS_BY_SIZE_LIMIT {
        for &candidate in candidates {
            if props[candidate.index()].size as usize == size {
                kinds[size] = Some(candidate);
                break;
            }
        }
    }
    kinds
}

pub(crate) const SIGNED_SIZE_CANDIDATES: [AtomicKind; 5] = [
    AtomicKind::SignedChar,
    AtomicKind::Short,
    AtomicKind::Int,
    AtomicKind::Long,
    AtomicKind::LongLong,
];

pub(crate) const UNSIGNED_SIZE_CANDIDATES: [AtomicKind; 5] = [
    AtomicKind::UnsignedChar,
    AtomicKind::UnsignedShort,
    AtomicKind::UnsignedInt,
    AtomicKind::UnsignedLong,
    AtomicKind::UnsignedLongLong,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn hash_consing_is_idempotent() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let int_again = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        assert_eq!(int, int_again);

        let ptr1 = ctx.make_pointer_type(int, Qualifiers::empty());
        let ptr2 = ctx.make_pointer_type(int, Qualifiers::empty());
        assert_eq!(ptr1, ptr2);

        let const_int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::CONST);
        let const_ptr = ctx.make_pointer_type(const_int, Qualifiers::empty());
        assert_ne!(ptr1, const_ptr);

        // re-identifying an existing type yields the same reference
        let dup = ctx.duplicate_type(ptr1);
        assert_eq!(ctx.identify_new_type(dup), ptr1);
    }

    #[test]
    fn unqualified_strips_all_qualifiers() {
        let mut ctx = Context::new(Config::default());
        let ty = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::CONST | Qualifiers::VOLATILE);
        let unqual = ctx.get_unqualified_type(ty);
        assert!(ctx.ty(unqual).qualifiers.is_empty());
        assert_eq!(ctx.get_unqualified_type(unqual), unqual);
        assert_eq!(unqual, ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty()));
    }

    #[test]
    fn qualifying_an_array_qualifies_the_element() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let array = ctx.make_array_type(int, 4, Qualifiers::empty());
        let qualified = ctx.get_qualified_type(array, Qualifiers::CONST);

        assert!(ctx.ty(qualified).qualifiers.is_empty());
        match &ctx.ty(qualified).kind {
            TypeKind::Array(a) => {
                assert_eq!(ctx.ty(a.element_type).qualifiers, Qualifiers::CONST);
            }
            kind => panic!("expected array type, got {:?}", kind),
        }
    }

    #[test]
    fn skip_typeref_accumulates_qualifiers() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let name = ctx.intern("myint");
        let td = ctx.define_typedef(name, int);
        let td_type = ctx.identify_new_type(Type::qualified(
            Qualifiers::CONST,
            TypeKind::Typedef(TypedefType {
                entity: td,
                resolved: None,
            }),
        ));

        let skipped = ctx.skip_typeref(td_type);
        assert_eq!(ctx.ty(skipped).qualifiers, Qualifiers::CONST);
        assert!(matches!(
            ctx.ty(skipped).kind,
            TypeKind::Atomic(AtomicKind::Int)
        ));
        // idempotent
        assert_eq!(ctx.skip_typeref(skipped), skipped);
    }

    #[test]
    fn compatible_is_reflexive_and_symmetric() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let long = ctx.make_atomic_type(AtomicKind::Long, Qualifiers::empty());
        let f1 = ctx.make_function_1_type(int, long);
        let f2 = ctx.make_function_1_type(int, long);

        assert!(ctx.types_compatible(int, int));
        assert!(ctx.types_compatible(f1, f2));
        assert!(!ctx.types_compatible(int, long));
        assert!(!ctx.types_compatible(long, int));
    }

    #[test]
    fn unspecified_parameters_ignore_parameter_lists() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let void = ctx.make_atomic_type(AtomicKind::Void, Qualifiers::empty());

        let mut unspec = FunctionType::new(void);
        unspec.unspecified_parameters = true;
        let unspec = ctx.identify_new_type(Type::new(TypeKind::Function(unspec)));

        let with_params = ctx.make_function_1_type(void, int);
        assert!(ctx.types_compatible(unspec, with_params));
    }

    #[test]
    fn array_sizes_compare_when_both_constant() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let a4 = ctx.make_array_type(int, 4, Qualifiers::empty());
        let a4b = ctx.make_array_type(int, 4, Qualifiers::empty());
        let a8 = ctx.make_array_type(int, 8, Qualifiers::empty());
        let unknown = ctx.identify_new_type(Type::new(TypeKind::Array(ArrayType {
            element_type: int,
            size: ArraySize::Unknown,
            is_static: false,
            has_implicit_size: false,
        })));

        assert_eq!(a4, a4b);
        assert!(!ctx.types_compatible(a4, a8));
        assert!(ctx.types_compatible(a4, unknown));
        // unknown size only matches unknown size in the hash-cons key
        assert_ne!(a4, unknown);
    }

    #[test]
    fn machine_word_drives_integer_sizes() {
        let ctx32 = Context::new(Config::default());
        assert_eq!(ctx32.get_atomic_type_size(AtomicKind::Int), 4);
        assert_eq!(ctx32.get_atomic_type_size(AtomicKind::Long), 4);
        assert_eq!(ctx32.get_atomic_type_size(AtomicKind::LongLong), 8);
        assert_eq!(ctx32.get_atomic_type_alignment(AtomicKind::LongLong), 4);
        assert_eq!(ctx32.get_atomic_type_alignment(AtomicKind::Double), 4);

        let ctx64 = Context::new(Config {
            machine_size: 64,
            ..Config::default()
        });
        assert_eq!(ctx64.get_atomic_type_size(AtomicKind::Long), 8);
        assert_eq!(ctx64.get_atomic_type_alignment(AtomicKind::Double), 8);

        let ctx16 = Context::new(Config {
            machine_size: 16,
            ..Config::default()
        });
        assert_eq!(ctx16.get_atomic_type_size(AtomicKind::Int), 2);
        assert_eq!(ctx16.get_atomic_type_size(AtomicKind::LongLong), 4);
    }

    #[test]
    fn bool_and_wchar_alias_their_backing_kinds() {
        let ctx = Context::new(Config::default());
        assert_eq!(
            ctx.get_atomic_type_size(AtomicKind::Bool),
            ctx.get_atomic_type_size(AtomicKind::UnsignedChar)
        );
        assert_eq!(
            ctx.get_atomic_type_size(AtomicKind::WcharT),
            ctx.get_atomic_type_size(AtomicKind::Int)
        );

        let ctx = Context::new(Config {
            wchar_kind: AtomicKind::UnsignedShort,
            ..Config::default()
        });
        assert_eq!(ctx.get_atomic_type_size(AtomicKind::WcharT), 2);
        assert!(!ctx
            .get_atomic_type_flags(AtomicKind::WcharT)
            .contains(AtomicTypeFlags::SIGNED));
    }

    #[test]
    fn find_kind_for_size_returns_smallest_exact_match() {
        let ctx = Context::new(Config::default());
        assert_eq!(
            ctx.find_signed_int_atomic_type_kind_for_size(1),
            Some(AtomicKind::SignedChar)
        );
        assert_eq!(
            ctx.find_signed_int_atomic_type_kind_for_size(4),
            Some(AtomicKind::Int)
        );
        assert_eq!(
            ctx.find_unsigned_int_atomic_type_kind_for_size(8),
            Some(AtomicKind::UnsignedLongLong)
        );
        assert_eq!(ctx.find_signed_int_atomic_type_kind_for_size(3), None);
    }

    #[test]
    fn array_size_scales_element_size() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
        let array = ctx.make_array_type(int, 10, Qualifiers::empty());
        assert_eq!(ctx.get_type_size(array), 40);
        assert_eq!(ctx.get_type_alignment(array), 4);
    }
}
