//! Named entities and scopes.
//!
//! An entity is anything a name can refer to: variables, parameters,
//! compound members, functions, typedefs, tags, enum values, labels and
//! namespaces. Entities live in the context's arena for the whole
//! translation unit and are referenced by [`EntityId`]; a [`Scope`] keeps
//! them in declaration order.

use std::fmt;

use bitflags::bitflags;

use crate::ast::{Expression, Initializer, Statement};
use crate::attribute::Attribute;
use crate::context::Context;
use crate::diagnostic::SourcePosition;
use crate::symbol::Symbol;
use crate::types::TypeRef;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) u32);

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ent({})", self.0)
    }
}

/// Which name space an entity's symbol binds in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NamespaceKind {
    Normal,
    Tag,
    Label,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StorageClass {
    None,
    Extern,
    Static,
    Typedef,
    Auto,
    Register,
}

bitflags! {
    /// Declaration modifiers accumulated from attributes.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct DeclModifiers: u32 {
        const DLLIMPORT         = 1 << 0;
        const DLLEXPORT         = 1 << 1;
        const THREAD            = 1 << 2;
        const NAKED             = 1 << 3;
        const MICROSOFT_INLINE  = 1 << 4;
        const FORCEINLINE       = 1 << 5;
        const SELECTANY         = 1 << 6;
        const NOTHROW           = 1 << 7;
        const NOVTABLE          = 1 << 8;
        const NORETURN          = 1 << 9;
        const NOINLINE          = 1 << 10;
        const RESTRICT          = 1 << 11;
        const NOALIAS           = 1 << 12;
        const TRANSPARENT_UNION = 1 << 13;
        const CONST             = 1 << 14;
        const PURE              = 1 << 15;
        const CONSTRUCTOR       = 1 << 16;
        const DESTRUCTOR        = 1 << 17;
        const UNUSED            = 1 << 18;
        const USED              = 1 << 19;
        const CDECL             = 1 << 20;
        const FASTCALL          = 1 << 21;
        const STDCALL           = 1 << 22;
        const THISCALL          = 1 << 23;
        const DEPRECATED        = 1 << 24;
        const RETURNS_TWICE     = 1 << 25;
        const MALLOC            = 1 << 26;
        const WEAK              = 1 << 27;
    }
}

/// GNU builtin functions the front-end knows about.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuiltinKind {
    None,
    Alloca,
    HugeVal,
    HugeValf,
    HugeVall,
    Inf,
    Inff,
    Infl,
    Nan,
    Nanf,
    Nanl,
    VaEnd,
    Expect,
    ReturnAddress,
    FrameAddress,
    Ffs,
    Clz,
    Ctz,
    Popcount,
    Parity,
    Prefetch,
    Trap,
}

impl BuiltinKind {
    /// Builtins whose calls always fold to a constant.
    pub fn is_always_constant(self) -> bool {
        matches!(
            self,
            BuiltinKind::HugeVal
                | BuiltinKind::HugeValf
                | BuiltinKind::HugeVall
                | BuiltinKind::Inf
                | BuiltinKind::Inff
                | BuiltinKind::Infl
                | BuiltinKind::Nan
                | BuiltinKind::Nanf
                | BuiltinKind::Nanl
        )
    }
}

/// A list of entities in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
    pub entities: Vec<EntityId>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entity: EntityId) {
        self.entities.push(entity);
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }
}

/// The parts shared by all declaration-like entities (variables,
/// parameters, compound members and functions).
#[derive(Clone, Debug)]
pub struct Declaration {
    pub ty: TypeRef,
    /// Storage class as written in the source.
    pub declared_storage_class: StorageClass,
    /// Effective storage class.
    pub storage_class: StorageClass,
    pub modifiers: DeclModifiers,
    pub alignment: u32,
    pub attributes: Vec<Attribute>,
    pub used: bool,
    /// Set for declarations invented by the front-end.
    pub implicit: bool,
}

impl Declaration {
    pub fn new(ty: TypeRef) -> Self {
        Declaration {
            ty,
            declared_storage_class: StorageClass::None,
            storage_class: StorageClass::None,
            modifiers: DeclModifiers::empty(),
            alignment: 0,
            attributes: Vec::new(),
            used: false,
            implicit: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub decl: Declaration,
    /// GCC `__thread`.
    pub thread_local: bool,
    pub address_taken: bool,
    pub read: bool,
    pub initializer: Option<Initializer>,
}

#[derive(Clone, Debug)]
pub struct Parameter {
    pub decl: Declaration,
    pub address_taken: bool,
    pub read: bool,
}

#[derive(Clone, Debug)]
pub struct CompoundMember {
    pub decl: Declaration,
    pub address_taken: bool,
    pub read: bool,
    /// Byte offset inside the compound, filled in by layout.
    pub offset: u32,
    /// Extra bit offset for bit-field members.
    pub bit_offset: u8,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub decl: Declaration,
    pub is_inline: bool,
    pub builtin: BuiltinKind,
    pub parameters: Scope,
    /// The body; `None` for a plain declaration.
    pub body: Option<Statement>,
    /// Assembler alias set via `__REDIRECT`, consumed by the ELF mangler.
    pub actual_name: Option<Symbol>,
}

#[derive(Clone, Debug)]
pub struct TypedefEntity {
    pub modifiers: DeclModifiers,
    pub ty: TypeRef,
    pub alignment: u32,
    pub builtin: bool,
}

/// A struct, union or class tag together with its member scope and the
/// layout results.
#[derive(Clone, Debug)]
pub struct Compound {
    /// Alias entity used for name mangling of anonymous types.
    pub alias: Option<EntityId>,
    pub members: Scope,
    pub modifiers: DeclModifiers,
    pub layouted: bool,
    pub complete: bool,
    pub transparent_union: bool,
    pub packed: bool,
    pub alignment: u32,
    pub size: u32,
}

impl Compound {
    pub fn new() -> Self {
        Compound {
            alias: None,
            members: Scope::new(),
            modifiers: DeclModifiers::empty(),
            layouted: false,
            complete: false,
            transparent_union: false,
            packed: false,
            alignment: 1,
            size: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnumEntity {
    pub alias: Option<EntityId>,
    pub complete: bool,
    /// The enumerators in declaration order.
    pub values: Vec<EntityId>,
}

#[derive(Clone, Debug)]
pub struct EnumValue {
    pub value: Option<Expression>,
    pub enum_type: TypeRef,
}

#[derive(Clone, Debug, Default)]
pub struct Label {
    pub used: bool,
    pub address_taken: bool,
}

#[derive(Clone, Debug)]
pub struct NamespaceEntity {
    pub members: Scope,
}

#[derive(Clone, Debug)]
pub enum EntityKind {
    Variable(Variable),
    CompoundMember(CompoundMember),
    Parameter(Parameter),
    Function(Function),
    Typedef(TypedefEntity),
    Class(Compound),
    Struct(Compound),
    Union(Compound),
    Enum(EnumEntity),
    EnumValue(EnumValue),
    Label(Label),
    LocalLabel(Label),
    Namespace(NamespaceEntity),
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub kind: EntityKind,
    pub namespc: NamespaceKind,
    /// `None` for anonymous entities.
    pub symbol: Option<Symbol>,
    pub pos: SourcePosition,
    /// The enclosing named entity (e.g. a namespace), if any.
    pub parent: Option<EntityId>,
}

impl Entity {
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Function(_)
                | EntityKind::Variable(_)
                | EntityKind::Parameter(_)
                | EntityKind::CompoundMember(_)
        )
    }

    /// The shared declaration part, for declaration-like entities.
    pub fn declaration(&self) -> Option<&Declaration> {
        match &self.kind {
            EntityKind::Variable(v) => Some(&v.decl),
            EntityKind::Parameter(p) => Some(&p.decl),
            EntityKind::CompoundMember(m) => Some(&m.decl),
            EntityKind::Function(f) => Some(&f.decl),
            _ => None,
        }
    }

    pub fn declaration_mut(&mut self) -> Option<&mut Declaration> {
        match &mut self.kind {
            EntityKind::Variable(v) => Some(&mut v.decl),
            EntityKind::Parameter(p) => Some(&mut p.decl),
            EntityKind::CompoundMember(m) => Some(&mut m.decl),
            EntityKind::Function(f) => Some(&mut f.decl),
            _ => None,
        }
    }

    pub fn compound(&self) -> Option<&Compound> {
        match &self.kind {
            EntityKind::Class(c) | EntityKind::Struct(c) | EntityKind::Union(c) => Some(c),
            _ => None,
        }
    }

    pub fn compound_mut(&mut self) -> Option<&mut Compound> {
        match &mut self.kind {
            EntityKind::Class(c) | EntityKind::Struct(c) | EntityKind::Union(c) => Some(c),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EntityKind::Variable(_) => "variable",
            EntityKind::CompoundMember(_) => "member",
            EntityKind::Parameter(_) => "parameter",
            EntityKind::Function(_) => "function",
            EntityKind::Typedef(_) => "typedef",
            EntityKind::Class(_) => "class",
            EntityKind::Struct(_) => "struct",
            EntityKind::Union(_) => "union",
            EntityKind::Enum(_) => "enum",
            EntityKind::EnumValue(_) => "enum value",
            EntityKind::Label(_) => "label",
            EntityKind::LocalLabel(_) => "local label",
            EntityKind::Namespace(_) => "namespace",
        }
    }
}

/// An entire source file after parsing.
#[derive(Clone, Debug, Default)]
pub struct TranslationUnit {
    pub scope: Scope,
}

impl Context {
    pub fn alloc_entity(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(entity);
        id
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0 as usize]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0 as usize]
    }

    /// The compound payload of a struct/union/class entity.
    pub fn compound(&self, id: EntityId) -> &Compound {
        self.entity(id)
            .compound()
            .expect("entity is not a compound")
    }

    pub fn compound_mut(&mut self, id: EntityId) -> &mut Compound {
        self.entity_mut(id)
            .compound_mut()
            .expect("entity is not a compound")
    }

    // Convenience constructors for the parser (and the tests).

    pub fn define_typedef(&mut self, symbol: Symbol, ty: TypeRef) -> EntityId {
        let pos = self.builtin_position();
        self.alloc_entity(Entity {
            kind: EntityKind::Typedef(TypedefEntity {
                modifiers: DeclModifiers::empty(),
                ty,
                alignment: 0,
                builtin: false,
            }),
            namespc: NamespaceKind::Normal,
            symbol: Some(symbol),
            pos,
            parent: None,
        })
    }

    pub fn define_variable(&mut self, symbol: Symbol, ty: TypeRef) -> EntityId {
        let pos = self.builtin_position();
        self.alloc_entity(Entity {
            kind: EntityKind::Variable(Variable {
                decl: Declaration::new(ty),
                thread_local: false,
                address_taken: false,
                read: false,
                initializer: None,
            }),
            namespc: NamespaceKind::Normal,
            symbol: Some(symbol),
            pos,
            parent: None,
        })
    }

    pub fn define_function(&mut self, symbol: Symbol, ty: TypeRef) -> EntityId {
        let pos = self.builtin_position();
        self.alloc_entity(Entity {
            kind: EntityKind::Function(Function {
                decl: Declaration::new(ty),
                is_inline: false,
                builtin: BuiltinKind::None,
                parameters: Scope::new(),
                body: None,
                actual_name: None,
            }),
            namespc: NamespaceKind::Normal,
            symbol: Some(symbol),
            pos,
            parent: None,
        })
    }

    /// Creates an incomplete struct or union tag.
    pub fn define_compound(&mut self, symbol: Option<Symbol>, is_union: bool) -> EntityId {
        let pos = self.builtin_position();
        let compound = Compound::new();
        self.alloc_entity(Entity {
            kind: if is_union {
                EntityKind::Union(compound)
            } else {
                EntityKind::Struct(compound)
            },
            namespc: NamespaceKind::Tag,
            symbol,
            pos,
            parent: None,
        })
    }

    /// Appends a member declaration to a compound.
    pub fn add_compound_member(
        &mut self,
        compound: EntityId,
        symbol: Symbol,
        ty: TypeRef,
    ) -> EntityId {
        let pos = self.builtin_position();
        let member = self.alloc_entity(Entity {
            kind: EntityKind::CompoundMember(CompoundMember {
                decl: Declaration::new(ty),
                address_taken: false,
                read: false,
                offset: 0,
                bit_offset: 0,
            }),
            namespc: NamespaceKind::Normal,
            symbol: Some(symbol),
            pos,
            parent: Some(compound),
        });
        self.compound_mut(compound).members.append(member);
        member
    }
}
