//! Linker symbol name mangling.
//!
//! Three targets are supported: Linux/ELF (bare C names, Itanium ABI for
//! C++ linkage), Win32/PE (underscore/at prefixes, `@N` stack size
//! suffixes) and Mach-O (underscore prefix). The mangled name is interned
//! and returned as a symbol.

use crate::context::Context;
use crate::entity::{DeclModifiers, EntityId, EntityKind};
use crate::symbol::Symbol;
use crate::types::{
    ArraySize, AtomicKind, CallingConvention, FunctionType, Linkage, Qualifiers, TypeKind,
    TypeRef,
};

fn get_atomic_type_mangle(kind: AtomicKind) -> char {
    match kind {
        AtomicKind::Void => 'v',
        AtomicKind::WcharT => 'w',
        AtomicKind::Bool => 'b',
        AtomicKind::Char => 'c',
        AtomicKind::SignedChar => 'a',
        AtomicKind::UnsignedChar => 'h',
        AtomicKind::Int => 'i',
        AtomicKind::UnsignedInt => 'j',
        AtomicKind::Short => 's',
        AtomicKind::UnsignedShort => 't',
        AtomicKind::Long => 'l',
        AtomicKind::UnsignedLong => 'm',
        AtomicKind::LongLong => 'x',
        AtomicKind::UnsignedLongLong => 'y',
        AtomicKind::LongDouble => 'e',
        AtomicKind::Float => 'f',
        AtomicKind::Double => 'd',
    }
}

struct Mangler<'a> {
    ctx: &'a mut Context,
    buf: String,
}

impl<'a> Mangler<'a> {
    fn new(ctx: &'a mut Context) -> Self {
        Mangler {
            ctx,
            buf: String::new(),
        }
    }

    fn print_name(&mut self, name: &str) {
        self.buf.push_str(&format!("{}{}", name.len(), name));
    }

    fn mangle_qualifiers(&mut self, qualifiers: Qualifiers) {
        // restrict is not mangled, matching GCC
        if qualifiers.contains(Qualifiers::VOLATILE) {
            self.buf.push('V');
        }
        if qualifiers.contains(Qualifiers::CONST) {
            self.buf.push('K');
        }
    }

    fn mangle_compound_name(&mut self, entity: EntityId, alias: Option<EntityId>) {
        let symbol = match self.ctx.entity(entity).symbol {
            Some(symbol) => symbol,
            None => match alias {
                Some(alias) => self
                    .ctx
                    .entity(alias)
                    .symbol
                    .expect("alias entity without symbol"),
                None => panic!("mangling anonymous type"),
            },
        };
        let name = self.ctx.name(symbol).to_string();
        self.print_name(&name);
    }

    fn mangle_parameters(&mut self, function: &FunctionType) {
        if function.unspecified_parameters {
            panic!("can't mangle unspecified parameter types");
        }
        if function.kr_style_parameters {
            panic!("can't mangle K&R style parameters");
        }

        if function.parameters.is_empty() {
            self.buf.push('v');
        } else {
            for parameter in &function.parameters {
                self.mangle_type(parameter.ty);
            }
            if function.variadic {
                self.buf.push('z');
            }
        }
    }

    fn mangle_type(&mut self, orig_type: TypeRef) {
        let ty = self.ctx.skip_typeref(orig_type);

        self.mangle_qualifiers(self.ctx.ty(ty).qualifiers);

        match self.ctx.ty(ty).kind.clone() {
            TypeKind::Atomic(akind) => self.buf.push(get_atomic_type_mangle(akind)),
            TypeKind::Pointer(pointer) => {
                self.buf.push('P');
                self.mangle_type(pointer.points_to);
            }
            TypeKind::Reference(reference) => {
                self.buf.push('R');
                self.mangle_type(reference.refers_to);
            }
            TypeKind::Function(function) => {
                self.buf.push('F');
                if function.linkage == Linkage::C {
                    self.buf.push('Y');
                }
                self.mangle_type(function.return_type);
                self.mangle_parameters(&function);
                self.buf.push('E');
            }
            TypeKind::CompoundStruct(compound) | TypeKind::CompoundUnion(compound) => {
                let alias = self.ctx.compound(compound).alias;
                self.mangle_compound_name(compound, alias);
            }
            TypeKind::Enum(enum_type) => {
                let alias = match &self.ctx.entity(enum_type.entity).kind {
                    EntityKind::Enum(e) => e.alias,
                    _ => None,
                };
                self.mangle_compound_name(enum_type.entity, alias);
            }
            TypeKind::Array(array) => {
                match array.size {
                    ArraySize::Variable(_) => self.buf.push_str("A_"),
                    ArraySize::Constant(size) => {
                        self.buf.push_str(&format!("A{}_", size));
                    }
                    ArraySize::Unknown => {
                        panic!("mangling of unknown sized array types not implemented")
                    }
                }
                self.mangle_type(array.element_type);
            }
            TypeKind::Complex(akind) => {
                self.buf.push('C');
                self.buf.push(get_atomic_type_mangle(akind));
            }
            TypeKind::Imaginary(akind) => {
                self.buf.push('G');
                self.buf.push(get_atomic_type_mangle(akind));
            }
            TypeKind::Invalid => panic!("invalid type encountered while mangling"),
            TypeKind::Error => panic!("error type encountered while mangling"),
            TypeKind::Builtin(_) | TypeKind::Typedef(_) | TypeKind::Typeof(_) => {
                panic!("typeref not resolved while mangling")
            }
            TypeKind::Bitfield(_) => panic!("no mangling for bitfield types implemented"),
        }
    }

    /// Itanium C++ encoding: `_Z`, the (possibly nested) name, then the
    /// parameter types for functions.
    fn mangle_entity(&mut self, entity: EntityId) {
        self.buf.push_str("_Z");

        let mut namespaces = Vec::new();
        let mut parent = self.ctx.entity(entity).parent;
        while let Some(p) = parent {
            let e = self.ctx.entity(p);
            if let EntityKind::Namespace(_) = e.kind {
                if let Some(symbol) = e.symbol {
                    namespaces.push(symbol);
                }
            }
            parent = e.parent;
        }
        namespaces.reverse();

        let symbol = self
            .ctx
            .entity(entity)
            .symbol
            .expect("mangling unnamed entity");
        let name = self.ctx.name(symbol).to_string();

        if namespaces.is_empty() {
            self.print_name(&name);
        } else {
            self.buf.push('N');
            for namespace in namespaces {
                let namespace_name = self.ctx.name(namespace).to_string();
                self.print_name(&namespace_name);
            }
            self.print_name(&name);
            self.buf.push('E');
        }

        if let EntityKind::Function(_) = self.ctx.entity(entity).kind {
            let decl_type = self.ctx.entity(entity).declaration().unwrap().ty;
            let skipped = self.ctx.skip_typeref(decl_type);
            match self.ctx.ty(skipped).kind.clone() {
                TypeKind::Function(function) => self.mangle_parameters(&function),
                _ => panic!("function entity without function type"),
            }
        }
    }

    fn finish(self) -> Symbol {
        log::debug!("mangled: {}", self.buf);
        let buf = self.buf;
        self.ctx.intern(&buf)
    }
}

fn function_type_of(ctx: &mut Context, entity: EntityId) -> FunctionType {
    let decl_type = ctx
        .entity(entity)
        .declaration()
        .expect("entity is not a declaration")
        .ty;
    let skipped = ctx.skip_typeref(decl_type);
    match ctx.ty(skipped).kind.clone() {
        TypeKind::Function(function) => function,
        _ => panic!("function entity without function type"),
    }
}

/// Mangles an entity's linker name for Linux/ELF.
pub fn create_name_linux_elf(ctx: &mut Context, entity: EntityId) -> Symbol {
    if let EntityKind::Function(_) = ctx.entity(entity).kind {
        let function = function_type_of(ctx, entity);
        match function.linkage {
            Linkage::C => {
                let actual_name = match &ctx.entity(entity).kind {
                    EntityKind::Function(f) => f.actual_name,
                    _ => None,
                };
                if let Some(actual) = actual_name {
                    return actual;
                }
            }
            Linkage::Cxx => {
                let mut mangler = Mangler::new(ctx);
                mangler.mangle_entity(entity);
                return mangler.finish();
            }
        }
    }

    ctx.entity(entity)
        .symbol
        .expect("mangling unnamed entity")
}

/// Mangles an entity's linker name for Win32/PE.
pub fn create_name_win32(ctx: &mut Context, entity: EntityId) -> Symbol {
    assert!(ctx.entity(entity).is_declaration());

    let mut mangler = Mangler::new(ctx);

    if let EntityKind::Function(_) = mangler.ctx.entity(entity).kind {
        let function = function_type_of(mangler.ctx, entity);

        let modifiers = mangler.ctx.entity(entity).declaration().unwrap().modifiers;
        if modifiers.contains(DeclModifiers::DLLIMPORT) {
            // add prefix for imported symbols
            mangler.buf.push_str("__imp_");
        }

        let cc = function.calling_convention;
        match cc {
            CallingConvention::Default
            | CallingConvention::Cdecl
            | CallingConvention::Stdcall => mangler.buf.push('_'),
            CallingConvention::Fastcall => mangler.buf.push('@'),
            CallingConvention::Thiscall => panic!("unhandled calling convention"),
        }

        match function.linkage {
            Linkage::C => {
                let symbol = mangler
                    .ctx
                    .entity(entity)
                    .symbol
                    .expect("mangling unnamed entity");
                let name = mangler.ctx.name(symbol).to_string();
                mangler.buf.push_str(&name);
            }
            Linkage::Cxx => mangler.mangle_entity(entity),
        }

        match cc {
            CallingConvention::Stdcall | CallingConvention::Fastcall => {
                let slot = mangler.ctx.config.pointer_size();
                let mut size = 0;
                for parameter in &function.parameters {
                    let parameter_size = mangler.ctx.get_type_size(parameter.ty);
                    size += (parameter_size + slot - 1) / slot * slot;
                }
                mangler.buf.push_str(&format!("@{}", size));
            }
            _ => {}
        }
    } else {
        let symbol = mangler
            .ctx
            .entity(entity)
            .symbol
            .expect("mangling unnamed entity");
        let name = mangler.ctx.name(symbol).to_string();
        mangler.buf.push('_');
        mangler.buf.push_str(&name);
    }

    mangler.finish()
}

/// Mangles an entity's linker name for Mach-O. C++ linkage is not
/// implemented for this target.
pub fn create_name_macho(ctx: &mut Context, entity: EntityId) -> Symbol {
    if let EntityKind::Function(_) = ctx.entity(entity).kind {
        let function = function_type_of(ctx, entity);
        if function.linkage == Linkage::Cxx {
            panic!("C++ name mangling not implemented for Mach-O");
        }
    }

    let symbol = ctx.entity(entity).symbol.expect("mangling unnamed entity");
    let name = format!("_{}", ctx.name(symbol));
    ctx.intern(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::{Entity, NamespaceEntity, NamespaceKind, Scope};
    use crate::types::Type;

    fn cxx_function(
        ctx: &mut Context,
        name: &str,
        parameters: &[TypeRef],
        parent: Option<EntityId>,
    ) -> EntityId {
        let void = ctx.predef.type_void;
        let mut function = FunctionType::new(void);
        for &ty in parameters {
            function
                .parameters
                .push(crate::types::FunctionParameter { ty, symbol: None });
        }
        function.linkage = Linkage::Cxx;
        let fty = ctx.identify_new_type(Type::new(TypeKind::Function(function)));
        let symbol = ctx.intern(name);
        let entity = ctx.define_function(symbol, fty);
        ctx.entity_mut(entity).parent = parent;
        entity
    }

    #[test]
    fn c_functions_keep_their_name_on_elf() {
        let mut ctx = Context::new(Config::default());
        let void = ctx.predef.type_void;
        let int = ctx.predef.type_int;
        let fty = ctx.make_function_1_type(void, int);
        let f = ctx.intern("f");
        let entity = ctx.define_function(f, fty);

        let mangled = create_name_linux_elf(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "f");
    }

    #[test]
    fn redirect_alias_wins_on_elf() {
        let mut ctx = Context::new(Config::default());
        let void = ctx.predef.type_void;
        let fty = ctx.make_function_0_type(void);
        let f = ctx.intern("fopen");
        let alias = ctx.intern("fopen64");
        let entity = ctx.define_function(f, fty);
        if let EntityKind::Function(function) = &mut ctx.entity_mut(entity).kind {
            function.actual_name = Some(alias);
        }

        let mangled = create_name_linux_elf(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "fopen64");
    }

    #[test]
    fn itanium_mangling_of_namespaced_function() {
        // void ns::f(int, const char*) -> _ZN2ns1fEiPKc
        let mut ctx = Context::new(Config::default());
        let pos = ctx.builtin_position();
        let ns_symbol = ctx.intern("ns");
        let ns = ctx.alloc_entity(Entity {
            kind: EntityKind::Namespace(NamespaceEntity {
                members: Scope::new(),
            }),
            namespc: NamespaceKind::Normal,
            symbol: Some(ns_symbol),
            pos,
            parent: None,
        });

        let int = ctx.predef.type_int;
        let char_ty = ctx.predef.type_char;
        let const_char = ctx.get_qualified_type(char_ty, Qualifiers::CONST);
        let const_char_ptr = ctx.make_pointer_type(const_char, Qualifiers::empty());

        let entity = cxx_function(&mut ctx, "f", &[int, const_char_ptr], Some(ns));
        let mangled = create_name_linux_elf(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "_ZN2ns1fEiPKc");
    }

    #[test]
    fn itanium_mangling_without_namespace() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let entity = cxx_function(&mut ctx, "g", &[int], None);
        let mangled = create_name_linux_elf(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "_Z1gi");
    }

    #[test]
    fn win32_prefixes_and_stack_suffix() {
        let mut ctx = Context::new(Config::default());
        let void = ctx.predef.type_void;
        let int = ctx.predef.type_int;

        // cdecl: plain underscore
        let fty = ctx.make_function_1_type(void, int);
        let f = ctx.intern("f");
        let entity = ctx.define_function(f, fty);
        let mangled = create_name_win32(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "_f");

        // stdcall: @N suffix with the parameter stack bytes
        let mut function = FunctionType::new(void);
        function.parameters.push(crate::types::FunctionParameter {
            ty: int,
            symbol: None,
        });
        function.parameters.push(crate::types::FunctionParameter {
            ty: ctx.predef.type_char,
            symbol: None,
        });
        function.calling_convention = CallingConvention::Stdcall;
        let fty = ctx.identify_new_type(Type::new(TypeKind::Function(function)));
        let g = ctx.intern("g");
        let entity = ctx.define_function(g, fty);
        let mangled = create_name_win32(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "_g@8");

        // fastcall: at-sign prefix
        let mut function = FunctionType::new(void);
        function.parameters.push(crate::types::FunctionParameter {
            ty: int,
            symbol: None,
        });
        function.calling_convention = CallingConvention::Fastcall;
        let fty = ctx.identify_new_type(Type::new(TypeKind::Function(function)));
        let h = ctx.intern("h");
        let entity = ctx.define_function(h, fty);
        let mangled = create_name_win32(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "@h@4");
    }

    #[test]
    fn win32_dllimport_prefix() {
        let mut ctx = Context::new(Config::default());
        let void = ctx.predef.type_void;
        let fty = ctx.make_function_0_type(void);
        let f = ctx.intern("imported");
        let entity = ctx.define_function(f, fty);
        ctx.entity_mut(entity).declaration_mut().unwrap().modifiers |= DeclModifiers::DLLIMPORT;

        let mangled = create_name_win32(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "__imp__imported");
    }

    #[test]
    fn win32_variables_get_an_underscore() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let entity = ctx.define_variable(x, int);
        let mangled = create_name_win32(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "_x");
    }

    #[test]
    fn macho_prefixes_an_underscore() {
        let mut ctx = Context::new(Config::default());
        let void = ctx.predef.type_void;
        let fty = ctx.make_function_0_type(void);
        let f = ctx.intern("main");
        let entity = ctx.define_function(f, fty);
        let mangled = create_name_macho(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "_main");
    }

    #[test]
    fn mangling_is_deterministic() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let entity = cxx_function(&mut ctx, "h", &[int, int], None);
        let first = create_name_linux_elf(&mut ctx, entity);
        let second = create_name_linux_elf(&mut ctx, entity);
        assert_eq!(first, second);
        assert_eq!(ctx.name(first), "_Z1hii");
    }

    #[test]
    fn array_and_qualifier_mangling() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let array = ctx.make_array_type(int, 3, Qualifiers::empty());
        let entity = cxx_function(&mut ctx, "k", &[array], None);
        let mangled = create_name_linux_elf(&mut ctx, entity);
        assert_eq!(ctx.name(mangled), "_Z1kA3_i");
    }
}
