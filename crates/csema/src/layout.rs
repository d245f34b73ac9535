//! Struct and union layout, including bit-field packing.
//!
//! Layout runs lazily the first time a size or alignment of a compound type
//! is requested, guarded by the compound's `layouted` flag, and writes the
//! member offsets back into the entities. Bit-fields are packed into
//! base-type-sized buckets; the packing direction follows the configured
//! byte order.

use crate::context::Context;
use crate::entity::{EntityId, EntityKind};
use crate::types::{BitfieldType, TypeKind, TypeRef};

const BITS_PER_BYTE: u32 = 8;

fn round_up(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

impl Context {
    fn member_bitfield(&mut self, member: EntityId) -> Option<BitfieldType> {
        let m_type = match &self.entity(member).kind {
            EntityKind::CompoundMember(m) => m.decl.ty,
            _ => return None,
        };
        let skipped = self.skip_typeref(m_type);
        match &self.ty(skipped).kind {
            TypeKind::Bitfield(bitfield) => Some(bitfield.clone()),
            _ => None,
        }
    }

    fn set_member_offset(&mut self, member: EntityId, offset: u32, bit_offset: u8) {
        if let EntityKind::CompoundMember(m) = &mut self.entity_mut(member).kind {
            m.offset = offset;
            m.bit_offset = bit_offset;
        }
    }

    /// Packs a run of bit-field members, little-endian: bits fill each
    /// bucket starting at bit 0 of the lowest byte. Returns the index of
    /// the first member not consumed.
    fn pack_bitfield_members(
        &mut self,
        members: &[EntityId],
        first: usize,
        struct_offset: &mut u32,
        struct_alignment: &mut u32,
        packed: bool,
    ) -> usize {
        let mut offset = *struct_offset;
        let mut alignment = *struct_alignment;
        let mut bit_offset: u32 = 0;

        let mut index = first;
        while index < members.len() {
            let member = members[index];
            if !matches!(self.entity(member).kind, EntityKind::CompoundMember(_)) {
                index += 1;
                continue;
            }
            let bitfield = match self.member_bitfield(member) {
                Some(found) => found,
                None => break,
            };

            let base_type = self.skip_typeref(bitfield.base_type);
            let base_alignment = self.get_type_alignment(base_type).max(1);
            let alignment_mask = base_alignment - 1;
            if !packed && base_alignment > alignment {
                alignment = base_alignment;
            }

            let bit_size = bitfield.bit_size;
            if !packed {
                bit_offset += (offset & alignment_mask) * BITS_PER_BYTE;
                offset &= !alignment_mask;
                let base_size = self.get_type_size(base_type) * BITS_PER_BYTE;

                // a zero width bit-field closes the current unit
                if bit_offset + bit_size > base_size || bit_size == 0 {
                    offset += (bit_offset + BITS_PER_BYTE - 1) / BITS_PER_BYTE;
                    offset = round_up(offset, base_alignment);
                    bit_offset = 0;
                }
            }

            self.set_member_offset(member, offset, bit_offset as u8);

            bit_offset += bit_size;
            offset += bit_offset / BITS_PER_BYTE;
            bit_offset %= BITS_PER_BYTE;
            index += 1;
        }

        if bit_offset > 0 {
            offset += 1;
        }

        *struct_offset = offset;
        *struct_alignment = alignment;
        index
    }

    /// Big-endian variant: bits are assigned from the top of the bucket
    /// downwards; a base type change or an overflowing field closes the
    /// bucket.
    fn pack_bitfield_members_big_endian(
        &mut self,
        members: &[EntityId],
        first: usize,
        struct_offset: &mut u32,
        struct_alignment: &mut u32,
        packed: bool,
    ) -> usize {
        let mut current_base_type: Option<TypeRef> = None;
        let mut offset = *struct_offset;
        let mut alignment = *struct_alignment;
        let mut bit_offset: u32 = 0;

        if packed {
            let pos = self.builtin_position();
            self.diagnostics
                .error(pos, "packed bit-fields are not supported on big-endian targets".into());
        }

        let mut index = first;
        while index < members.len() {
            let member = members[index];
            if !matches!(self.entity(member).kind, EntityKind::CompoundMember(_)) {
                index += 1;
                continue;
            }
            let bitfield = match self.member_bitfield(member) {
                Some(found) => found,
                None => break,
            };

            let bit_size = bitfield.bit_size;
            let base_type = self.skip_typeref(bitfield.base_type);

            // see if we need to start a new "bucket"
            if current_base_type != Some(base_type) || bit_size > bit_offset {
                if let Some(current) = current_base_type {
                    offset += self.get_type_size(current);
                }

                current_base_type = Some(base_type);
                let base_alignment = self.get_type_alignment(base_type).max(1);
                if base_alignment > alignment {
                    alignment = base_alignment;
                }
                offset = round_up(offset, base_alignment);
                bit_offset = self.get_type_size(base_type) * BITS_PER_BYTE;
                assert!(bit_offset >= bit_size);
            }

            bit_offset -= bit_size;
            self.set_member_offset(member, offset, bit_offset as u8);
            index += 1;
        }

        if let Some(current) = current_base_type {
            offset += self.get_type_size(current);
        }

        *struct_offset = offset;
        *struct_alignment = alignment;
        index
    }

    /// Lays out a struct type: assigns member offsets, computes size and
    /// alignment. Does nothing for incomplete or already layouted
    /// compounds.
    pub fn layout_struct_type(&mut self, ty: TypeRef) {
        let compound_id = match self.ty(ty).kind {
            TypeKind::CompoundStruct(compound) => compound,
            _ => panic!("layout_struct_type called on non-struct type"),
        };
        {
            let compound = self.compound(compound_id);
            if !compound.complete || compound.layouted {
                return;
            }
        }
        log::debug!("layouting struct {:?}", compound_id);

        let members = self.compound(compound_id).members.entities.clone();
        let packed = self.compound(compound_id).packed;
        let big_endian = self.config.byte_order_big_endian;

        let mut offset: u32 = 0;
        let mut alignment = self.compound(compound_id).alignment.max(1);
        let mut need_pad = false;

        let mut index = 0;
        while index < members.len() {
            let member = members[index];
            let m_type = match &self.entity(member).kind {
                EntityKind::CompoundMember(m) => m.decl.ty,
                _ => {
                    index += 1;
                    continue;
                }
            };

            let skipped = self.skip_typeref(m_type);
            if !self.is_type_valid(skipped) {
                index += 1;
                continue;
            }

            if matches!(self.ty(skipped).kind, TypeKind::Bitfield(_)) {
                index = if big_endian {
                    self.pack_bitfield_members_big_endian(
                        &members,
                        index,
                        &mut offset,
                        &mut alignment,
                        packed,
                    )
                } else {
                    self.pack_bitfield_members(
                        &members,
                        index,
                        &mut offset,
                        &mut alignment,
                        packed,
                    )
                };
                continue;
            }

            let m_alignment = self.get_type_alignment(m_type).max(1);
            if !packed {
                if m_alignment > alignment {
                    alignment = m_alignment;
                }

                let new_offset = round_up(offset, m_alignment);
                if new_offset > offset {
                    need_pad = true;
                    offset = new_offset;
                }
            }

            self.set_member_offset(member, offset, 0);
            offset += self.get_type_size(m_type);
            index += 1;
        }

        if !packed {
            let new_offset = round_up(offset, alignment);
            if new_offset > offset {
                need_pad = true;
                offset = new_offset;
            }
        }

        let pos = self.entity(compound_id).pos;
        if need_pad {
            if self.diagnostics.warnings.padded {
                let name = crate::printer::type_to_string(self, ty);
                self.diagnostics
                    .warn(pos, format!("'{}' needs padding", name));
            }
        } else if packed && self.diagnostics.warnings.packed {
            let name = crate::printer::type_to_string(self, ty);
            self.diagnostics
                .warn(pos, format!("superfluous packed attribute on '{}'", name));
        }

        let compound = self.compound_mut(compound_id);
        compound.size = offset;
        compound.alignment = alignment;
        compound.layouted = true;
    }

    /// Lays out a union type: all members at offset 0, size is the maximum
    /// member size rounded up to the alignment.
    pub fn layout_union_type(&mut self, ty: TypeRef) {
        let compound_id = match self.ty(ty).kind {
            TypeKind::CompoundUnion(compound) => compound,
            _ => panic!("layout_union_type called on non-union type"),
        };
        {
            let compound = self.compound(compound_id);
            if !compound.complete || compound.layouted {
                return;
            }
        }
        log::debug!("layouting union {:?}", compound_id);

        let members = self.compound(compound_id).members.entities.clone();
        let mut size: u32 = 0;
        let mut alignment = self.compound(compound_id).alignment.max(1);

        for member in members {
            let m_type = match &self.entity(member).kind {
                EntityKind::CompoundMember(m) => m.decl.ty,
                _ => continue,
            };
            let skipped = self.skip_typeref(m_type);
            if !self.is_type_valid(skipped) {
                continue;
            }

            self.set_member_offset(member, 0, 0);
            let m_size = self.get_type_size(m_type);
            if m_size > size {
                size = m_size;
            }
            let m_alignment = self.get_type_alignment(m_type).max(1);
            if m_alignment > alignment {
                alignment = m_alignment;
            }
        }
        size = round_up(size, alignment);

        let compound = self.compound_mut(compound_id);
        compound.size = size;
        compound.alignment = alignment;
        compound.layouted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{AtomicKind, Qualifiers, Type};

    fn member_offset(ctx: &Context, member: EntityId) -> (u32, u8) {
        match &ctx.entity(member).kind {
            EntityKind::CompoundMember(m) => (m.offset, m.bit_offset),
            _ => panic!("not a member"),
        }
    }

    fn make_bitfield(ctx: &mut Context, base: TypeRef, bits: u32) -> TypeRef {
        ctx.identify_new_type(Type::new(TypeKind::Bitfield(BitfieldType {
            base_type: base,
            bit_size: bits,
            size_expression: None,
        })))
    }

    #[test]
    fn struct_with_padding() {
        // struct S { char a; int b; char c; };
        let mut ctx = Context::new(Config::default());
        ctx.diagnostics.warnings.padded = true;
        let char_ty = ctx.make_atomic_type(AtomicKind::Char, Qualifiers::empty());
        let int_ty = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());

        let s = ctx.intern("S");
        let compound = ctx.define_compound(Some(s), false);
        let a = ctx.intern("a");
        let b = ctx.intern("b");
        let c = ctx.intern("c");
        let a = ctx.add_compound_member(compound, a, char_ty);
        let b = ctx.add_compound_member(compound, b, int_ty);
        let c = ctx.add_compound_member(compound, c, char_ty);
        ctx.compound_mut(compound).complete = true;

        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));
        assert_eq!(ctx.get_type_size(ty), 12);
        assert_eq!(ctx.get_type_alignment(ty), 4);
        assert_eq!(member_offset(&ctx, a), (0, 0));
        assert_eq!(member_offset(&ctx, b), (4, 0));
        assert_eq!(member_offset(&ctx, c), (8, 0));
        assert!(ctx
            .diagnostics
            .warning_messages()
            .iter()
            .any(|m| m.contains("needs padding")));
    }

    #[test]
    fn packed_struct_has_no_padding() {
        // struct __attribute__((packed)) P { char a; int b; };
        let mut ctx = Context::new(Config::default());
        let char_ty = ctx.make_atomic_type(AtomicKind::Char, Qualifiers::empty());
        let int_ty = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());

        let p = ctx.intern("P");
        let compound = ctx.define_compound(Some(p), false);
        let a = ctx.intern("a");
        let b = ctx.intern("b");
        let a = ctx.add_compound_member(compound, a, char_ty);
        let b = ctx.add_compound_member(compound, b, int_ty);
        {
            let c = ctx.compound_mut(compound);
            c.complete = true;
            c.packed = true;
        }

        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));
        assert_eq!(ctx.get_type_size(ty), 5);
        assert_eq!(ctx.get_type_alignment(ty), 1);
        assert_eq!(member_offset(&ctx, a), (0, 0));
        assert_eq!(member_offset(&ctx, b), (1, 0));
        assert!(ctx.diagnostics.warning_messages().is_empty());
    }

    #[test]
    fn little_endian_bitfields_share_a_bucket() {
        // struct B { unsigned x:3; unsigned y:5; unsigned z:9; };
        let mut ctx = Context::new(Config::default());
        let unsigned = ctx.make_atomic_type(AtomicKind::UnsignedInt, Qualifiers::empty());
        let bf3 = make_bitfield(&mut ctx, unsigned, 3);
        let bf5 = make_bitfield(&mut ctx, unsigned, 5);
        let bf9 = make_bitfield(&mut ctx, unsigned, 9);

        let b = ctx.intern("B");
        let compound = ctx.define_compound(Some(b), false);
        let x = ctx.intern("x");
        let y = ctx.intern("y");
        let z = ctx.intern("z");
        let x = ctx.add_compound_member(compound, x, bf3);
        let y = ctx.add_compound_member(compound, y, bf5);
        let z = ctx.add_compound_member(compound, z, bf9);
        ctx.compound_mut(compound).complete = true;

        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));
        assert_eq!(ctx.get_type_size(ty), 4);
        assert_eq!(ctx.get_type_alignment(ty), 4);
        assert_eq!(member_offset(&ctx, x), (0, 0));
        assert_eq!(member_offset(&ctx, y), (0, 3));
        assert_eq!(member_offset(&ctx, z), (0, 8));
    }

    #[test]
    fn zero_width_bitfield_closes_the_unit() {
        // struct Z { unsigned a:4; unsigned :0; unsigned b:4; };
        let mut ctx = Context::new(Config::default());
        let unsigned = ctx.make_atomic_type(AtomicKind::UnsignedInt, Qualifiers::empty());
        let bf4 = make_bitfield(&mut ctx, unsigned, 4);
        let bf0 = make_bitfield(&mut ctx, unsigned, 0);

        let z = ctx.intern("Z");
        let compound = ctx.define_compound(Some(z), false);
        let a = ctx.intern("a");
        let anon = ctx.intern("");
        let b = ctx.intern("b");
        let a = ctx.add_compound_member(compound, a, bf4);
        let _gap = ctx.add_compound_member(compound, anon, bf0);
        let b = ctx.add_compound_member(compound, b, bf4);
        ctx.compound_mut(compound).complete = true;

        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));
        assert_eq!(ctx.get_type_size(ty), 8);
        assert_eq!(member_offset(&ctx, a), (0, 0));
        assert_eq!(member_offset(&ctx, b), (4, 0));
    }

    #[test]
    fn big_endian_bitfields_fill_from_the_top() {
        let mut ctx = Context::new(Config {
            byte_order_big_endian: true,
            ..Config::default()
        });
        let unsigned = ctx.make_atomic_type(AtomicKind::UnsignedInt, Qualifiers::empty());
        let bf3 = make_bitfield(&mut ctx, unsigned, 3);
        let bf5 = make_bitfield(&mut ctx, unsigned, 5);

        let b = ctx.intern("B");
        let compound = ctx.define_compound(Some(b), false);
        let x = ctx.intern("x");
        let y = ctx.intern("y");
        let x = ctx.add_compound_member(compound, x, bf3);
        let y = ctx.add_compound_member(compound, y, bf5);
        ctx.compound_mut(compound).complete = true;

        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));
        assert_eq!(ctx.get_type_size(ty), 4);
        assert_eq!(member_offset(&ctx, x), (0, 29));
        assert_eq!(member_offset(&ctx, y), (0, 24));
    }

    #[test]
    fn union_members_share_offset_zero() {
        let mut ctx = Context::new(Config::default());
        let char_ty = ctx.make_atomic_type(AtomicKind::Char, Qualifiers::empty());
        let double_ty = ctx.make_atomic_type(AtomicKind::Double, Qualifiers::empty());

        let u = ctx.intern("U");
        let compound = ctx.define_compound(Some(u), true);
        let a = ctx.intern("a");
        let b = ctx.intern("b");
        let a = ctx.add_compound_member(compound, a, char_ty);
        let b = ctx.add_compound_member(compound, b, double_ty);
        ctx.compound_mut(compound).complete = true;

        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundUnion(compound)));
        assert_eq!(ctx.get_type_size(ty), 8);
        assert_eq!(ctx.get_type_alignment(ty), 4);
        assert_eq!(member_offset(&ctx, a), (0, 0));
        assert_eq!(member_offset(&ctx, b), (0, 0));
    }

    #[test]
    fn incomplete_compound_is_left_alone() {
        let mut ctx = Context::new(Config::default());
        let s = ctx.intern("S");
        let compound = ctx.define_compound(Some(s), false);
        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));
        ctx.layout_struct_type(ty);
        assert!(!ctx.compound(compound).layouted);
    }

    #[test]
    fn size_is_a_multiple_of_alignment() {
        // struct { int a; char b; } has 3 bytes of tail padding
        let mut ctx = Context::new(Config::default());
        let char_ty = ctx.make_atomic_type(AtomicKind::Char, Qualifiers::empty());
        let int_ty = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());

        let s = ctx.intern("T");
        let compound = ctx.define_compound(Some(s), false);
        let a = ctx.intern("a");
        let b = ctx.intern("b");
        ctx.add_compound_member(compound, a, int_ty);
        ctx.add_compound_member(compound, b, char_ty);
        ctx.compound_mut(compound).complete = true;

        let ty = ctx.identify_new_type(Type::new(TypeKind::CompoundStruct(compound)));
        let size = ctx.get_type_size(ty);
        let alignment = ctx.get_type_alignment(ty);
        assert_eq!(size, 8);
        assert_eq!(size % alignment, 0);
    }
}
