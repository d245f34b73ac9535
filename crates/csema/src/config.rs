//! Target and dialect configuration.
//!
//! These are the knobs the driver sets before any type is built; the atomic
//! type property table is derived from them once, when the context is
//! created.

use bitflags::bitflags;

use crate::types::{AtomicKind, CallingConvention};

bitflags! {
    /// The language dialects in effect.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct CMode: u8 {
        const C89  = 1 << 0;
        const C99  = 1 << 1;
        const GNUC = 1 << 2;
        const MS   = 1 << 3;
        const CXX  = 1 << 4;
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Machine word size in bits: 16, 32 or 64.
    pub machine_size: u32,
    /// Whether plain `char` is signed.
    pub char_is_signed: bool,
    /// Bit-field packing order.
    pub byte_order_big_endian: bool,
    /// The atomic kind backing `wchar_t` (typically `int` or
    /// `unsigned short`).
    pub wchar_kind: AtomicKind,
    pub c_mode: CMode,
    pub default_calling_convention: CallingConvention,
    /// If non-zero, overrides the size and alignment of `long double`.
    pub force_long_double_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            machine_size: 32,
            char_is_signed: true,
            byte_order_big_endian: false,
            wchar_kind: AtomicKind::Int,
            c_mode: CMode::C89 | CMode::C99 | CMode::GNUC,
            default_calling_convention: CallingConvention::Cdecl,
            force_long_double_size: 0,
        }
    }
}

impl Config {
    /// Pointer width in bytes.
    pub fn pointer_size(&self) -> u32 {
        self.machine_size / 8
    }
}
