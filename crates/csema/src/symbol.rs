//! Identifier interning and raw string values.
//!
//! A [`Symbol`] is the unique interned form of an identifier: interning the
//! same byte sequence twice yields the same symbol, so symbols compare and
//! hash as plain integers. The table lives for the whole translation unit;
//! nothing is ever removed from it.

use std::collections::HashMap;
use std::fmt;

/// An interned identifier. Equality is identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sym({})", self.0)
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    strings: Vec<Box<str>>,
    table: HashMap<Box<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unique symbol for `string`, interning it on first use.
    pub fn intern(&mut self, string: &str) -> Symbol {
        if let Some(&sym) = self.table.get(string) {
            return sym;
        }
        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(string.into());
        self.table.insert(string.into(), sym);
        log::trace!("interned {:?} as {:?}", string, sym);
        sym
    }

    pub fn name(&self, symbol: Symbol) -> &str {
        &self.strings[symbol.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }
}

/// A string or wide-string value as it appeared in the source, with embedded
/// NUL bytes preserved.
///
/// String literal values carry their terminating NUL byte and `size` counts
/// it, matching what the lexer hands over; the printer skips it and the
/// format checker uses it to spot strings with embedded NULs. Character
/// constant values carry no terminator.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StringValue {
    pub bytes: Vec<u8>,
    /// Element count (bytes for narrow strings, code units for wide ones).
    pub size: usize,
}

impl StringValue {
    /// A narrow string literal value, NUL-terminated.
    pub fn literal(s: &str) -> Self {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        let size = bytes.len();
        StringValue { bytes, size }
    }

    /// A wide string literal value, NUL-terminated. The byte representation
    /// keeps one byte per code unit; `size` counts code units.
    pub fn wide_literal(s: &str) -> Self {
        Self::literal(s)
    }

    /// A character constant value (no terminator).
    pub fn chars(s: &str) -> Self {
        let bytes = s.as_bytes().to_vec();
        let size = bytes.len();
        StringValue { bytes, size }
    }
}

impl fmt::Debug for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_identity() {
        let mut table = SymbolTable::new();
        let a = table.intern("foo");
        let b = table.intern("bar");
        let c = table.intern("foo");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.name(a), "foo");
        assert_eq!(table.name(b), "bar");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn string_values_keep_nuls() {
        let s = StringValue::literal("a\0b");
        assert_eq!(s.bytes, b"a\0b\0");
        assert_eq!(s.size, 4);

        let c = StringValue::chars("x");
        assert_eq!(c.bytes, b"x");
        assert_eq!(c.size, 1);
    }
}
