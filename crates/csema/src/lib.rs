//! Semantic core of a C89/C99 front-end.
//!
//! This crate contains the parts of a C compiler that sit between the
//! parser and the code generator: the typed abstract syntax tree, the
//! hash-consed type graph with its qualifier algebra, the entity graph,
//! the constant-expression classifier, the struct/union layout engine,
//! the attribute resolver, a precedence-aware pretty-printer, linker name
//! mangling for ELF, PE and Mach-O, and a printf/scanf format checker.
//!
//! Everything hangs off a [`Context`], which owns the symbol interner, the
//! type hash-cons table and the entity arena for one translation unit:
//!
//! ```
//! use csema::{Config, Context, Qualifiers};
//! use csema::types::AtomicKind;
//!
//! let mut ctx = Context::new(Config::default());
//! let int = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::empty());
//! let ptr1 = ctx.make_pointer_type(int, Qualifiers::empty());
//! let ptr2 = ctx.make_pointer_type(int, Qualifiers::empty());
//! // structurally equal types are the same type
//! assert_eq!(ptr1, ptr2);
//! ```
//!
//! The expected division of labor: a parser builds entities and types
//! through the constructors here, calls the attribute resolver while
//! processing declarators and the classifier in constant contexts; layout
//! runs lazily when sizes are needed; mangling, format checking and
//! printing operate on the finished graph.

pub mod ast;
pub mod attribute;
pub mod classify;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod entity;
pub mod fold;
pub mod format_check;
pub mod layout;
pub mod mangle;
pub mod printer;
pub mod symbol;
pub mod types;

pub use config::{CMode, Config};
pub use context::Context;
pub use diagnostic::{Diagnostic, Diagnostics, Severity, SourcePosition, Warnings};
pub use symbol::{StringValue, Symbol};
pub use types::{Qualifiers, TypeRef};

#[cfg(test)]
mod tests;
