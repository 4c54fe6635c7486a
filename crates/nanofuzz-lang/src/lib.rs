//! The nanofuzz pattern language: lexer, parser, and the unlinked block
//! list they produce. See [`parser::parse`] for the entry point consumed by
//! `nanofuzz-vm`'s linker.

pub mod block;
pub mod parser;

pub use block::{
    Block, ByteRange, Declaration, LenFormat, LenOptions, ParsedPattern, RangeSet, Reference, ReferenceKind,
    Repetition,
};
pub use parser::parse;
