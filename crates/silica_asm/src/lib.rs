//! Textual assembly reader and writer for the Silica IR.
//!
//! The surface syntax mirrors the in-memory IR one instruction per
//! line: units are `func @name (params) T { … }`, `proc`/`entity`
//! `@name (ins) -> (outs) { … }`, and `decl` for external declarations;
//! blocks are labeled `name:`; values are `%name` with `%0, %1, …` for
//! anonymous values; types read `i8`, `n9`, `i8$`, `i8*`, `[4 x i8]`,
//! and `{i8, i32}`.
//!
//! [`parse_module`] reads a module from text; [`module_to_string`]
//! renders one back. Parsing a printed module yields a structurally
//! equal module, modulo the choice of anonymous names.

#![warn(missing_docs)]

mod lexer;
mod parser;
mod printer;
mod token;

pub use parser::{parse_module, ParseError};
pub use printer::{module_to_string, write_module};
