//! Semantic analysis and IR generation
//!
//! This module turns a parsed [`Unit`](crate::parser::ast::Unit) into IR:
//! - [`symtab`]: Scoped symbol table with storage allocation
//! - [`translate`]: The translation pass over declarations and expressions
//! - [`errors`]: Semantic error types
//!
//! # Program Shape
//!
//! The main body of a program becomes the function `main`, returning an
//! integer (0 unless the body assigns `main`). Every function with a result
//! gets a hidden local `<name>_return`, initialised to 0 and returned when
//! the body ends or calls `exit`.

pub mod constants;
pub mod errors;
pub mod symtab;
pub mod translate;

mod builtins;
mod loops;

pub use builtins::RuntimeFunctions;
pub use errors::SemanticError;
pub use translate::{translate_unit, Terminated, Translator};
