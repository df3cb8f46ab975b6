//! # Introduction
//!
//! `mila` is a single-pass compiler front end for Mila, a small Pascal
//! subset. It reads source text, builds an AST, checks it against a scoped
//! symbol table and emits basic-block IR through the [`ir::IrBuilder`]
//! interface a backend code generator would offer.
//!
//! ## Pipeline
//!
//! ```text
//! Source → CharStream → Lexer → Parser → AST → Translator → IR Module
//! ```
//!
//! 1. [`parser`]: classifies characters, tokenises them and parses the token
//!    stream by recursive descent into [`parser::ast::Unit`]. The AST can be
//!    printed back as source with [`parser::printer`].
//! 2. [`codegen`]: walks the AST once, resolving names through
//!    [`codegen::symtab::SymbolTable`] and emitting instructions.
//! 3. [`ir`]: the builder interface and the in-memory [`ir::Module`] it
//!    produces, with an LLVM-like textual dump.
//! 4. [`runtime`]: a reference executor for modules, used by the `--run`
//!    flag of `milac` and by the tests.
//! 5. [`diagnostics`]: the error taxonomy and its rendering.
//!
//! The first error of any stage stops compilation.

pub mod codegen;
pub mod diagnostics;
pub mod ir;
pub mod parser;
pub mod runtime;

use diagnostics::CompileError;
use ir::{Module, ModuleBuilder};
use parser::ast::Unit;
use parser::Parser;

/// Parse a whole program.
pub fn parse(source: &str) -> Result<Unit, CompileError> {
    let mut parser = Parser::new(source)?;
    Ok(parser.parse_program()?)
}

/// Parse and translate a program into a module named `mila`.
pub fn compile(source: &str) -> Result<Module, CompileError> {
    compile_named(source, "mila")
}

pub fn compile_named(source: &str, name: &str) -> Result<Module, CompileError> {
    let unit = parse(source)?;
    let mut builder = ModuleBuilder::new(name);
    codegen::translate_unit(&unit, &mut builder)?;
    Ok(builder.finish())
}
