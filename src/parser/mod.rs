//! Mila source code parser
//!
//! This module transforms Mila source text into an Abstract Syntax Tree (AST):
//! - [`input`]: Character reading and classification
//! - [`lexer`]: Tokenization (characters → tokens)
//! - [`parse`]: Parsing (tokens → AST)
//! - [`ast`]: AST node definitions
//! - [`printer`]: Reprinting an AST as source text
//!
//! # Supported Language
//!
//! Mila is a small Pascal subset:
//! - Types: `integer` and one-dimensional `array [lo .. hi] of integer`
//! - Declarations: `var`, `const`, `function`, `procedure`, `forward`
//! - Statements: assignment, calls, `if`/`else`, `while`, `for ... to/downto`,
//!   `break`, `begin ... end` blocks
//! - Expressions: `+ - * div mod`, unary `-`, relational operators in
//!   conditions, `and`/`or`/`not`
//! - Integer literals in decimal, octal (`&17`, `017`) and hex (`$1F`, `0x1F`)
//!
//! # Parser Implementation
//!
//! Hand-written predictive recursive descent parser over a hand-written DFA
//! lexer. No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod input;
pub mod lexer;
pub mod parse;
pub mod printer;
mod statements;

pub use parse::{ParseError, Parser};
