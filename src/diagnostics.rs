//! Compile errors and their rendering
//!
//! [`CompileError`] unifies the three classes of error the front end can
//! report. Each carries the position where it was detected; [`render`]
//! formats it the way the driver prints it, followed by the offending line.
//!
//! [`render`]: CompileError::render

use std::fmt;

use thiserror::Error;

use crate::codegen::SemanticError;
use crate::parser::ast::SourceLocation;
use crate::parser::lexer::LexError;
use crate::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Lex,
    Syntax,
    Semantic,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorClass::Lex => "lexical error",
            ErrorClass::Syntax => "syntax error",
            ErrorClass::Semantic => "semantic error",
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(ParseError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Lex(err) => CompileError::Lex(err),
            other => CompileError::Syntax(other),
        }
    }
}

impl CompileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CompileError::Lex(_) => ErrorClass::Lex,
            CompileError::Syntax(_) => ErrorClass::Syntax,
            CompileError::Semantic(_) => ErrorClass::Semantic,
        }
    }

    pub fn location(&self) -> SourceLocation {
        match self {
            CompileError::Lex(err) => err.location(),
            CompileError::Syntax(err) => err.location(),
            CompileError::Semantic(err) => err.location(),
        }
    }

    /// `Error on line N: message`, then the raw source line when there is one
    pub fn render(&self, source: &str) -> String {
        let line = self.location().line;
        let mut out = format!("Error on line {}: {}", line, self);
        let raw = line
            .checked_sub(1)
            .and_then(|index| source.lines().nth(index));
        if let Some(raw) = raw {
            out.push('\n');
            out.push_str(raw);
        }
        out
    }
}
