//! Semantic error types for the Mila translator
//!
//! This module defines [`SemanticError`], which represents every check the
//! translation pass performs against the symbol table (as opposed to lexical
//! or syntax errors, which the parser reports).
//!
//! All semantic errors are fatal: translation stops at the first one and no
//! module is produced.

use thiserror::Error;

use crate::parser::ast::SourceLocation;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemanticError {
    #[error("Var '{name}' not declared")]
    Undeclared {
        name: String,
        location: SourceLocation,
    },

    #[error("Var '{name}' already declared")]
    Redeclared {
        name: String,
        location: SourceLocation,
    },

    #[error("Var '{name}' is constant")]
    AssignToConst {
        name: String,
        location: SourceLocation,
    },

    /// A variable, call or array element where a compile-time constant is
    /// required (array bounds, constant initializers)
    #[error("{what} is not constant")]
    NotConstant {
        what: String,
        location: SourceLocation,
    },

    #[error("{name} is not callable")]
    NotCallable {
        name: String,
        location: SourceLocation,
    },

    #[error("{name} does not take {found} argument(s)")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },

    #[error("{name} is not an array")]
    NotAnArray {
        name: String,
        location: SourceLocation,
    },

    #[error("array {name} used as a scalar")]
    ArrayAsScalar {
        name: String,
        location: SourceLocation,
    },

    #[error("invalid bounds {from}..{to} of array {name}")]
    InvalidArrayBounds {
        name: String,
        from: i32,
        to: i32,
        location: SourceLocation,
    },

    #[error("{name} does not return a value")]
    ProcedureAsValue {
        name: String,
        location: SourceLocation,
    },

    #[error("exit cannot be used as a value")]
    ExitAsValue { location: SourceLocation },

    #[error("{what} outside of a callable")]
    OutsideCallable {
        what: &'static str,
        location: SourceLocation,
    },

    #[error("{name} does not match its forward declaration")]
    ForwardMismatch {
        name: String,
        location: SourceLocation,
    },

    #[error("{name} is declared forward but never defined")]
    ForwardNeverDefined {
        name: String,
        location: SourceLocation,
    },

    #[error("{name} is not assignable")]
    NotAssignable {
        name: String,
        location: SourceLocation,
    },

    #[error("{name} is not a variable that can be decremented")]
    NotDecrementable {
        name: String,
        location: SourceLocation,
    },

    #[error("no loop to break")]
    BreakOutsideLoop { location: SourceLocation },
}

impl SemanticError {
    pub fn location(&self) -> SourceLocation {
        match self {
            SemanticError::Undeclared { location, .. }
            | SemanticError::Redeclared { location, .. }
            | SemanticError::AssignToConst { location, .. }
            | SemanticError::NotConstant { location, .. }
            | SemanticError::NotCallable { location, .. }
            | SemanticError::WrongArity { location, .. }
            | SemanticError::NotAnArray { location, .. }
            | SemanticError::ArrayAsScalar { location, .. }
            | SemanticError::InvalidArrayBounds { location, .. }
            | SemanticError::ProcedureAsValue { location, .. }
            | SemanticError::ExitAsValue { location }
            | SemanticError::OutsideCallable { location, .. }
            | SemanticError::ForwardMismatch { location, .. }
            | SemanticError::ForwardNeverDefined { location, .. }
            | SemanticError::NotAssignable { location, .. }
            | SemanticError::NotDecrementable { location, .. }
            | SemanticError::BreakOutsideLoop { location } => *location,
        }
    }
}
