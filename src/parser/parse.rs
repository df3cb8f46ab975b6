//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including the error type, token helpers, and the main parse entry point.
//!
//! # Parser Architecture
//!
//! The Parser is a predictive recursive descent parser with one token of
//! lookahead (`symb`). Where the grammar needs more, it reads ahead and hands
//! the extra tokens back to the lexer.
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: `var`, `const`, `function`/`procedure` and program bodies
//! - `statements`: action statements (assignment, call, if, while, for, break)
//! - `expressions`: arithmetic and boolean expression grammars
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state.

use std::io::BufRead;

use thiserror::Error;

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Lexer, Token, TokenKind};

/// Parser error type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, got {found}")]
    Expected {
        expected: TokenKind,
        found: TokenKind,
        location: SourceLocation,
    },

    #[error("expanding nonterminal {nonterminal}, got {found}")]
    Expansion {
        nonterminal: &'static str,
        found: TokenKind,
        location: SourceLocation,
    },

    #[error("invalid data type")]
    InvalidDataType { location: SourceLocation },

    #[error("expected ordinary type")]
    ExpectedOrdinary { location: SourceLocation },

    #[error("no loop to break")]
    BreakOutsideLoop { location: SourceLocation },

    #[error("invalid statement after identifier '{name}'")]
    InvalidStatement {
        name: String,
        location: SourceLocation,
    },
}

impl ParseError {
    pub fn location(&self) -> SourceLocation {
        match self {
            ParseError::Lex(err) => err.location(),
            ParseError::Expected { location, .. }
            | ParseError::Expansion { location, .. }
            | ParseError::InvalidDataType { location }
            | ParseError::ExpectedOrdinary { location }
            | ParseError::BreakOutsideLoop { location }
            | ParseError::InvalidStatement { location, .. } => *location,
        }
    }
}

/// Recursive descent parser for Mila
pub struct Parser<R> {
    pub(crate) lexer: Lexer<R>,
    /// Current lookahead token
    pub(crate) symb: Token,
    next_loop: usize,
}

impl<'a> Parser<&'a [u8]> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        Parser::from_reader(source.as_bytes())
    }
}

impl<R: BufRead> Parser<R> {
    pub fn from_reader(reader: R) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(reader);
        let symb = lexer.next_token()?;
        Ok(Self {
            lexer,
            symb,
            next_loop: 0,
        })
    }

    /// Parse a whole compilation unit: the main declarations followed by
    /// the main body, which ends with `.`.
    pub fn parse_program(&mut self) -> Result<Unit, ParseError> {
        let statements = self.parse_body(true)?;
        self.compare(TokenKind::Eoi)?;
        Ok(Unit { statements })
    }

    // ===== Helper methods =====

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.symb.kind == kind
    }

    pub(crate) fn location(&self) -> SourceLocation {
        self.symb.location
    }

    /// Move to the next token and return the one just consumed.
    pub(crate) fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.symb, next))
    }

    /// Consume the current token if it is of the expected kind.
    pub(crate) fn compare(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.expected(kind))
        }
    }

    /// Like [`Parser::compare`], but leaves the current token in place.
    pub(crate) fn compare_no_next(&self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            Ok(())
        } else {
            Err(self.expected(kind))
        }
    }

    pub(crate) fn compare_ident(&mut self) -> Result<String, ParseError> {
        let token = self.compare(TokenKind::Ident)?;
        Ok(token.text)
    }

    pub(crate) fn compare_numb(&mut self) -> Result<i32, ParseError> {
        let token = self.compare(TokenKind::Numb)?;
        Ok(token.value)
    }

    pub(crate) fn expected(&self, kind: TokenKind) -> ParseError {
        ParseError::Expected {
            expected: kind,
            found: self.symb.kind,
            location: self.location(),
        }
    }

    pub(crate) fn expansion_error(&self, nonterminal: &'static str) -> ParseError {
        ParseError::Expansion {
            nonterminal,
            found: self.symb.kind,
            location: self.location(),
        }
    }

    /// Hand `consumed` and the current token back to the lexer and make
    /// `consumed` current again.
    pub(crate) fn backtrack(&mut self, consumed: Token) -> Result<(), ParseError> {
        let current = self.symb.clone();
        self.lexer.return_token(current);
        self.lexer.return_token(consumed);
        self.symb = self.lexer.next_token()?;
        Ok(())
    }

    pub(crate) fn fresh_loop_id(&mut self) -> LoopId {
        let id = LoopId(self.next_loop);
        self.next_loop += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_program() {
        let mut parser = Parser::new("begin end.").unwrap();
        let unit = parser.parse_program().unwrap();

        assert_eq!(unit.statements.len(), 1);
        match &unit.statements[0] {
            Statm::DeclCallable(decl) => {
                assert_eq!(decl.name, "main");
                assert_eq!(decl.return_type, Some(DataType::Integer));
                assert_eq!(decl.body.as_ref().map(Vec::len), Some(0));
            }
            other => panic!("Expected main callable, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_input_rejected() {
        let mut parser = Parser::new("begin end. x").unwrap();
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(
            err,
            ParseError::Expected {
                expected: TokenKind::Eoi,
                found: TokenKind::Ident,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_dot() {
        let mut parser = Parser::new("begin end").unwrap();
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(
            err,
            ParseError::Expected {
                expected: TokenKind::Dot,
                ..
            }
        ));
        assert_eq!(err.to_string(), "expected '.', got end of input");
    }

    #[test]
    fn test_lex_errors_pass_through() {
        let mut parser = Parser::new("begin x := 09 end.").unwrap();
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, ParseError::Lex(LexError::InvalidOctal { .. })));
    }

    #[test]
    fn test_backtrack_restores_tokens() {
        let mut parser = Parser::new("a b c").unwrap();
        let a = parser.advance().unwrap();
        assert_eq!(parser.symb.text, "b");
        parser.backtrack(a).unwrap();
        assert_eq!(parser.compare_ident().unwrap(), "a");
        assert_eq!(parser.compare_ident().unwrap(), "b");
        assert_eq!(parser.compare_ident().unwrap(), "c");
        assert!(parser.check(TokenKind::Eoi));
    }
}
