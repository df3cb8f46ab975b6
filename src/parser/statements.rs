//! Statement parsing implementation
//!
//! This module handles parsing of action statements:
//!
//! - Assignments: `x := e`, `a[i] := e`
//! - Calls: `p(a, b)`, bare `p`, and the `write('text')` special form
//! - Control flow: `if`, `while`, `for ... to/downto`, `break`
//! - Blocks: `begin ... end`
//!
//! # Grammar
//!
//! ```text
//! action  ::= if_stmt | while_stmt | for_stmt | block | simple
//! if_stmt ::= "if" bool_expr "then" action ("else" action)?
//! while   ::= "while" bool_expr "do" action
//! for     ::= "for" identifier ":=" expression ("to" | "downto") expression "do" action
//! block   ::= "begin" action* "end" ";"?
//! simple  ::= (assign | call | "break") ";"?
//! ```
//!
//! The `;` after a simple statement may be left out before `end` or `else`.
//! The enclosing loop, if any, is threaded down as a parameter so that
//! `break` binds to the innermost one.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use std::io::BufRead;

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl<R: BufRead> Parser<R> {
    /// Statements of a body, up to (not including) its `end`.
    pub(crate) fn parse_action_statements(&mut self) -> Result<Vec<Statm>, ParseError> {
        let mut statements = Vec::new();
        while let Some(statement) = self.parse_action_statement(None)? {
            statements.push(statement);
        }
        Ok(statements)
    }

    /// Parse one action statement; `None` when the current token cannot
    /// start one.
    pub(crate) fn parse_action_statement(
        &mut self,
        parent_loop: Option<LoopId>,
    ) -> Result<Option<Statm>, ParseError> {
        match self.symb.kind {
            TokenKind::If => self.parse_if_statement(parent_loop).map(Some),
            TokenKind::While => self.parse_while_statement().map(Some),
            TokenKind::For => self.parse_for_statement().map(Some),
            TokenKind::Begin => self.parse_block(parent_loop).map(Some),
            _ => self.parse_simple_statement(parent_loop),
        }
    }

    fn parse_required_statement(
        &mut self,
        parent_loop: Option<LoopId>,
    ) -> Result<Statm, ParseError> {
        match self.parse_action_statement(parent_loop)? {
            Some(statement) => Ok(statement),
            None => Err(self.expansion_error("statement")),
        }
    }

    fn parse_block(&mut self, parent_loop: Option<LoopId>) -> Result<Statm, ParseError> {
        self.compare(TokenKind::Begin)?;
        let mut statements = Vec::new();

        while !self.check(TokenKind::End) {
            if self.check(TokenKind::Eoi) {
                return Err(self.expected(TokenKind::End));
            }
            statements.push(self.parse_required_statement(parent_loop)?);
        }
        self.advance()?;

        // `end` directly followed by `end` or `else` needs no separator
        if !self.check(TokenKind::End) && !self.check(TokenKind::Else) {
            self.compare(TokenKind::Semicolon)?;
        }

        Ok(Statm::List(statements))
    }

    fn parse_if_statement(&mut self, parent_loop: Option<LoopId>) -> Result<Statm, ParseError> {
        let location = self.advance()?.location;
        let condition = self.parse_bool_expression()?;
        self.compare(TokenKind::Then)?;
        let then_branch = self.parse_required_statement(parent_loop)?;

        let else_branch = if self.check(TokenKind::Else) {
            self.advance()?;
            Some(Box::new(self.parse_required_statement(parent_loop)?))
        } else {
            None
        };

        Ok(Statm::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
            location,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Statm, ParseError> {
        let location = self.advance()?.location;
        let condition = self.parse_bool_expression()?;
        self.compare(TokenKind::Do)?;

        let id = self.fresh_loop_id();
        let body = self.parse_required_statement(Some(id))?;

        Ok(Statm::Loop(Loop {
            id,
            kind: LoopKind::While { condition },
            body: Box::new(body),
            location,
        }))
    }

    fn parse_for_statement(&mut self) -> Result<Statm, ParseError> {
        let location = self.advance()?.location;
        let var = self.compare(TokenKind::Ident)?;
        let assign = self.compare(TokenKind::Assign)?;
        let init = Assignment {
            target: Expr::Var(var.text, var.location),
            value: self.parse_expression(false)?,
            location: assign.location,
        };

        let downto = match self.symb.kind {
            TokenKind::To => false,
            TokenKind::Downto => true,
            _ => return Err(self.expected(TokenKind::To)),
        };
        self.advance()?;
        let limit = self.parse_expression(false)?;
        self.compare(TokenKind::Do)?;

        let id = self.fresh_loop_id();
        let body = self.parse_required_statement(Some(id))?;

        Ok(Statm::Loop(Loop {
            id,
            kind: LoopKind::For {
                init,
                downto,
                limit,
            },
            body: Box::new(body),
            location,
        }))
    }

    fn parse_simple_statement(
        &mut self,
        parent_loop: Option<LoopId>,
    ) -> Result<Option<Statm>, ParseError> {
        let statement = match self.symb.kind {
            TokenKind::Ident => self.parse_ident_statement()?,
            TokenKind::Break => {
                let location = self.advance()?.location;
                match parent_loop {
                    Some(target) => Statm::Break { target, location },
                    None => return Err(ParseError::BreakOutsideLoop { location }),
                }
            }
            _ => return Ok(None),
        };

        // last statement before `end` or `else` may omit the `;`
        if !self.check(TokenKind::End) && !self.check(TokenKind::Else) {
            self.compare(TokenKind::Semicolon)?;
        }
        Ok(Some(statement))
    }

    /// Assignment or call, decided by the token after the identifier.
    fn parse_ident_statement(&mut self) -> Result<Statm, ParseError> {
        let ident = self.advance()?;

        match self.symb.kind {
            TokenKind::Assign => {
                let assign = self.advance()?;
                Ok(Statm::Assign(Assignment {
                    target: Expr::Var(ident.text, ident.location),
                    value: self.parse_expression(false)?,
                    location: assign.location,
                }))
            }
            TokenKind::LBr => {
                self.advance()?;
                let index = self.parse_expression(false)?;
                self.compare(TokenKind::RBr)?;
                let assign = self.compare(TokenKind::Assign)?;
                Ok(Statm::Assign(Assignment {
                    target: Expr::ArrayElement {
                        name: ident.text,
                        index: Box::new(index),
                        location: ident.location,
                    },
                    value: self.parse_expression(false)?,
                    location: assign.location,
                }))
            }
            TokenKind::LPar => Ok(Statm::Call(self.parse_call(ident.text, ident.location)?)),
            TokenKind::Semicolon | TokenKind::End | TokenKind::Else => {
                Ok(Statm::Call(CallExpr {
                    name: ident.text,
                    args: Vec::new(),
                    location: ident.location,
                }))
            }
            _ => Err(ParseError::InvalidStatement {
                name: ident.text,
                location: ident.location,
            }),
        }
    }

    /// Argument list of a call; the current token is the `(`.
    ///
    /// `readln` and `dec` take assignable arguments, `write` a quoted string.
    pub(crate) fn parse_call(
        &mut self,
        name: String,
        location: SourceLocation,
    ) -> Result<CallExpr, ParseError> {
        if name == "write" {
            return self.parse_write(location);
        }
        let assignable = name == "readln" || name == "dec";

        self.compare(TokenKind::LPar)?;
        let mut args = Vec::new();
        while !self.check(TokenKind::RPar) {
            if !args.is_empty() {
                self.compare(TokenKind::Comma)?;
            }
            let arg = if assignable {
                self.parse_assignable()?
            } else {
                self.parse_expression(false)?
            };
            args.push(arg);
        }
        self.compare(TokenKind::RPar)?;

        Ok(CallExpr {
            name,
            args,
            location,
        })
    }

    fn parse_write(&mut self, location: SourceLocation) -> Result<CallExpr, ParseError> {
        self.compare(TokenKind::LPar)?;
        // the opening quote stays current while the raw text is read
        self.compare_no_next(TokenKind::Apostrophe)?;
        let text_location = self.location();
        let text = self.lexer.read_string()?;
        self.advance()?;
        self.compare(TokenKind::Apostrophe)?;
        self.compare(TokenKind::RPar)?;

        Ok(CallExpr {
            name: "write".to_string(),
            args: vec![Expr::String(text, text_location)],
            location,
        })
    }
}
