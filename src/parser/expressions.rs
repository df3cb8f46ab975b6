//! Expression parsing implementation
//!
//! Mila has two expression grammars. Arithmetic expressions appear on the
//! right of `:=`, as call arguments, array indices and bounds. Boolean
//! expressions appear as `if` and `while` conditions and are built on top of
//! arithmetic ones with a single, non-chainable relational operator.
//!
//! # Grammar
//!
//! ```text
//! expression ::= "-"? term (("+" | "-") term)*
//! term       ::= factor (("*" | "div" | "mod") factor)*
//! factor     ::= identifier ("[" expression "]" | "(" args ")")?
//!              | number | "(" expression ")"
//!
//! bool_expr  ::= bool_term ("or" bool_term)*
//! bool_term  ::= bool_factor ("and" bool_factor)*
//! bool_factor::= "not" bool_factor | expression (relop expression)?
//! ```
//!
//! A parenthesized factor reached from a boolean expression is parsed as a
//! boolean expression again, so `(a < b) and (c < d)` works while
//! `x := (a < b)` does not.

use std::io::BufRead;

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl<R: BufRead> Parser<R> {
    /// Parse an arithmetic expression. `in_bool` selects the grammar used for
    /// parenthesized factors.
    pub(crate) fn parse_expression(&mut self, in_bool: bool) -> Result<Expr, ParseError> {
        let mut expr = if self.check(TokenKind::Minus) {
            let location = self.advance()?.location;
            Expr::UnMinus(Box::new(self.parse_term(in_bool)?), location)
        } else {
            self.parse_term(in_bool)?
        };

        loop {
            let op = match self.symb.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(expr),
            };
            let location = self.advance()?.location;
            let right = self.parse_term(in_bool)?;
            expr = Expr::Bop {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                location,
            };
        }
    }

    fn parse_term(&mut self, in_bool: bool) -> Result<Expr, ParseError> {
        let mut expr = self.parse_factor(in_bool)?;

        loop {
            let op = match self.symb.kind {
                TokenKind::Times => BinOp::Mul,
                TokenKind::Div => BinOp::Div,
                TokenKind::Mod => BinOp::Mod,
                _ => return Ok(expr),
            };
            let location = self.advance()?.location;
            let right = self.parse_factor(in_bool)?;
            expr = Expr::Bop {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                location,
            };
        }
    }

    fn parse_factor(&mut self, in_bool: bool) -> Result<Expr, ParseError> {
        match self.symb.kind {
            TokenKind::Ident => {
                let ident = self.advance()?;
                match self.symb.kind {
                    TokenKind::LBr => {
                        self.advance()?;
                        let index = self.parse_expression(false)?;
                        self.compare(TokenKind::RBr)?;
                        Ok(Expr::ArrayElement {
                            name: ident.text,
                            index: Box::new(index),
                            location: ident.location,
                        })
                    }
                    TokenKind::LPar => Ok(Expr::Call(self.parse_call(ident.text, ident.location)?)),
                    // a variable, or a callable used without arguments
                    _ => Ok(Expr::Var(ident.text, ident.location)),
                }
            }
            TokenKind::Numb => {
                let location = self.location();
                let value = self.compare_numb()?;
                Ok(Expr::Numb(value, location))
            }
            TokenKind::LPar => {
                self.advance()?;
                let expr = if in_bool {
                    self.parse_bool_expression()?
                } else {
                    self.parse_expression(false)?
                };
                self.compare(TokenKind::RPar)?;
                Ok(expr)
            }
            _ => Err(self.expansion_error("Factor")),
        }
    }

    /// A variable or an array element, as taken by `readln` and `dec`.
    pub(crate) fn parse_assignable(&mut self) -> Result<Expr, ParseError> {
        let ident = self.compare(TokenKind::Ident)?;
        if !self.check(TokenKind::LBr) {
            return Ok(Expr::Var(ident.text, ident.location));
        }

        self.advance()?;
        let index = self.parse_expression(false)?;
        self.compare(TokenKind::RBr)?;
        Ok(Expr::ArrayElement {
            name: ident.text,
            index: Box::new(index),
            location: ident.location,
        })
    }

    pub(crate) fn parse_bool_expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_bool_term()?;
        while self.check(TokenKind::Or) {
            let location = self.advance()?.location;
            let right = self.parse_bool_term()?;
            expr = Expr::Bop {
                op: BinOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_bool_term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_bool_factor()?;
        while self.check(TokenKind::And) {
            let location = self.advance()?.location;
            let right = self.parse_bool_factor()?;
            expr = Expr::Bop {
                op: BinOp::And,
                left: Box::new(expr),
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_bool_factor(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::Not) {
            let location = self.advance()?.location;
            return Ok(Expr::Not(Box::new(self.parse_bool_factor()?), location));
        }
        let left = self.parse_expression(true)?;
        self.parse_bool_relation(left)
    }

    fn parse_bool_relation(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let op = match self.symb.kind {
            TokenKind::Eq => BinOp::Eq,
            TokenKind::Neq => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Lte => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Gte => BinOp::Ge,
            _ => return Ok(left),
        };
        let location = self.advance()?.location;
        let right = self.parse_expression(true)?;
        Ok(Expr::Bop {
            op,
            left: Box::new(left),
            right: Box::new(right),
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::lexer::TokenKind;
    use crate::parser::parse::{ParseError, Parser};
    use rstest::rstest;

    fn expr(source: &str) -> Expr {
        let mut parser = Parser::new(source).unwrap();
        let expr = parser.parse_expression(false).unwrap();
        assert!(parser.check(TokenKind::Eoi), "trailing input in {:?}", source);
        expr
    }

    fn bool_expr(source: &str) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(source)?;
        let expr = parser.parse_bool_expression()?;
        parser.compare(TokenKind::Eoi)?;
        Ok(expr)
    }

    fn op_of(expr: &Expr) -> BinOp {
        match expr {
            Expr::Bop { op, .. } => *op,
            other => panic!("Expected binary operator, got {:?}", other),
        }
    }

    #[rstest]
    #[case("1 + 2 * 3", BinOp::Add)]
    #[case("1 * 2 + 3", BinOp::Add)]
    #[case("a div b mod c", BinOp::Mod)]
    #[case("(1 + 2) * 3", BinOp::Mul)]
    #[case("a - b - c", BinOp::Sub)]
    fn test_precedence(#[case] source: &str, #[case] root: BinOp) {
        assert_eq!(op_of(&expr(source)), root);
    }

    #[test]
    fn test_left_associativity() {
        match expr("a - b - c") {
            Expr::Bop { left, right, .. } => {
                assert_eq!(op_of(&left), BinOp::Sub);
                assert!(matches!(*right, Expr::Var(ref name, _) if name == "c"));
            }
            other => panic!("Expected binary operator, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_minus_binds_first_term() {
        match expr("-a * b + c") {
            Expr::Bop {
                op: BinOp::Add,
                left,
                ..
            } => match *left {
                Expr::UnMinus(inner, _) => assert_eq!(op_of(&inner), BinOp::Mul),
                other => panic!("Expected unary minus, got {:?}", other),
            },
            other => panic!("Expected addition, got {:?}", other),
        }
    }

    #[test]
    fn test_factors() {
        assert!(matches!(expr("a[i + 1]"), Expr::ArrayElement { .. }));
        assert!(matches!(expr("f(1, x)"), Expr::Call(ref call) if call.args.len() == 2));
        assert!(matches!(expr("f"), Expr::Var(..)));
        assert!(matches!(expr("$10"), Expr::Numb(16, _)));
    }

    #[rstest]
    #[case("a = b", BinOp::Eq)]
    #[case("a <> b", BinOp::Ne)]
    #[case("a < b", BinOp::Lt)]
    #[case("a <= b", BinOp::Le)]
    #[case("a > b", BinOp::Gt)]
    #[case("a >= b", BinOp::Ge)]
    #[case("a < b or c > d", BinOp::Or)]
    #[case("a < b and c > d or e = f", BinOp::Or)]
    #[case("a < b or c > d and e = f", BinOp::Or)]
    #[case("(a < b or c > d) and e = f", BinOp::And)]
    fn test_bool_operators(#[case] source: &str, #[case] root: BinOp) {
        assert_eq!(op_of(&bool_expr(source).unwrap()), root);
    }

    #[test]
    fn test_relations_do_not_chain() {
        assert!(bool_expr("a < b < c").is_err());
    }

    #[test]
    fn test_not() {
        match bool_expr("not a = b").unwrap() {
            Expr::Not(inner, _) => assert_eq!(op_of(&inner), BinOp::Eq),
            other => panic!("Expected not, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_inside_relation() {
        match bool_expr("(a + 1) * 2 > b - 1").unwrap() {
            Expr::Bop {
                op: BinOp::Gt,
                left,
                right,
                ..
            } => {
                assert_eq!(op_of(&left), BinOp::Mul);
                assert_eq!(op_of(&right), BinOp::Sub);
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_relation_not_allowed_in_arithmetic_parens() {
        let mut parser = Parser::new("(a < b)").unwrap();
        let err = parser.parse_expression(false).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Expected {
                expected: TokenKind::RPar,
                found: TokenKind::Lt,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_operand() {
        let mut parser = Parser::new("1 + ;").unwrap();
        let err = parser.parse_expression(false).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Expansion {
                nonterminal: "Factor",
                found: TokenKind::Semicolon,
                ..
            }
        ));
    }
}
