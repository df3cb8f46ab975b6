//! Declaration parsing implementation
//!
//! This module handles the declaration part of a program and of each
//! callable body:
//!
//! - Program header: `program name;` (main body only, first declaration)
//! - Variables: `var a, b: integer; c: array [1 .. 10] of integer;`
//! - Constants: `const n = 10; m = n * 2;`
//! - Callables: `function f(x: integer): integer; ...` and `procedure p; ...`,
//!   each followed by a body or by `forward;`
//!
//! # Grammar
//!
//! ```text
//! body        ::= declarations "begin" actions "end" ("." | ";")
//! var_decl    ::= "var" var_group ";" (var_group ";")*
//! var_group   ::= identifier ("," identifier)* ":" type
//! const_decl  ::= "const" identifier "=" expression ";" (identifier "=" expression ";")*
//! callable    ::= ("function" | "procedure") identifier params? (":" type)? ";"
//!                 ("forward" ";" | body)
//! type        ::= "integer" | "array" "[" expression ".." expression "]" "of" type
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use std::io::BufRead;

use crate::codegen::constants::MAIN_FUNCTION;
use crate::parser::ast::*;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::parse::{ParseError, Parser};

impl<R: BufRead> Parser<R> {
    /// Parse declarations, then `begin ... end` and the terminating `.` (main
    /// body) or `;` (callable body).
    ///
    /// The main body's action statements are wrapped into a callable named
    /// `main` that returns an integer, placed after all global declarations.
    pub(crate) fn parse_body(&mut self, main: bool) -> Result<Vec<Statm>, ParseError> {
        let mut statements = if main {
            self.parse_main_declarations()?
        } else {
            self.parse_declarations()?
        };

        let begin = self.compare(TokenKind::Begin)?;
        let actions = self.parse_action_statements()?;
        self.compare(TokenKind::End)?;
        self.compare(if main {
            TokenKind::Dot
        } else {
            TokenKind::Semicolon
        })?;

        if main {
            statements.push(Statm::DeclCallable(CallableDecl {
                name: MAIN_FUNCTION.to_string(),
                params: Vec::new(),
                return_type: Some(DataType::Integer),
                body: Some(actions),
                location: begin.location,
            }));
        } else {
            statements.extend(actions);
        }
        Ok(statements)
    }

    fn parse_main_declarations(&mut self) -> Result<Vec<Statm>, ParseError> {
        let mut statements = Vec::new();
        let mut first = true;

        loop {
            match self.symb.kind {
                TokenKind::Program if first => {
                    self.advance()?;
                    let name = self.compare_ident()?;
                    self.compare(TokenKind::Semicolon)?;
                    statements.push(Statm::Program(name));
                }
                TokenKind::Function | TokenKind::Procedure => {
                    statements.push(self.parse_callable_declaration()?);
                }
                TokenKind::Var => statements.extend(self.parse_var_declaration()?),
                TokenKind::Const => statements.extend(self.parse_const_declaration()?),
                _ => break,
            }
            first = false;
        }

        Ok(statements)
    }

    /// Declarations allowed inside a callable body: variables and constants.
    fn parse_declarations(&mut self) -> Result<Vec<Statm>, ParseError> {
        let mut statements = Vec::new();
        loop {
            match self.symb.kind {
                TokenKind::Var => statements.extend(self.parse_var_declaration()?),
                TokenKind::Const => statements.extend(self.parse_const_declaration()?),
                _ => return Ok(statements),
            }
        }
    }

    /// Parse a `var` block: one or more groups, each terminated by `;`.
    pub(crate) fn parse_var_declaration(&mut self) -> Result<Vec<Statm>, ParseError> {
        self.compare(TokenKind::Var)?;
        let first = self.compare(TokenKind::Ident)?;
        let mut decls = vec![Statm::Decl(self.parse_var_group(first, false)?)];

        loop {
            self.compare(TokenKind::Semicolon)?;
            if !self.check(TokenKind::Ident) {
                break;
            }
            // An identifier after `;` continues the block only if a `,` or `:`
            // follows it
            let ident = self.advance()?;
            if !self.check(TokenKind::Comma) && !self.check(TokenKind::Colon) {
                self.backtrack(ident)?;
                break;
            }
            decls.push(Statm::Decl(self.parse_var_group(ident, false)?));
        }

        Ok(decls)
    }

    /// `a, b, c: type`, starting after the already consumed first identifier.
    fn parse_var_group(&mut self, first: Token, ordinary: bool) -> Result<VarDecl, ParseError> {
        let mut idents = vec![first.text];
        while self.check(TokenKind::Comma) {
            self.advance()?;
            idents.push(self.compare_ident()?);
        }
        self.compare(TokenKind::Colon)?;
        let data_type = self.parse_data_type(ordinary)?;

        Ok(VarDecl {
            idents,
            data_type,
            location: first.location,
        })
    }

    /// `(a, b: integer; c: integer)`. Parameters must be of an ordinary type.
    fn parse_parameters(&mut self) -> Result<Vec<VarDecl>, ParseError> {
        self.compare(TokenKind::LPar)?;
        let mut params = Vec::new();

        if !self.check(TokenKind::RPar) {
            loop {
                let first = self.compare(TokenKind::Ident)?;
                params.push(self.parse_var_group(first, true)?);
                if !self.check(TokenKind::Semicolon) {
                    break;
                }
                self.advance()?;
            }
        }

        self.compare(TokenKind::RPar)?;
        Ok(params)
    }

    /// Parse a type annotation. `integer` and `array` are plain identifiers,
    /// not reserved words.
    pub(crate) fn parse_data_type(&mut self, ordinary: bool) -> Result<DataType, ParseError> {
        let location = self.location();
        if !self.check(TokenKind::Ident) {
            return Err(ParseError::InvalidDataType { location });
        }

        match self.symb.text.as_str() {
            "integer" => {
                self.advance()?;
                Ok(DataType::Integer)
            }
            "array" => {
                if ordinary {
                    return Err(ParseError::ExpectedOrdinary { location });
                }
                self.advance()?;
                self.compare(TokenKind::LBr)?;
                let from = self.parse_expression(false)?;
                self.compare(TokenKind::Dot)?;
                self.compare(TokenKind::Dot)?;
                let to = self.parse_expression(false)?;
                self.compare(TokenKind::RBr)?;
                self.compare(TokenKind::Of)?;
                // Only arrays of integers
                self.parse_data_type(true)?;
                Ok(DataType::Array {
                    from: Box::new(from),
                    to: Box::new(to),
                })
            }
            _ => Err(ParseError::InvalidDataType { location }),
        }
    }

    /// Parse a `const` block of `name = expression;` items.
    pub(crate) fn parse_const_declaration(&mut self) -> Result<Vec<Statm>, ParseError> {
        self.compare(TokenKind::Const)?;
        let first = self.compare(TokenKind::Ident)?;
        let mut decls = vec![self.parse_const_item(first)?];

        while self.check(TokenKind::Ident) {
            let ident = self.advance()?;
            if !self.check(TokenKind::Eq) {
                self.backtrack(ident)?;
                break;
            }
            decls.push(self.parse_const_item(ident)?);
        }

        Ok(decls)
    }

    fn parse_const_item(&mut self, ident: Token) -> Result<Statm, ParseError> {
        self.compare(TokenKind::Eq)?;
        let value = self.parse_expression(false)?;
        self.compare(TokenKind::Semicolon)?;
        Ok(Statm::DeclConst {
            name: ident.text,
            value,
            location: ident.location,
        })
    }

    /// Parse a function or procedure declaration with its body, or a forward
    /// declaration.
    pub(crate) fn parse_callable_declaration(&mut self) -> Result<Statm, ParseError> {
        let keyword = self.advance()?;
        let procedure = keyword.kind == TokenKind::Procedure;
        let name = self.compare_ident()?;

        let params = if self.check(TokenKind::LPar) {
            self.parse_parameters()?
        } else {
            Vec::new()
        };

        let return_type = if procedure {
            None
        } else {
            self.compare(TokenKind::Colon)?;
            Some(self.parse_data_type(true)?)
        };
        self.compare(TokenKind::Semicolon)?;

        let body = if self.check(TokenKind::Forward) {
            self.advance()?;
            self.compare(TokenKind::Semicolon)?;
            None
        } else {
            Some(self.parse_body(false)?)
        };

        Ok(Statm::DeclCallable(CallableDecl {
            name,
            params,
            return_type,
            body,
            location: keyword.location,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::{ParseError, Parser};

    fn parse(source: &str) -> Result<Unit, ParseError> {
        Parser::new(source)?.parse_program()
    }

    fn globals(unit: &Unit) -> &[Statm] {
        &unit.statements[..unit.statements.len() - 1]
    }

    #[test]
    fn test_single_var_declaration() {
        let unit = parse("var a: integer; begin a := 1 end.").unwrap();
        let decls = globals(&unit);
        assert_eq!(decls.len(), 1);
        match &decls[0] {
            Statm::Decl(decl) => {
                assert_eq!(decl.idents, vec!["a"]);
                assert_eq!(decl.data_type, DataType::Integer);
            }
            other => panic!("Expected var declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_var_declaration() {
        let unit = parse("var a,b: integer; begin a:=1; b:=2 end.").unwrap();
        match &globals(&unit)[0] {
            Statm::Decl(decl) => assert_eq!(decl.idents, vec!["a", "b"]),
            other => panic!("Expected var declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_var_block_with_several_groups() {
        let unit = parse("var a: integer; b, c: integer; d: array [1 .. 3] of integer; begin end.")
            .unwrap();
        let decls = globals(&unit);
        assert_eq!(decls.len(), 3);
        assert!(matches!(
            &decls[2],
            Statm::Decl(VarDecl {
                data_type: DataType::Array { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_const_block() {
        let unit = parse("const n = 10; m = $FF; var x: integer; begin end.").unwrap();
        let decls = globals(&unit);
        assert_eq!(decls.len(), 3);
        match &decls[1] {
            Statm::DeclConst { name, value, .. } => {
                assert_eq!(name, "m");
                assert!(matches!(value, Expr::Numb(255, _)));
            }
            other => panic!("Expected const declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_program_header_only_first() {
        let unit = parse("program demo; var x: integer; begin end.").unwrap();
        assert_eq!(unit.statements[0], Statm::Program("demo".to_string()));

        let err = parse("var x: integer; program demo; begin end.").unwrap_err();
        assert!(matches!(err, ParseError::Expected { .. }));
    }

    #[test]
    fn test_function_and_forward() {
        let source = "
            function f(a, b: integer; c: integer): integer; forward;
            procedure p;
            var t: integer;
            begin
                t := 1
            end;
            function f(a, b: integer; c: integer): integer;
            begin
                f := a + b + c
            end;
            begin
            end.";
        let unit = parse(source).unwrap();
        let decls = globals(&unit);
        assert_eq!(decls.len(), 3);

        match &decls[0] {
            Statm::DeclCallable(decl) => {
                assert_eq!(decl.name, "f");
                assert!(decl.is_forward());
                assert_eq!(decl.param_count(), 3);
                assert_eq!(decl.param_idents().collect::<Vec<_>>(), vec!["a", "b", "c"]);
            }
            other => panic!("Expected callable, got {:?}", other),
        }
        match &decls[1] {
            Statm::DeclCallable(decl) => {
                assert_eq!(decl.name, "p");
                assert_eq!(decl.return_type, None);
                let body = decl.body.as_ref().unwrap();
                assert_eq!(body.len(), 2);
                assert!(body[0].is_declaration());
                assert!(!body[1].is_declaration());
            }
            other => panic!("Expected callable, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_parameter_list() {
        let unit = parse("function f(): integer; begin f := 1 end; begin end.").unwrap();
        match &globals(&unit)[0] {
            Statm::DeclCallable(decl) => assert_eq!(decl.param_count(), 0),
            other => panic!("Expected callable, got {:?}", other),
        }
    }

    #[test]
    fn test_array_parameter_rejected() {
        let err = parse("procedure p(a: array [1 .. 2] of integer); begin end; begin end.")
            .unwrap_err();
        assert!(matches!(err, ParseError::ExpectedOrdinary { .. }));
    }

    #[test]
    fn test_nested_array_rejected() {
        let err = parse("var a: array [1 .. 2] of array [1 .. 2] of integer; begin end.")
            .unwrap_err();
        assert!(matches!(err, ParseError::ExpectedOrdinary { .. }));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = parse("var a: real; begin end.").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDataType { .. }));
    }

    #[test]
    fn test_function_without_return_type() {
        let err = parse("function f; begin end; begin end.").unwrap_err();
        assert!(matches!(err, ParseError::Expected { .. }));
    }
}
