//! Source reprinting of the AST
//!
//! [`Unit`]'s `Display` writes the program back as Mila source. Binary
//! operations are fully parenthesized and the synthesized `main` callable is
//! written as the trailing `begin ... end.` body, so the output parses again
//! into an equivalent tree.

use std::fmt::{self, Write};

use crate::codegen::constants::MAIN_FUNCTION;
use crate::parser::ast::*;

const INDENT: &str = "  ";

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name, _) => f.write_str(name),
            Expr::Numb(value, _) if *value < 0 => write!(f, "(-{})", value.unsigned_abs()),
            Expr::Numb(value, _) => write!(f, "{}", value),
            Expr::String(text, _) => write!(f, "'{}'", text),
            Expr::Bop {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::UnMinus(expr, _) => write!(f, "(-{})", expr),
            Expr::Not(expr, _) => write!(f, "(not {})", expr),
            Expr::ArrayElement { name, index, .. } => write!(f, "{}[{}]", name, index),
            Expr::Call(call) => write!(f, "{}", call),
        }
    }
}

impl fmt::Display for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.args.is_empty() {
            return Ok(());
        }
        f.write_char('(')?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_char(')')
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => f.write_str("integer"),
            DataType::Array { from, to } => write!(f, "array [{} .. {}] of integer", from, to),
        }
    }
}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.idents.join(", "), self.data_type)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer {
            out: f,
            indent: 0,
        };
        for statement in &self.statements {
            match statement {
                Statm::DeclCallable(decl) if decl.name == MAIN_FUNCTION => {
                    printer.action_block(decl.body.as_deref().unwrap_or_default())?;
                    printer.out.write_str(".\n")?;
                }
                other => printer.declaration(other)?,
            }
        }
        Ok(())
    }
}

struct Printer<'a, 'f> {
    out: &'a mut fmt::Formatter<'f>,
    indent: usize,
}

impl Printer<'_, '_> {
    fn pad(&mut self) -> fmt::Result {
        for _ in 0..self.indent {
            self.out.write_str(INDENT)?;
        }
        Ok(())
    }

    fn declaration(&mut self, statement: &Statm) -> fmt::Result {
        self.pad()?;
        match statement {
            Statm::Program(name) => writeln!(self.out, "program {};", name),
            Statm::Decl(decl) => writeln!(self.out, "var {};", decl),
            Statm::DeclConst { name, value, .. } => writeln!(self.out, "const {} = {};", name, value),
            Statm::DeclCallable(decl) => self.callable(decl),
            other => self.statement(other),
        }
    }

    fn callable(&mut self, decl: &CallableDecl) -> fmt::Result {
        let keyword = if decl.return_type.is_some() {
            "function"
        } else {
            "procedure"
        };
        write!(self.out, "{} {}", keyword, decl.name)?;

        if !decl.params.is_empty() {
            let params: Vec<String> = decl.params.iter().map(|p| p.to_string()).collect();
            write!(self.out, "({})", params.join("; "))?;
        }
        if let Some(return_type) = &decl.return_type {
            write!(self.out, ": {}", return_type)?;
        }

        let body = match &decl.body {
            Some(body) => body,
            None => return writeln!(self.out, "; forward;"),
        };
        writeln!(self.out, ";")?;

        let split = body
            .iter()
            .position(|s| !s.is_declaration())
            .unwrap_or(body.len());
        self.indent += 1;
        for item in &body[..split] {
            self.declaration(item)?;
        }
        self.indent -= 1;

        self.action_block(&body[split..])?;
        writeln!(self.out, ";")
    }

    fn action_block(&mut self, statements: &[Statm]) -> fmt::Result {
        self.pad()?;
        self.list(statements)
    }

    /// `begin`, the statements separated by `;`, `end` (no terminator)
    fn list(&mut self, statements: &[Statm]) -> fmt::Result {
        self.out.write_str("begin\n")?;
        self.indent += 1;
        for (i, statement) in statements.iter().enumerate() {
            self.pad()?;
            self.statement(statement)?;
            if i + 1 < statements.len() {
                self.out.write_char(';')?;
            }
            self.out.write_char('\n')?;
        }
        self.indent -= 1;
        self.pad()?;
        self.out.write_str("end")
    }

    /// One statement, starting at the current column, without a trailing
    /// separator or newline.
    fn statement(&mut self, statement: &Statm) -> fmt::Result {
        match statement {
            Statm::Assign(assign) => write!(self.out, "{} := {}", assign.target, assign.value),
            Statm::Call(call) => write!(self.out, "{}", call),
            Statm::List(statements) => self.list(statements),
            Statm::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                write!(self.out, "if {} then ", condition)?;
                match else_branch {
                    Some(else_branch) => {
                        self.braced(then_branch)?;
                        self.out.write_str(" else ")?;
                        self.statement(else_branch)
                    }
                    None => self.statement(then_branch),
                }
            }
            Statm::Loop(Loop { kind, body, .. }) => {
                match kind {
                    LoopKind::While { condition } => write!(self.out, "while {} do ", condition)?,
                    LoopKind::For {
                        init,
                        downto,
                        limit,
                    } => write!(
                        self.out,
                        "for {} := {} {} {} do ",
                        init.target,
                        init.value,
                        if *downto { "downto" } else { "to" },
                        limit
                    )?,
                }
                self.statement(body)
            }
            Statm::Break { .. } => self.out.write_str("break"),
            Statm::Program(name) => write!(self.out, "{{ program {} }}", name),
            Statm::Decl(_) | Statm::DeclConst { .. } | Statm::DeclCallable(_) => {
                // declarations never appear among action statements
                write!(self.out, "{{ declaration }}")
            }
        }
    }

    /// A then-branch followed by `else` is always printed as a block so the
    /// `else` cannot attach to a nested `if`.
    fn braced(&mut self, statement: &Statm) -> fmt::Result {
        match statement {
            Statm::List(_) => self.statement(statement),
            other => self.statement(&Statm::List(vec![other.clone()])),
        }
    }
}
