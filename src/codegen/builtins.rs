//! Built-in callables
//!
//! | Name          | Translation                         | Value        |
//! |---------------|-------------------------------------|--------------|
//! | `writeln(e)`  | `printf("%d\n", e)`                 | printf's     |
//! | `readln(v)`   | `scanf("%d", &v)`                   | scanf's      |
//! | `write('s')`  | `printf("%s", "s")`                 | none         |
//! | `dec(v)`      | `v := v - 1`                        | none         |
//! | `exit`        | return from the enclosing callable  | none         |
//!
//! The built-ins are registered in the global symbol table as callables
//! with [`Storage::Intrinsic`] storage, so user code cannot redeclare them
//! at global scope, and their arity is checked like any other call.

use log::debug;

use crate::codegen::constants::{
    return_slot, FMT_READLN, FMT_WRITE, FMT_WRITELN, PRINTF, SCANF, STRING_GLOBAL,
};
use crate::codegen::errors::SemanticError;
use crate::codegen::symtab::{Builtin, Object, Storage};
use crate::codegen::translate::{CallResult, Translator};
use crate::ir::{BinaryOp, FuncId, GlobalKind, IrBuilder, Linkage, Value};
use crate::parser::ast::{CallExpr, Expr, SourceLocation};

/// External functions and format strings the built-ins use
#[derive(Debug, Clone, Copy)]
pub struct RuntimeFunctions {
    pub printf: FuncId,
    pub scanf: FuncId,
    fmt_writeln: Value,
    fmt_readln: Value,
    fmt_write: Value,
}

impl RuntimeFunctions {
    pub fn declare<B: IrBuilder>(builder: &mut B) -> Self {
        let mut format = |text: &str| {
            builder.add_global(
                STRING_GLOBAL,
                GlobalKind::Bytes(text.to_string()),
                true,
                Linkage::Private,
            )
        };
        let fmt_writeln = format(FMT_WRITELN);
        let fmt_readln = format(FMT_READLN);
        let fmt_write = format(FMT_WRITE);

        RuntimeFunctions {
            printf: builder.declare_external(PRINTF, 1, true, true),
            scanf: builder.declare_external(SCANF, 1, true, true),
            fmt_writeln,
            fmt_readln,
            fmt_write,
        }
    }
}

const BUILTINS: &[(&str, Builtin, usize, bool)] = &[
    ("writeln", Builtin::WriteLn, 1, true),
    ("readln", Builtin::ReadLn, 1, true),
    ("write", Builtin::Write, 1, false),
    ("dec", Builtin::Dec, 1, false),
    ("exit", Builtin::Exit, 0, false),
];

impl<B: IrBuilder> Translator<'_, B> {
    pub(crate) fn declare_builtins(&mut self) -> Result<(), SemanticError> {
        for &(name, builtin, params, returns_value) in BUILTINS {
            self.symbols.decl_callable(
                false,
                name,
                Object::Callable {
                    params,
                    returns_value,
                },
                Storage::Intrinsic(builtin),
                SourceLocation::default(),
            )?;
        }
        debug!("declared {} built-ins", BUILTINS.len());
        Ok(())
    }

    /// Arity has been checked by the caller.
    pub(crate) fn translate_builtin(
        &mut self,
        builtin: Builtin,
        call: &CallExpr,
        as_value: bool,
    ) -> Result<CallResult, SemanticError> {
        let location = call.location;
        if as_value {
            match builtin {
                Builtin::Exit => return Err(SemanticError::ExitAsValue { location }),
                Builtin::Write | Builtin::Dec => {
                    return Err(SemanticError::ProcedureAsValue {
                        name: call.name.clone(),
                        location,
                    })
                }
                Builtin::WriteLn | Builtin::ReadLn => {}
            }
        }

        match builtin {
            Builtin::WriteLn => {
                let value = self.translate_expr(&call.args[0])?;
                let (printf, fmt) = (self.runtime.printf, self.runtime.fmt_writeln);
                Ok(self.emit_call(printf, vec![fmt, value]))
            }
            Builtin::ReadLn => {
                let target = &call.args[0];
                self.ensure_readable_target(target)?;
                let ptr = self.pointer(target)?;
                let (scanf, fmt) = (self.runtime.scanf, self.runtime.fmt_readln);
                Ok(self.emit_call(scanf, vec![fmt, ptr]))
            }
            Builtin::Write => {
                let text = self.translate_expr(&call.args[0])?;
                let (printf, fmt) = (self.runtime.printf, self.runtime.fmt_write);
                self.emit_call(printf, vec![fmt, text]);
                Ok(CallResult::Void)
            }
            Builtin::Dec => {
                self.translate_dec(&call.args[0])?;
                Ok(CallResult::Void)
            }
            Builtin::Exit => {
                self.translate_exit(location)?;
                Ok(CallResult::Exited)
            }
        }
    }

    /// `readln` stores into an integer variable or an array element.
    fn ensure_readable_target(&self, target: &Expr) -> Result<(), SemanticError> {
        let location = target.location();
        let not_assignable = || SemanticError::NotAssignable {
            name: target.to_string(),
            location,
        };
        match target {
            Expr::Var(name, _) => {
                let symbol = self.symbols.ensure_not_const(name, location)?;
                if *symbol.object != Object::Integer {
                    return Err(not_assignable());
                }
                Ok(())
            }
            Expr::ArrayElement { name, .. } => {
                self.symbols.ensure_not_const(name, location)?;
                Ok(())
            }
            _ => Err(not_assignable()),
        }
    }

    fn translate_dec(&mut self, target: &Expr) -> Result<(), SemanticError> {
        let location = target.location();
        let Expr::Var(name, _) = target else {
            return Err(SemanticError::NotDecrementable {
                name: target.to_string(),
                location,
            });
        };
        let symbol = self.symbols.ensure_not_const(name, location)?;
        if *symbol.object != Object::Integer {
            return Err(SemanticError::NotDecrementable {
                name: name.clone(),
                location,
            });
        }

        let ptr = self.pointer(target)?;
        let current = self.builder.load(ptr);
        let one = self.builder.const_int(1);
        let next = self.builder.binary(BinaryOp::Sub, current, one);
        self.builder.store(next, ptr);
        Ok(())
    }

    /// Return the result slot's current value, or nothing from a procedure.
    fn translate_exit(&mut self, location: SourceLocation) -> Result<(), SemanticError> {
        let (ident, returns_value) = match self.symbols.enclosing_callable() {
            Some(symbol) => {
                let returns_value = matches!(
                    *symbol.object,
                    Object::Callable {
                        returns_value: true,
                        ..
                    }
                );
                let ident = self.symbols.function_ident().unwrap_or_default().to_string();
                (ident, returns_value)
            }
            None => {
                return Err(SemanticError::OutsideCallable {
                    what: "exit",
                    location,
                })
            }
        };

        let value = if returns_value {
            Some(self.translate_var(&return_slot(&ident), location)?)
        } else {
            None
        };
        self.builder.ret(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::{translate_unit, SemanticError};
    use crate::ir::{Function, GlobalKind, Instruction, Module, ModuleBuilder};

    fn translate(source: &str) -> Result<Module, SemanticError> {
        let unit = crate::parse(source).expect("parses");
        let mut builder = ModuleBuilder::new("test");
        translate_unit(&unit, &mut builder)?;
        Ok(builder.finish())
    }

    fn calls_to(module: &Module, function: &Function, callee: &str) -> usize {
        function
            .blocks
            .iter()
            .flat_map(|block| &block.instructions)
            .filter(|inst| {
                matches!(inst, Instruction::Call { callee: id, .. }
                    if module.function(*id).name == callee)
            })
            .count()
    }

    #[test]
    fn test_runtime_declared() {
        let module = translate("begin end.").unwrap();
        let printf = module.function(module.function_by_name("printf").unwrap());
        assert!(printf.is_declaration());
        assert!(printf.variadic);
        assert!(module.function(module.function_by_name("scanf").unwrap()).is_declaration());
        assert_eq!(module.globals[0].kind, GlobalKind::Bytes("%d\n".into()));
    }

    #[test]
    fn test_writeln_and_write_call_printf() {
        let module = translate("begin writeln(1); write('hi') end.").unwrap();
        let main = module.function(module.function_by_name("main").unwrap());
        assert_eq!(calls_to(&module, main, "printf"), 2);
        assert!(module
            .globals
            .iter()
            .any(|g| g.kind == GlobalKind::Bytes("hi".into())));
    }

    #[test]
    fn test_readln_targets() {
        let module =
            translate("var x: integer; a: array [0 .. 2] of integer; begin readln(x); readln(a[1]) end.")
                .unwrap();
        let main = module.function(module.function_by_name("main").unwrap());
        assert_eq!(calls_to(&module, main, "scanf"), 2);

        let err = translate("const c = 1; begin readln(c) end.").unwrap_err();
        assert!(matches!(err, SemanticError::AssignToConst { .. }));

        let err = translate("var a: array [0 .. 2] of integer; begin readln(a) end.").unwrap_err();
        assert!(matches!(err, SemanticError::NotAssignable { .. }));
    }

    #[test]
    fn test_dec() {
        let module = translate("var x: integer; begin dec(x) end.").unwrap();
        let main = module.function(module.function_by_name("main").unwrap());
        assert!(main.blocks[0].instructions.iter().any(|inst| matches!(
            inst,
            Instruction::Binary {
                op: crate::ir::BinaryOp::Sub,
                ..
            }
        )));

        let err = translate("var a: array [0 .. 2] of integer; begin dec(a[0]) end.").unwrap_err();
        assert!(matches!(err, SemanticError::NotDecrementable { .. }));
    }

    #[test]
    fn test_builtins_as_values() {
        let err = translate("var x: integer; begin x := exit end.").unwrap_err();
        assert!(matches!(err, SemanticError::ExitAsValue { .. }));

        assert!(translate("var x: integer; begin x := writeln(3) end.").is_ok());
    }

    #[test]
    fn test_builtin_names_reserved() {
        let err = translate("var writeln: integer; begin end.").unwrap_err();
        assert!(matches!(err, SemanticError::Redeclared { .. }));
    }

    #[test]
    fn test_exit_in_procedure_returns_void() {
        let module = translate("procedure p(); begin exit end; begin p() end.").unwrap();
        let p = module.function(module.function_by_name("p").unwrap());
        assert_eq!(
            p.blocks[0].terminator(),
            Some(&Instruction::Ret { value: None })
        );
    }
}
