//! AST to IR translation
//!
//! [`Translator`] walks a [`Unit`] once, consulting the [`SymbolTable`] for
//! every name and emitting instructions through an [`IrBuilder`]. The first
//! semantic error stops translation.
//!
//! Statement methods return `Option<Terminated>`: `Some` when the statement
//! ended its basic block with a `ret` or a branch to a loop exit, so the
//! caller emits nothing more into that block. Control statements live in
//! `loops.rs`, built-ins in `builtins.rs`.
//!
//! # Constant contexts
//!
//! Array bounds and constant initializers are evaluated with
//! `const_context` set. There a variable must be a declared constant and
//! yields its value directly, and calls, array elements, strings and
//! division by a constant zero are rejected. Everything else folds in the
//! builder, so nothing is emitted.

use std::rc::Rc;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::codegen::builtins::RuntimeFunctions;
use crate::codegen::constants::{return_slot, BLOCK_BODY, STRING_GLOBAL};
use crate::codegen::errors::SemanticError;
use crate::codegen::symtab::{Object, Storage, SymbolTable};
use crate::ir::{BinaryOp, BlockId, FuncId, GlobalKind, IntPredicate, IrBuilder, Linkage, Value};
use crate::parser::ast::{
    Assignment, BinOp, CallExpr, CallableDecl, DataType, Expr, LoopId, SourceLocation, Statm,
    Unit, VarDecl,
};

/// How a statement ended its basic block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// `exit` returned from the callable
    Exit,
    /// `break` jumped to the loop exit
    Break,
}

/// Outcome of translating a call
pub(crate) enum CallResult {
    Value(Value),
    Void,
    /// The call was `exit`; the block is terminated
    Exited,
}

pub struct Translator<'b, B> {
    pub(crate) builder: &'b mut B,
    pub(crate) symbols: SymbolTable,
    /// Exit block of every loop translated so far
    pub(crate) loop_exits: FxHashMap<LoopId, BlockId>,
    pub(crate) runtime: RuntimeFunctions,
    const_context: bool,
}

/// Translate a whole program into `builder`.
pub fn translate_unit<B: IrBuilder>(unit: &Unit, builder: &mut B) -> Result<(), SemanticError> {
    let mut translator = Translator::new(builder)?;
    translator.translate_statements(&unit.statements)?;
    translator.finish()
}

impl<'b, B: IrBuilder> Translator<'b, B> {
    /// Declare the runtime functions and register the built-ins.
    pub fn new(builder: &'b mut B) -> Result<Self, SemanticError> {
        let runtime = RuntimeFunctions::declare(builder);
        let mut translator = Translator {
            builder,
            symbols: SymbolTable::new(),
            loop_exits: FxHashMap::default(),
            runtime,
            const_context: false,
        };
        translator.declare_builtins()?;
        Ok(translator)
    }

    /// Report the first forward declaration that was never defined.
    pub fn finish(self) -> Result<(), SemanticError> {
        let first = self
            .symbols
            .undefined_forwards()
            .min_by_key(|(_, symbol)| (symbol.location.line, symbol.location.column));
        match first {
            Some((ident, symbol)) => Err(SemanticError::ForwardNeverDefined {
                name: ident.to_string(),
                location: symbol.location,
            }),
            None => Ok(()),
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    // ===== Statements =====

    /// Translate statements in order, stopping after the first one that
    /// terminates the block.
    pub fn translate_statements(
        &mut self,
        statements: &[Statm],
    ) -> Result<Option<Terminated>, SemanticError> {
        for statement in statements {
            if let Some(terminated) = self.translate_statement(statement)? {
                return Ok(Some(terminated));
            }
        }
        Ok(None)
    }

    pub fn translate_statement(
        &mut self,
        statement: &Statm,
    ) -> Result<Option<Terminated>, SemanticError> {
        match statement {
            Statm::Program(name) => {
                debug!("program {}", name);
                Ok(None)
            }
            Statm::Decl(decl) => {
                self.translate_var_decl(decl)?;
                Ok(None)
            }
            Statm::DeclConst {
                name,
                value,
                location,
            } => {
                let value = self.const_eval(value)?;
                self.symbols.decl_const(self.builder, name, value, *location)?;
                Ok(None)
            }
            Statm::DeclCallable(decl) => {
                self.translate_callable(decl)?;
                Ok(None)
            }
            Statm::Call(call) => match self.translate_call(call, false)? {
                CallResult::Exited => Ok(Some(Terminated::Exit)),
                CallResult::Value(_) | CallResult::Void => Ok(None),
            },
            Statm::Assign(assignment) => {
                self.translate_assign(assignment)?;
                Ok(None)
            }
            Statm::List(statements) => self.translate_statements(statements),
            Statm::If {
                condition,
                then_branch,
                else_branch,
                location,
            } => self.translate_if(condition, then_branch, else_branch.as_deref(), *location),
            Statm::Loop(lp) => self.translate_loop(lp),
            Statm::Break { target, location } => self.translate_break(*target, *location),
        }
    }

    pub(crate) fn translate_assign(&mut self, assignment: &Assignment) -> Result<(), SemanticError> {
        let target = &assignment.target;
        let name = target
            .assignable_name()
            .ok_or_else(|| SemanticError::NotAssignable {
                name: target.to_string(),
                location: target.location(),
            })?;
        self.symbols.ensure_not_const(name, target.location())?;

        let ptr = self.pointer(target)?;
        let value = self.translate_expr(&assignment.value)?;
        self.builder.store(value, ptr);
        Ok(())
    }

    // ===== Declarations =====

    fn translate_var_decl(&mut self, decl: &VarDecl) -> Result<(), SemanticError> {
        let object = Rc::new(self.resolve_type(&decl.data_type)?);
        for ident in &decl.idents {
            self.symbols
                .decl_var(self.builder, ident, Rc::clone(&object), decl.location)?;
        }
        Ok(())
    }

    fn resolve_type(&mut self, data_type: &DataType) -> Result<Object, SemanticError> {
        match data_type {
            DataType::Integer => Ok(Object::Integer),
            DataType::Array { from, to } => Ok(Object::Array {
                from: self.const_eval(from)?,
                to: self.const_eval(to)?,
            }),
        }
    }

    fn translate_callable(&mut self, decl: &CallableDecl) -> Result<(), SemanticError> {
        let returns_value = decl.return_type.is_some();
        let object = Object::Callable {
            params: decl.param_count(),
            returns_value,
        };
        let forward = decl.is_forward();

        // a definition reuses the function its forward declaration created
        let func = match self.symbols.forward_symbol(&decl.name) {
            Some(symbol) if !forward => {
                if *symbol.object != object {
                    return Err(SemanticError::ForwardMismatch {
                        name: decl.name.clone(),
                        location: decl.location,
                    });
                }
                match symbol.storage {
                    Storage::Function(func) => func,
                    _ => {
                        return Err(SemanticError::NotCallable {
                            name: decl.name.clone(),
                            location: decl.location,
                        })
                    }
                }
            }
            _ => {
                if forward {
                    self.symbols
                        .ensure_not_declared_forward(&decl.name, decl.location)?;
                    if self.symbols.exists_global(&decl.name) {
                        return Err(SemanticError::Redeclared {
                            name: decl.name.clone(),
                            location: decl.location,
                        });
                    }
                } else {
                    self.symbols.ensure_not_declared(&decl.name, decl.location)?;
                }
                self.builder
                    .declare_function(&decl.name, decl.param_count(), returns_value)
            }
        };
        self.symbols.decl_callable(
            forward,
            &decl.name,
            object,
            Storage::Function(func),
            decl.location,
        )?;

        let Some(body) = &decl.body else {
            return Ok(());
        };
        debug!("translating body of {}", decl.name);

        let entry = self.builder.append_block(func, BLOCK_BODY);
        self.builder.set_insert_point(entry);
        self.symbols.set_local_scope(func, &decl.name);

        let result_slot = if returns_value {
            let slot = return_slot(&decl.name);
            self.symbols
                .decl_var(self.builder, &slot, Rc::new(Object::Integer), decl.location)?;
            let ptr = self.variable_address(&slot, decl.location)?;
            let zero = self.builder.const_int(0);
            self.builder.store(zero, ptr);
            Some(slot)
        } else {
            None
        };

        let mut arg = 0;
        for group in &decl.params {
            let object = Rc::new(Object::Integer);
            for ident in &group.idents {
                self.symbols
                    .decl_var(self.builder, ident, Rc::clone(&object), group.location)?;
                let ptr = self.variable_address(ident, group.location)?;
                self.builder.store(Value::Arg(arg), ptr);
                arg += 1;
            }
        }

        self.translate_statements(body)?;

        if !self.builder.is_terminated() {
            let value = match &result_slot {
                Some(slot) => Some(self.translate_var(slot, decl.location)?),
                None => None,
            };
            self.builder.ret(value);
        }
        self.symbols.set_global_scope();
        Ok(())
    }

    /// Evaluate an expression that must be a compile-time constant.
    pub(crate) fn const_eval(&mut self, expr: &Expr) -> Result<i32, SemanticError> {
        let saved = std::mem::replace(&mut self.const_context, true);
        let result = self.translate_expr(expr);
        self.const_context = saved;

        result?.as_int().ok_or_else(|| SemanticError::NotConstant {
            what: expr.to_string(),
            location: expr.location(),
        })
    }

    // ===== Expressions =====

    pub fn translate_expr(&mut self, expr: &Expr) -> Result<Value, SemanticError> {
        trace!("expr {}", expr);
        match expr {
            Expr::Var(name, location) => self.translate_var(name, *location),
            Expr::Numb(value, _) => Ok(self.builder.const_int(*value)),
            Expr::String(text, location) => {
                self.ensure_runtime_context("string", *location)?;
                Ok(self.intern_string(text))
            }
            Expr::Bop {
                op,
                left,
                right,
                location,
            } => {
                let lhs = self.translate_expr(left)?;
                let rhs = self.translate_expr(right)?;
                if self.const_context
                    && matches!(op, BinOp::Div | BinOp::Mod)
                    && rhs == Value::Int(0)
                {
                    return Err(SemanticError::NotConstant {
                        what: "division by zero".to_string(),
                        location: *location,
                    });
                }
                Ok(self.translate_bop(*op, lhs, rhs))
            }
            Expr::UnMinus(operand, _) => {
                let zero = self.builder.const_int(0);
                let value = self.translate_expr(operand)?;
                Ok(self.builder.binary(BinaryOp::Sub, zero, value))
            }
            // xor with an `i1` true even on `i32` operands, same widths as conditions
            Expr::Not(operand, _) => {
                let value = self.translate_expr(operand)?;
                let all_set = self.builder.const_bool(true);
                Ok(self.builder.binary(BinaryOp::Xor, value, all_set))
            }
            Expr::ArrayElement {
                name,
                index,
                location,
            } => {
                self.ensure_runtime_context("array element", *location)?;
                let ptr = self.element_pointer(name, index, *location)?;
                Ok(self.builder.load(ptr))
            }
            Expr::Call(call) => {
                self.ensure_runtime_context("call", call.location)?;
                match self.translate_call(call, true)? {
                    CallResult::Value(value) => Ok(value),
                    CallResult::Void => Err(SemanticError::ProcedureAsValue {
                        name: call.name.clone(),
                        location: call.location,
                    }),
                    CallResult::Exited => Err(SemanticError::ExitAsValue {
                        location: call.location,
                    }),
                }
            }
        }
    }

    fn ensure_runtime_context(
        &self,
        what: &str,
        location: SourceLocation,
    ) -> Result<(), SemanticError> {
        if self.const_context {
            return Err(SemanticError::NotConstant {
                what: what.to_string(),
                location,
            });
        }
        Ok(())
    }

    fn translate_bop(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let binary = match op {
            BinOp::Add => BinaryOp::Add,
            BinOp::Sub => BinaryOp::Sub,
            BinOp::Mul => BinaryOp::Mul,
            BinOp::Div => BinaryOp::SDiv,
            BinOp::Mod => BinaryOp::SRem,
            BinOp::And => BinaryOp::And,
            BinOp::Or => BinaryOp::Or,
            BinOp::Eq => return self.builder.compare(IntPredicate::Eq, lhs, rhs),
            BinOp::Ne => return self.builder.compare(IntPredicate::Ne, lhs, rhs),
            BinOp::Lt => return self.builder.compare(IntPredicate::Slt, lhs, rhs),
            BinOp::Gt => return self.builder.compare(IntPredicate::Sgt, lhs, rhs),
            BinOp::Le => return self.builder.compare(IntPredicate::Sle, lhs, rhs),
            BinOp::Ge => return self.builder.compare(IntPredicate::Sge, lhs, rhs),
        };
        self.builder.binary(binary, lhs, rhs)
    }

    /// Value of a name used as an expression.
    pub(crate) fn translate_var(
        &mut self,
        name: &str,
        location: SourceLocation,
    ) -> Result<Value, SemanticError> {
        if self.const_context {
            let symbol = self.symbols.ensure_const(name, location)?;
            return symbol
                .const_value
                .map(Value::Int)
                .ok_or_else(|| SemanticError::NotConstant {
                    what: format!("Var '{}'", name),
                    location,
                });
        }

        let object = *self.symbols.ensure_declared(name, location)?.object;
        match object {
            Object::Integer => {
                let ptr = self.variable_address(name, location)?;
                Ok(self.builder.load(ptr))
            }
            Object::Array { .. } => Err(SemanticError::ArrayAsScalar {
                name: name.to_string(),
                location,
            }),
            // inside a function its name reads the result so far
            Object::Callable { params, .. } if params > 0 => {
                self.translate_var(&return_slot(name), location)
            }
            Object::Callable { .. } => {
                let call = CallExpr {
                    name: name.to_string(),
                    args: Vec::new(),
                    location,
                };
                match self.translate_call(&call, true)? {
                    CallResult::Value(value) => Ok(value),
                    CallResult::Void => Err(SemanticError::ProcedureAsValue {
                        name: name.to_string(),
                        location,
                    }),
                    CallResult::Exited => Err(SemanticError::ExitAsValue { location }),
                }
            }
        }
    }

    fn intern_string(&mut self, text: &str) -> Value {
        self.builder.add_global(
            STRING_GLOBAL,
            GlobalKind::Bytes(text.to_string()),
            true,
            Linkage::Private,
        )
    }

    // ===== Storage =====

    fn variable_address(
        &self,
        name: &str,
        location: SourceLocation,
    ) -> Result<Value, SemanticError> {
        self.symbols
            .ensure_declared(name, location)?
            .address()
            .ok_or_else(|| SemanticError::NotAssignable {
                name: name.to_string(),
                location,
            })
    }

    /// Pointer to the storage an assignment target names. Assigning to a
    /// function's own name writes its result slot.
    pub(crate) fn pointer(&mut self, target: &Expr) -> Result<Value, SemanticError> {
        match target {
            Expr::Var(name, location) => {
                let object = *self.symbols.ensure_declared(name, *location)?.object;
                match object {
                    Object::Integer => self.variable_address(name, *location),
                    Object::Callable { .. } => self.variable_address(&return_slot(name), *location),
                    Object::Array { .. } => Err(SemanticError::ArrayAsScalar {
                        name: name.clone(),
                        location: *location,
                    }),
                }
            }
            Expr::ArrayElement {
                name,
                index,
                location,
            } => self.element_pointer(name, index, *location),
            other => Err(SemanticError::NotAssignable {
                name: other.to_string(),
                location: other.location(),
            }),
        }
    }

    /// `base + (index - from)`; the index is not range checked.
    fn element_pointer(
        &mut self,
        name: &str,
        index: &Expr,
        location: SourceLocation,
    ) -> Result<Value, SemanticError> {
        let symbol = self.symbols.ensure_declared(name, location)?;
        let Object::Array { from, .. } = *symbol.object else {
            return Err(SemanticError::NotAnArray {
                name: name.to_string(),
                location,
            });
        };
        let base = self.variable_address(name, location)?;

        let index = self.translate_expr(index)?;
        let from = self.builder.const_int(from);
        let offset = self.builder.binary(BinaryOp::Sub, index, from);
        Ok(self.builder.element_ptr(base, offset))
    }

    // ===== Calls =====

    /// Translate a call. `as_value` is set when the result is used, which
    /// procedures and `exit` reject before anything is emitted.
    pub(crate) fn translate_call(
        &mut self,
        call: &CallExpr,
        as_value: bool,
    ) -> Result<CallResult, SemanticError> {
        let symbol = self.symbols.ensure_declared(&call.name, call.location)?;
        let Object::Callable {
            params,
            returns_value,
        } = *symbol.object
        else {
            return Err(SemanticError::NotCallable {
                name: call.name.clone(),
                location: call.location,
            });
        };
        let storage = symbol.storage;

        if call.args.len() != params {
            return Err(SemanticError::WrongArity {
                name: call.name.clone(),
                expected: params,
                found: call.args.len(),
                location: call.location,
            });
        }

        match storage {
            Storage::Intrinsic(builtin) => self.translate_builtin(builtin, call, as_value),
            Storage::Function(func) => {
                if as_value && !returns_value {
                    return Err(SemanticError::ProcedureAsValue {
                        name: call.name.clone(),
                        location: call.location,
                    });
                }
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.translate_expr(arg)?);
                }
                Ok(self.emit_call(func, args))
            }
            Storage::Address(_) => Err(SemanticError::NotCallable {
                name: call.name.clone(),
                location: call.location,
            }),
        }
    }

    pub(crate) fn emit_call(&mut self, func: FuncId, args: Vec<Value>) -> CallResult {
        match self.builder.call(func, args) {
            Some(value) => CallResult::Value(value),
            None => CallResult::Void,
        }
    }

    /// Function whose body is being translated
    pub(crate) fn current_function(
        &self,
        what: &'static str,
        location: SourceLocation,
    ) -> Result<FuncId, SemanticError> {
        self.symbols
            .function()
            .ok_or(SemanticError::OutsideCallable { what, location })
    }
}
