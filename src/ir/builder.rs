//! Instruction builder
//!
//! [`IrBuilder`] is the capability the translation pass needs from a code
//! generator. [`ModuleBuilder`] implements it over an in-memory [`Module`],
//! folding operations whose operands are all constants the way an IR builder
//! does. Folding is what lets array bounds and constant initializers be
//! checked for constness after translation.

use log::{trace, warn};

use super::{
    BinaryOp, Block, BlockId, FuncId, Function, Global, GlobalId, GlobalKind, Instruction,
    IntPredicate, Linkage, Module, Reg, Value,
};

pub trait IrBuilder {
    /// Declare a function to be defined in this module.
    fn declare_function(&mut self, name: &str, params: usize, returns_value: bool) -> FuncId;

    /// Declare a function provided by the runtime environment.
    fn declare_external(
        &mut self,
        name: &str,
        params: usize,
        returns_value: bool,
        variadic: bool,
    ) -> FuncId;

    /// Create a global and return its address. Names are made unique.
    fn add_global(&mut self, name: &str, kind: GlobalKind, constant: bool, linkage: Linkage)
        -> Value;

    fn append_block(&mut self, func: FuncId, name: &str) -> BlockId;
    fn set_insert_point(&mut self, block: BlockId);

    /// Whether the block at the insert point already ends in a branch or
    /// return.
    fn is_terminated(&self) -> bool;

    fn const_int(&self, value: i32) -> Value {
        Value::Int(value)
    }

    fn const_bool(&self, value: bool) -> Value {
        Value::Bool(value)
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value;
    fn compare(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value;

    /// Stack slot in the entry block of the current function.
    fn alloca(&mut self, name: &str) -> Value;
    fn load(&mut self, ptr: Value) -> Value;
    fn store(&mut self, value: Value, ptr: Value);
    fn element_ptr(&mut self, base: Value, index: Value) -> Value;

    /// Emit a call; the result is `None` for callees without a return value.
    fn call(&mut self, callee: FuncId, args: Vec<Value>) -> Option<Value>;

    fn br(&mut self, target: BlockId);
    fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId);
    fn ret(&mut self, value: Option<Value>);
}

/// Builds a [`Module`] in memory
pub struct ModuleBuilder {
    module: Module,
    insert_point: Option<BlockId>,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        ModuleBuilder {
            module: Module {
                name: name.to_string(),
                ..Module::default()
            },
            insert_point: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    fn unique_function_name(&self, name: &str) -> String {
        let taken = |candidate: &str| self.module.functions.iter().any(|f| f.name == candidate);
        unique_name(name, taken)
    }

    fn add_function(&mut self, function: Function) -> FuncId {
        let id = FuncId(self.module.functions.len());
        trace!("declare function {} as #{}", function.name, id.0);
        self.module.functions.push(function);
        id
    }

    fn fresh_reg(&mut self) -> Option<Reg> {
        let block = self.insert_point?;
        let function = &mut self.module.functions[block.func.0];
        let reg = Reg(function.next_reg);
        function.next_reg += 1;
        Some(reg)
    }

    fn push(&mut self, inst: Instruction) {
        let Some(at) = self.insert_point else {
            warn!("no insert point, dropping {:?}", inst);
            return;
        };
        let block = &mut self.module.functions[at.func.0].blocks[at.index];
        if block.terminator().is_some() {
            warn!("block {} is terminated, dropping {:?}", block.name, inst);
            return;
        }
        block.instructions.push(inst);
    }

    /// Emit an instruction that defines a register.
    fn push_value(&mut self, make: impl FnOnce(Reg) -> Instruction) -> Value {
        match self.fresh_reg() {
            Some(reg) => {
                self.push(make(reg));
                Value::Reg(reg)
            }
            None => {
                warn!("no insert point for a value-producing instruction");
                Value::Int(0)
            }
        }
    }
}

impl IrBuilder for ModuleBuilder {
    fn declare_function(&mut self, name: &str, params: usize, returns_value: bool) -> FuncId {
        let name = self.unique_function_name(name);
        self.add_function(Function {
            name,
            params,
            returns_value,
            variadic: false,
            blocks: Vec::new(),
            next_reg: 0,
        })
    }

    fn declare_external(
        &mut self,
        name: &str,
        params: usize,
        returns_value: bool,
        variadic: bool,
    ) -> FuncId {
        let name = self.unique_function_name(name);
        self.add_function(Function {
            name,
            params,
            returns_value,
            variadic,
            blocks: Vec::new(),
            next_reg: 0,
        })
    }

    fn add_global(
        &mut self,
        name: &str,
        kind: GlobalKind,
        constant: bool,
        linkage: Linkage,
    ) -> Value {
        let name = unique_name(name, |candidate| {
            self.module.globals.iter().any(|g| g.name == candidate)
        });
        let id = GlobalId(self.module.globals.len());
        trace!("global @{} = {:?}", name, kind);
        self.module.globals.push(Global {
            name,
            kind,
            constant,
            linkage,
        });
        Value::Global(id)
    }

    fn append_block(&mut self, func: FuncId, name: &str) -> BlockId {
        let blocks = &mut self.module.functions[func.0].blocks;
        blocks.push(Block {
            name: name.to_string(),
            instructions: Vec::new(),
        });
        BlockId {
            func,
            index: blocks.len() - 1,
        }
    }

    fn set_insert_point(&mut self, block: BlockId) {
        self.insert_point = Some(block);
    }

    fn is_terminated(&self) -> bool {
        self.insert_point
            .map(|at| self.module.block(at).terminator().is_some())
            .unwrap_or(false)
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        if let Some(folded) = fold_binary(op, lhs, rhs) {
            return folded;
        }
        self.push_value(|dest| Instruction::Binary { dest, op, lhs, rhs })
    }

    fn compare(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        if let Some(folded) = fold_compare(pred, lhs, rhs) {
            return folded;
        }
        self.push_value(|dest| Instruction::Compare {
            dest,
            pred,
            lhs,
            rhs,
        })
    }

    fn alloca(&mut self, name: &str) -> Value {
        let (Some(at), Some(dest)) = (self.insert_point, self.fresh_reg()) else {
            warn!("no function to allocate {} in", name);
            return Value::Int(0);
        };
        let entry = &mut self.module.functions[at.func.0].blocks[0];
        let position = entry
            .instructions
            .iter()
            .take_while(|inst| matches!(inst, Instruction::Alloca { .. }))
            .count();
        entry.instructions.insert(
            position,
            Instruction::Alloca {
                dest,
                name: name.to_string(),
            },
        );
        Value::Reg(dest)
    }

    fn load(&mut self, ptr: Value) -> Value {
        self.push_value(|dest| Instruction::Load { dest, ptr })
    }

    fn store(&mut self, value: Value, ptr: Value) {
        self.push(Instruction::Store { value, ptr });
    }

    fn element_ptr(&mut self, base: Value, index: Value) -> Value {
        self.push_value(|dest| Instruction::ElementPtr { dest, base, index })
    }

    fn call(&mut self, callee: FuncId, args: Vec<Value>) -> Option<Value> {
        if self.module.function(callee).returns_value {
            Some(self.push_value(|dest| Instruction::Call {
                dest: Some(dest),
                callee,
                args,
            }))
        } else {
            self.push(Instruction::Call {
                dest: None,
                callee,
                args,
            });
            None
        }
    }

    fn br(&mut self, target: BlockId) {
        self.push(Instruction::Br { target });
    }

    fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.push(Instruction::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    fn ret(&mut self, value: Option<Value>) {
        self.push(Instruction::Ret { value });
    }
}

/// `name`, or `name.1`, `name.2`, ... if taken
fn unique_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("{}.{}", name, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Fold a binary operation on constants with 32-bit wrapping semantics.
/// Division by zero is left to run time.
pub(crate) fn fold_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let folded = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::SDiv if b == 0 => return None,
                BinaryOp::SDiv => a.wrapping_div(b),
                BinaryOp::SRem if b == 0 => return None,
                BinaryOp::SRem => a.wrapping_rem(b),
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                BinaryOp::Xor => a ^ b,
            };
            Some(Value::Int(folded))
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Some(Value::Bool(a & b)),
            BinaryOp::Or => Some(Value::Bool(a | b)),
            BinaryOp::Xor => Some(Value::Bool(a ^ b)),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn fold_compare(pred: IntPredicate, lhs: Value, rhs: Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Bool(pred.evaluate(a, b))),
        (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(pred.evaluate(a as i32, b as i32))),
        _ => None,
    }
}
