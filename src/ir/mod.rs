//! Basic-block intermediate representation
//!
//! The translation pass does not build this representation directly; it
//! talks to the [`IrBuilder`] trait, which exposes what a backend code
//! generator offers: typed constants, arithmetic, comparisons, storage slots,
//! globals, blocks, branches and calls. [`ModuleBuilder`] is the in-crate
//! implementation, producing a [`Module`] that can be dumped as text or run
//! by [`crate::runtime::Machine`].
//!
//! Values are 32-bit integers (`i32`) or booleans (`i1`). Storage is reached
//! through pointer values: globals, stack slots created with `alloca`, and
//! element pointers into global arrays.

mod builder;
mod display;

pub use builder::{IrBuilder, ModuleBuilder};
pub(crate) use builder::{fold_binary, fold_compare};

use std::fmt;

/// Index of a function in its [`Module`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub usize);

/// A basic block of a particular function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub func: FuncId,
    pub index: usize,
}

/// Index of a global in its [`Module`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub usize);

/// Virtual register, numbered per function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub usize);

/// Instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// `i32` constant
    Int(i32),
    /// `i1` constant
    Bool(bool),
    Reg(Reg),
    /// Incoming argument of the current function
    Arg(usize),
    /// Address of a global
    Global(GlobalId),
}

impl Value {
    pub fn as_int(self) -> Option<i32> {
        match self {
            Value::Int(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    And,
    Or,
    Xor,
}

/// Signed integer comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sgt,
    Sle,
    Sge,
}

impl IntPredicate {
    pub fn evaluate(self, lhs: i32, rhs: i32) -> bool {
        match self {
            IntPredicate::Eq => lhs == rhs,
            IntPredicate::Ne => lhs != rhs,
            IntPredicate::Slt => lhs < rhs,
            IntPredicate::Sgt => lhs > rhs,
            IntPredicate::Sle => lhs <= rhs,
            IntPredicate::Sge => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Binary {
        dest: Reg,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    Compare {
        dest: Reg,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Stack slot for one `i32`, valid until the function returns
    Alloca { dest: Reg, name: String },
    Load { dest: Reg, ptr: Value },
    Store { value: Value, ptr: Value },
    /// Address of element `index` of the array `base` points to
    ElementPtr { dest: Reg, base: Value, index: Value },
    Call {
        dest: Option<Reg>,
        callee: FuncId,
        args: Vec<Value>,
    },
    Br { target: BlockId },
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret { value: Option<Value> },
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Br { .. } | Instruction::CondBr { .. } | Instruction::Ret { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|inst| inst.is_terminator())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: usize,
    pub returns_value: bool,
    /// Accepts arguments beyond `params` (`printf`, `scanf`)
    pub variadic: bool,
    /// Empty for functions defined outside the module
    pub blocks: Vec<Block>,
    pub(crate) next_reg: usize,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    External,
    /// Zero-initialised, merged across object files
    Common,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalKind {
    Int(i32),
    /// Zero-initialised `[len x i32]`
    IntArray(usize),
    /// NUL-terminated byte string
    Bytes(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub kind: GlobalKind,
    pub constant: bool,
    pub linkage: Linkage,
}

/// A translated compilation unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

impl Module {
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(FuncId)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.functions[id.func.0].blocks[id.index]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0]
    }

    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals.iter().position(|g| g.name == name).map(GlobalId)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Linkage::External => "external",
            Linkage::Common => "common",
            Linkage::Private => "private",
        })
    }
}
