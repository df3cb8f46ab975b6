//! Textual IR dump, loosely following LLVM assembly syntax

use std::fmt;

use rustc_hash::FxHashMap;

use super::{
    BinaryOp, BlockId, Function, Global, GlobalKind, Instruction, IntPredicate, Module, Value,
};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(f, "{}", GlobalDef(global))?;
        }

        for function in &self.functions {
            writeln!(f)?;
            write_function(f, self, function)?;
        }
        Ok(())
    }
}

struct GlobalDef<'a>(&'a Global);

impl fmt::Display for GlobalDef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let global = self.0;
        write!(f, "@{} = ", global.name)?;
        if global.linkage != super::Linkage::External {
            write!(f, "{} ", global.linkage)?;
        }
        f.write_str(if global.constant { "constant " } else { "global " })?;
        match &global.kind {
            GlobalKind::Int(value) => write!(f, "i32 {}", value),
            GlobalKind::IntArray(len) => write!(f, "[{} x i32] zeroinitializer", len),
            GlobalKind::Bytes(text) => {
                write!(f, "[{} x i8] c\"", text.len() + 1)?;
                for byte in text.bytes() {
                    if byte.is_ascii_graphic() && byte != b'"' && byte != b'\\' || byte == b' ' {
                        write!(f, "{}", byte as char)?;
                    } else {
                        write!(f, "\\{:02X}", byte)?;
                    }
                }
                f.write_str("\\00\"")
            }
        }
    }
}

fn ret_type(function: &Function) -> &'static str {
    if function.returns_value {
        "i32"
    } else {
        "void"
    }
}

/// Block labels, with a numeric suffix on repeated names
fn block_labels(function: &Function) -> Vec<String> {
    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    function
        .blocks
        .iter()
        .map(|block| {
            let count = seen.entry(block.name.as_str()).or_insert(0);
            let label = if *count == 0 {
                block.name.clone()
            } else {
                format!("{}{}", block.name, count)
            };
            *count += 1;
            label
        })
        .collect()
}

fn write_function(f: &mut fmt::Formatter<'_>, module: &Module, function: &Function) -> fmt::Result {
    let mut params: Vec<String> = (0..function.params).map(|i| format!("i32 %arg{}", i)).collect();

    if function.is_declaration() {
        // externals take a format string first
        let mut types: Vec<&str> = vec!["ptr"; function.params];
        if function.variadic {
            types.push("...");
        }
        return writeln!(
            f,
            "declare {} @{}({})",
            ret_type(function),
            function.name,
            types.join(", ")
        );
    }

    if function.variadic {
        params.push("...".to_string());
    }
    writeln!(
        f,
        "define {} @{}({}) {{",
        ret_type(function),
        function.name,
        params.join(", ")
    )?;

    let labels = block_labels(function);
    let ctx = Ctx {
        module,
        labels: &labels,
    };
    for (index, block) in function.blocks.iter().enumerate() {
        if index > 0 {
            writeln!(f)?;
        }
        writeln!(f, "{}:", labels[index])?;
        for inst in &block.instructions {
            write!(f, "  ")?;
            ctx.write_instruction(f, inst)?;
            writeln!(f)?;
        }
    }
    writeln!(f, "}}")
}

struct Ctx<'a> {
    module: &'a Module,
    labels: &'a [String],
}

impl Ctx<'_> {
    fn operand(&self, value: Value) -> String {
        match value {
            Value::Int(v) => v.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Reg(reg) => format!("%{}", reg.0),
            Value::Arg(i) => format!("%arg{}", i),
            Value::Global(id) => format!("@{}", self.module.global(id).name),
        }
    }

    fn label(&self, block: BlockId) -> String {
        format!("label %{}", self.labels[block.index])
    }

    fn write_instruction(&self, f: &mut fmt::Formatter<'_>, inst: &Instruction) -> fmt::Result {
        match inst {
            Instruction::Binary { dest, op, lhs, rhs } => write!(
                f,
                "%{} = {} {}, {}",
                dest.0,
                binary_mnemonic(*op),
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            Instruction::Compare {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(
                f,
                "%{} = icmp {} {}, {}",
                dest.0,
                predicate_mnemonic(*pred),
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            Instruction::Alloca { dest, name } => write!(f, "%{} = alloca i32 ; {}", dest.0, name),
            Instruction::Load { dest, ptr } => {
                write!(f, "%{} = load i32, ptr {}", dest.0, self.operand(*ptr))
            }
            Instruction::Store { value, ptr } => write!(
                f,
                "store {}, ptr {}",
                self.operand(*value),
                self.operand(*ptr)
            ),
            Instruction::ElementPtr { dest, base, index } => write!(
                f,
                "%{} = getelementptr i32, ptr {}, i32 {}",
                dest.0,
                self.operand(*base),
                self.operand(*index)
            ),
            Instruction::Call { dest, callee, args } => {
                let function = self.module.function(*callee);
                if let Some(dest) = dest {
                    write!(f, "%{} = ", dest.0)?;
                }
                let args: Vec<String> = args.iter().map(|arg| self.operand(*arg)).collect();
                write!(
                    f,
                    "call {} @{}({})",
                    ret_type(function),
                    function.name,
                    args.join(", ")
                )
            }
            Instruction::Br { target } => write!(f, "br {}", self.label(*target)),
            Instruction::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(
                f,
                "br {}, {}, {}",
                self.operand(*cond),
                self.label(*then_block),
                self.label(*else_block)
            ),
            Instruction::Ret { value: Some(value) } => write!(f, "ret i32 {}", self.operand(*value)),
            Instruction::Ret { value: None } => f.write_str("ret void"),
        }
    }
}

fn binary_mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::SDiv => "sdiv",
        BinaryOp::SRem => "srem",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Xor => "xor",
    }
}

fn predicate_mnemonic(pred: IntPredicate) -> &'static str {
    match pred {
        IntPredicate::Eq => "eq",
        IntPredicate::Ne => "ne",
        IntPredicate::Slt => "slt",
        IntPredicate::Sgt => "sgt",
        IntPredicate::Sle => "sle",
        IntPredicate::Sge => "sge",
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::*;

    #[test]
    fn test_dump() {
        let mut builder = ModuleBuilder::new("demo");
        let fmt = builder.add_global(".fmt", GlobalKind::Bytes("%d\n".into()), true, Linkage::Private);
        let printf = builder.declare_external("printf", 1, true, true);
        let main = builder.declare_function("main", 0, true);
        let entry = builder.append_block(main, "body");
        builder.set_insert_point(entry);
        let x = builder.alloca("x");
        builder.store(Value::Int(7), x);
        let loaded = builder.load(x);
        builder.call(printf, vec![fmt, loaded]);
        builder.ret(Some(Value::Int(0)));

        let text = builder.finish().to_string();
        let expected = "\
; ModuleID = 'demo'

@.fmt = private constant [4 x i8] c\"%d\\0A\\00\"

declare i32 @printf(ptr, ...)

define i32 @main() {
body:
  %0 = alloca i32 ; x
  store 7, ptr %0
  %1 = load i32, ptr %0
  %2 = call i32 @printf(@.fmt, %1)
  ret i32 0
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_repeated_block_labels() {
        let mut builder = ModuleBuilder::new("demo");
        let f = builder.declare_function("f", 0, false);
        let a = builder.append_block(f, "loop");
        let b = builder.append_block(f, "loop");
        builder.set_insert_point(a);
        builder.br(b);
        builder.set_insert_point(b);
        builder.ret(None);

        let text = builder.finish().to_string();
        assert!(text.contains("br label %loop1"));
        assert!(text.contains("loop1:\n  ret void"));
    }
}
