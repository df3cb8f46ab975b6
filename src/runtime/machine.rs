//! IR interpreter
//!
//! [`Machine`] runs a [`Module`] the way the native program built from it
//! would behave: `main` is called with no arguments and its result is the
//! exit status. Arithmetic reuses the builder's constant folding, so run
//! time and compile time agree on wrapping and on comparisons.

use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use crate::ir::{
    fold_binary, fold_compare, BlockId, FuncId, Function, GlobalId, GlobalKind, Instruction,
    Module, Value,
};
use crate::runtime::{Console, ExecError, ExecLimits};

/// Storage location of one `i32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pointer {
    Global { id: GlobalId, offset: i64 },
    Stack(usize),
}

/// Run-time value of a register or argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Word {
    Int(i32),
    Ptr(Pointer),
}

struct Frame {
    func: FuncId,
    registers: Vec<Option<Word>>,
    args: Vec<Word>,
}

/// Cells of one global, allocated on first store; unwritten cells read 0
struct GlobalCells {
    len: usize,
    cells: FxHashMap<usize, i32>,
}

impl GlobalCells {
    fn new(kind: &GlobalKind) -> Self {
        match kind {
            GlobalKind::Int(value) => GlobalCells {
                len: 1,
                cells: std::iter::once((0, *value)).collect(),
            },
            GlobalKind::IntArray(len) => GlobalCells {
                len: *len,
                cells: FxHashMap::default(),
            },
            // bytes and a terminating 0
            GlobalKind::Bytes(text) => GlobalCells {
                len: text.len() + 1,
                cells: text.bytes().map(i32::from).enumerate().collect(),
            },
        }
    }

    fn get(&self, index: usize) -> i32 {
        self.cells.get(&index).copied().unwrap_or(0)
    }
}

pub struct Machine<'m> {
    module: &'m Module,
    limits: ExecLimits,
    globals: Vec<GlobalCells>,
    stack: Vec<i32>,
    console: Console,
    steps: u64,
    depth: usize,
}

impl<'m> Machine<'m> {
    pub fn new(module: &'m Module, limits: ExecLimits, console: Console) -> Self {
        let globals = module
            .globals
            .iter()
            .map(|global| GlobalCells::new(&global.kind))
            .collect();
        Machine {
            module,
            limits,
            globals,
            stack: Vec::new(),
            console,
            steps: 0,
            depth: 0,
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn into_console(self) -> Console {
        self.console
    }

    /// Instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Call `main` and return its result.
    pub fn run(&mut self) -> Result<i32, ExecError> {
        self.run_function(crate::codegen::constants::MAIN_FUNCTION)
    }

    pub fn run_function(&mut self, name: &str) -> Result<i32, ExecError> {
        let func = self
            .module
            .function_by_name(name)
            .ok_or_else(|| ExecError::NoEntry {
                name: name.to_string(),
            })?;
        debug!("running {}", name);
        match self.call(func, Vec::new())? {
            Some(Word::Int(value)) => Ok(value),
            Some(Word::Ptr(_)) => Err(ExecError::InvalidPointer {
                function: name.to_string(),
            }),
            None => Ok(0),
        }
    }

    fn call(&mut self, func: FuncId, args: Vec<Word>) -> Result<Option<Word>, ExecError> {
        let module = self.module;
        let function = module.function(func);
        if function.is_declaration() {
            return self.call_external(function, &args).map(Some);
        }

        if self.depth >= self.limits.max_call_depth {
            return Err(ExecError::CallDepth {
                limit: self.limits.max_call_depth,
            });
        }
        self.depth += 1;
        let stack_base = self.stack.len();
        trace!("enter {} at depth {}", function.name, self.depth);

        let mut frame = Frame {
            func,
            registers: vec![None; function.next_reg],
            args,
        };
        let result = self.execute(&mut frame);

        self.stack.truncate(stack_base);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, frame: &mut Frame) -> Result<Option<Word>, ExecError> {
        let module = self.module;
        let function = module.function(frame.func);
        let mut block = BlockId {
            func: frame.func,
            index: 0,
        };

        'blocks: loop {
            for inst in &module.block(block).instructions {
                self.steps += 1;
                if self.steps > self.limits.max_steps {
                    return Err(ExecError::StepLimit {
                        limit: self.limits.max_steps,
                    });
                }

                match inst {
                    Instruction::Binary { dest, op, lhs, rhs } => {
                        let lhs = Value::Int(self.int(frame, *lhs)?);
                        let rhs = Value::Int(self.int(frame, *rhs)?);
                        let result = fold_binary(*op, lhs, rhs)
                            .and_then(Value::as_int)
                            .ok_or_else(|| ExecError::DivisionByZero {
                                function: function.name.clone(),
                            })?;
                        frame.registers[dest.0] = Some(Word::Int(result));
                    }
                    Instruction::Compare {
                        dest,
                        pred,
                        lhs,
                        rhs,
                    } => {
                        let lhs = Value::Int(self.int(frame, *lhs)?);
                        let rhs = Value::Int(self.int(frame, *rhs)?);
                        let holds = fold_compare(*pred, lhs, rhs) == Some(Value::Bool(true));
                        frame.registers[dest.0] = Some(Word::Int(i32::from(holds)));
                    }
                    Instruction::Alloca { dest, .. } => {
                        self.stack.push(0);
                        let slot = Pointer::Stack(self.stack.len() - 1);
                        frame.registers[dest.0] = Some(Word::Ptr(slot));
                    }
                    Instruction::Load { dest, ptr } => {
                        let ptr = self.pointer(frame, *ptr)?;
                        let value = self.read(ptr, function)?;
                        frame.registers[dest.0] = Some(Word::Int(value));
                    }
                    Instruction::Store { value, ptr } => {
                        let value = self.int(frame, *value)?;
                        let ptr = self.pointer(frame, *ptr)?;
                        self.write(ptr, value, function)?;
                    }
                    Instruction::ElementPtr { dest, base, index } => {
                        let index = i64::from(self.int(frame, *index)?);
                        let element = match self.pointer(frame, *base)? {
                            Pointer::Global { id, offset } => Pointer::Global {
                                id,
                                offset: offset + index,
                            },
                            Pointer::Stack(_) => {
                                return Err(ExecError::InvalidPointer {
                                    function: function.name.clone(),
                                })
                            }
                        };
                        frame.registers[dest.0] = Some(Word::Ptr(element));
                    }
                    Instruction::Call { dest, callee, args } => {
                        let args = args
                            .iter()
                            .map(|arg| self.word(frame, *arg))
                            .collect::<Result<Vec<_>, _>>()?;
                        let result = self.call(*callee, args)?;
                        if let Some(dest) = dest {
                            let value = result.ok_or_else(|| ExecError::NoReturnValue {
                                function: module.function(*callee).name.clone(),
                            })?;
                            frame.registers[dest.0] = Some(value);
                        }
                    }
                    Instruction::Br { target } => {
                        block = *target;
                        continue 'blocks;
                    }
                    Instruction::CondBr {
                        cond,
                        then_block,
                        else_block,
                    } => {
                        block = if self.int(frame, *cond)? != 0 {
                            *then_block
                        } else {
                            *else_block
                        };
                        continue 'blocks;
                    }
                    Instruction::Ret { value } => {
                        return value.map(|value| self.word(frame, value)).transpose();
                    }
                }
            }

            return Err(ExecError::MissingTerminator {
                block: module.block(block).name.clone(),
                function: function.name.clone(),
            });
        }
    }

    // ===== Operands =====

    fn word(&self, frame: &Frame, value: Value) -> Result<Word, ExecError> {
        let function = &self.module.function(frame.func).name;
        match value {
            Value::Int(value) => Ok(Word::Int(value)),
            Value::Bool(value) => Ok(Word::Int(i32::from(value))),
            Value::Reg(reg) => frame
                .registers
                .get(reg.0)
                .copied()
                .flatten()
                .ok_or_else(|| ExecError::UndefinedRegister {
                    register: reg.0,
                    function: function.clone(),
                }),
            Value::Arg(index) => {
                frame
                    .args
                    .get(index)
                    .copied()
                    .ok_or_else(|| ExecError::InvalidPointer {
                        function: function.clone(),
                    })
            }
            Value::Global(id) => Ok(Word::Ptr(Pointer::Global { id, offset: 0 })),
        }
    }

    fn int(&self, frame: &Frame, value: Value) -> Result<i32, ExecError> {
        match self.word(frame, value)? {
            Word::Int(value) => Ok(value),
            Word::Ptr(_) => Err(ExecError::InvalidPointer {
                function: self.module.function(frame.func).name.clone(),
            }),
        }
    }

    fn pointer(&self, frame: &Frame, value: Value) -> Result<Pointer, ExecError> {
        match self.word(frame, value)? {
            Word::Ptr(ptr) => Ok(ptr),
            Word::Int(_) => Err(ExecError::InvalidPointer {
                function: self.module.function(frame.func).name.clone(),
            }),
        }
    }

    // ===== Memory =====

    fn cell(&self, ptr: Pointer, function: &Function) -> Result<(usize, usize), ExecError> {
        match ptr {
            Pointer::Global { id, offset } => {
                let len = self.globals[id.0].len;
                match usize::try_from(offset) {
                    Ok(index) if index < len => Ok((id.0, index)),
                    _ => Err(ExecError::OutOfBounds {
                        global: self.module.global(id).name.clone(),
                        offset,
                        function: function.name.clone(),
                    }),
                }
            }
            Pointer::Stack(_) => Err(ExecError::InvalidPointer {
                function: function.name.clone(),
            }),
        }
    }

    fn read(&self, ptr: Pointer, function: &Function) -> Result<i32, ExecError> {
        if let Pointer::Stack(slot) = ptr {
            return self
                .stack
                .get(slot)
                .copied()
                .ok_or_else(|| ExecError::InvalidPointer {
                    function: function.name.clone(),
                });
        }
        let (global, index) = self.cell(ptr, function)?;
        Ok(self.globals[global].get(index))
    }

    fn write(&mut self, ptr: Pointer, value: i32, function: &Function) -> Result<(), ExecError> {
        if let Pointer::Stack(slot) = ptr {
            let cell = self
                .stack
                .get_mut(slot)
                .ok_or_else(|| ExecError::InvalidPointer {
                    function: function.name.clone(),
                })?;
            *cell = value;
            return Ok(());
        }
        let (global, index) = self.cell(ptr, function)?;
        let declared = &self.module.globals[global];
        if declared.constant {
            return Err(ExecError::WriteToConstant {
                global: declared.name.clone(),
                function: function.name.clone(),
            });
        }
        self.globals[global].cells.insert(index, value);
        Ok(())
    }

    /// NUL-terminated string a pointer refers to
    fn string_at(&self, word: Word) -> Result<String, ExecError> {
        let Word::Ptr(Pointer::Global { id, offset }) = word else {
            return Err(ExecError::InvalidFormat {
                message: "string argument is not a global".to_string(),
            });
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let cells = &self.globals[id.0];
        let bytes: Vec<u8> = (start..cells.len)
            .map(|index| cells.get(index))
            .take_while(|&cell| cell != 0)
            .map(|cell| cell as u8)
            .collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // ===== External functions =====

    fn call_external(&mut self, function: &Function, args: &[Word]) -> Result<Word, ExecError> {
        let Some((&format, rest)) = args.split_first() else {
            return Err(ExecError::InvalidFormat {
                message: format!("{} called without a format", function.name),
            });
        };
        let format = self.string_at(format)?;

        match function.name.as_str() {
            "printf" => {
                let text = self.format_printf(&format, rest)?;
                self.console.print(&text);
                Ok(Word::Int(text.len() as i32))
            }
            "scanf" => self.scan(&format, rest, function),
            _ => Err(ExecError::MissingBody {
                name: function.name.clone(),
            }),
        }
    }

    fn format_printf(&self, format: &str, args: &[Word]) -> Result<String, ExecError> {
        let mut output = String::new();
        let mut args = args.iter();
        let mut chars = format.chars();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                output.push(ch);
                continue;
            }
            match chars.next() {
                Some('%') => output.push('%'),
                Some(spec @ ('d' | 's')) => {
                    let arg = *args.next().ok_or_else(|| ExecError::InvalidFormat {
                        message: "not enough arguments for format string".to_string(),
                    })?;
                    match (spec, arg) {
                        ('d', Word::Int(value)) => output.push_str(&value.to_string()),
                        ('s', ptr @ Word::Ptr(_)) => output.push_str(&self.string_at(ptr)?),
                        _ => {
                            return Err(ExecError::InvalidFormat {
                                message: format!("%{} does not accept {:?}", spec, arg),
                            })
                        }
                    }
                }
                other => {
                    return Err(ExecError::InvalidFormat {
                        message: format!("unsupported conversion %{}", other.unwrap_or(' ')),
                    })
                }
            }
        }
        Ok(output)
    }

    /// Reads one integer per `%d`; returns the count read, or -1 when input
    /// ran out before the first one.
    fn scan(&mut self, format: &str, args: &[Word], function: &Function) -> Result<Word, ExecError> {
        let conversions = format.matches("%d").count();
        let mut read = 0;
        for &arg in args.iter().take(conversions) {
            let Word::Ptr(ptr) = arg else {
                return Err(ExecError::InvalidPointer {
                    function: function.name.clone(),
                });
            };
            let Some(value) = self.console.read_int() else {
                warn!("scanf: end of input");
                return Ok(Word::Int(if read == 0 { -1 } else { read }));
            };
            self.write(ptr, value, function)?;
            read += 1;
        }
        Ok(Word::Int(read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, IntPredicate, IrBuilder, Linkage, ModuleBuilder};

    fn run(module: &Module, input: &[i32]) -> (Result<i32, ExecError>, Console) {
        let mut machine = Machine::new(
            module,
            ExecLimits::default(),
            Console::with_input(input.iter().copied()),
        );
        let result = machine.run();
        (result, machine.into_console())
    }

    /// `main` printing `count` down to 1 with a loop
    fn countdown(count: i32) -> Module {
        let mut builder = ModuleBuilder::new("test");
        let fmt = builder.add_global(".str", GlobalKind::Bytes("%d\n".into()), true, Linkage::Private);
        let printf = builder.declare_external("printf", 1, true, true);
        let main = builder.declare_function("main", 0, true);
        let entry = builder.append_block(main, "body");
        let cond = builder.append_block(main, "condblock");
        let body = builder.append_block(main, "loop");
        let after = builder.append_block(main, "afterloop");

        builder.set_insert_point(entry);
        let i = builder.alloca("i");
        builder.store(Value::Int(count), i);
        builder.br(cond);

        builder.set_insert_point(cond);
        let current = builder.load(i);
        let more = builder.compare(IntPredicate::Sge, current, Value::Int(1));
        builder.cond_br(more, body, after);

        builder.set_insert_point(body);
        let current = builder.load(i);
        builder.call(printf, vec![fmt, current]);
        let next = builder.binary(BinaryOp::Sub, current, Value::Int(1));
        builder.store(next, i);
        builder.br(cond);

        builder.set_insert_point(after);
        builder.ret(Some(Value::Int(0)));
        builder.finish()
    }

    #[test]
    fn test_loop_output() {
        let (result, console) = run(&countdown(3), &[]);
        assert_eq!(result, Ok(0));
        assert_eq!(console.lines(), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_step_limit() {
        let module = countdown(1_000_000);
        let mut machine = Machine::new(
            &module,
            ExecLimits {
                max_steps: 1000,
                max_call_depth: 10,
            },
            Console::new(),
        );
        assert_eq!(machine.run(), Err(ExecError::StepLimit { limit: 1000 }));
    }

    #[test]
    fn test_division_by_zero() {
        let mut builder = ModuleBuilder::new("test");
        let main = builder.declare_function("main", 0, true);
        let entry = builder.append_block(main, "body");
        builder.set_insert_point(entry);
        let x = builder.alloca("x");
        let zero = builder.load(x);
        let quotient = builder.binary(BinaryOp::SDiv, Value::Int(1), zero);
        builder.ret(Some(quotient));

        let (result, _) = run(&builder.finish(), &[]);
        assert!(matches!(result, Err(ExecError::DivisionByZero { .. })));
    }

    #[test]
    fn test_scanf_reads_input() {
        let mut builder = ModuleBuilder::new("test");
        let fmt = builder.add_global(".str", GlobalKind::Bytes("%d".into()), true, Linkage::Private);
        let scanf = builder.declare_external("scanf", 1, true, true);
        let main = builder.declare_function("main", 0, true);
        let entry = builder.append_block(main, "body");
        builder.set_insert_point(entry);
        let x = builder.alloca("x");
        builder.call(scanf, vec![fmt, x]);
        let status = builder.call(scanf, vec![fmt, x]);
        let value = builder.load(x);
        let sum = builder.binary(BinaryOp::Add, value, status.unwrap_or(Value::Int(0)));
        builder.ret(Some(sum));
        let module = builder.finish();

        // second read hits end of input: 41 + (-1)
        let (result, _) = run(&module, &[41]);
        assert_eq!(result, Ok(40));
    }

    #[test]
    fn test_array_out_of_bounds() {
        let mut builder = ModuleBuilder::new("test");
        let array = builder.add_global("a", GlobalKind::IntArray(2), false, Linkage::Common);
        let main = builder.declare_function("main", 0, true);
        let entry = builder.append_block(main, "body");
        builder.set_insert_point(entry);
        let element = builder.element_ptr(array, Value::Int(2));
        builder.store(Value::Int(1), element);
        builder.ret(Some(Value::Int(0)));

        let (result, _) = run(&builder.finish(), &[]);
        assert!(matches!(
            result,
            Err(ExecError::OutOfBounds { offset: 2, .. })
        ));
    }

    #[test]
    fn test_large_array_is_not_preallocated() {
        let mut builder = ModuleBuilder::new("test");
        let array = builder.add_global(
            "a",
            GlobalKind::IntArray(usize::MAX / 2),
            false,
            Linkage::Common,
        );
        let main = builder.declare_function("main", 0, true);
        let entry = builder.append_block(main, "body");
        builder.set_insert_point(entry);
        let last = builder.element_ptr(array, Value::Int(i32::MAX));
        builder.store(Value::Int(7), last);
        let stored = builder.load(last);
        let first = builder.element_ptr(array, Value::Int(0));
        let untouched = builder.load(first);
        let sum = builder.binary(BinaryOp::Add, stored, untouched);
        builder.ret(Some(sum));

        let (result, _) = run(&builder.finish(), &[]);
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_recursion_depth() {
        let mut builder = ModuleBuilder::new("test");
        let main = builder.declare_function("main", 0, true);
        let entry = builder.append_block(main, "body");
        builder.set_insert_point(entry);
        let result = builder.call(main, Vec::new());
        builder.ret(result);

        let module = builder.finish();
        let limits = ExecLimits {
            max_steps: 1_000_000,
            max_call_depth: 50,
        };
        let mut machine = Machine::new(&module, limits, Console::new());
        assert_eq!(machine.run(), Err(ExecError::CallDepth { limit: 50 }));
    }
}
