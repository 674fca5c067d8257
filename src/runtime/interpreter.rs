//! Interpreter for canonical IR
//!
//! Each chunk is a flat statement list with precomputed label positions.
//! Calls push an [`Activation`] onto an explicit stack instead of recursing,
//! so deep interpreted recursion is bounded by interpreter memory only.

use std::collections::HashMap;
use std::io::Write;

use super::{check_index, data_address, ExecutionOutcome, Host, Memory, Temps, Value};
use crate::builtins::Builtin;
use crate::compiler::ir::{CanonicalProgram, IrExpr, IrStmt, LinearChunk, Temp};
use crate::error::{Error, Result, RuntimeError};
use crate::frame::{INIT_LABEL, WORD_SIZE};

type RunResult<T> = std::result::Result<T, RuntimeError>;

/// A chunk ready to execute
struct Code<'p> {
    chunk: &'p LinearChunk,
    labels: HashMap<&'p str, usize>,
}

/// One live call
struct Activation {
    code: usize,
    pc: usize,
    temps: Temps,
    /// Caller temporary receiving the result
    result: Option<Temp>,
    saved_fp: i64,
    saved_sp: i64,
}

/// Canonical-IR interpreter
pub struct Interpreter<'p, W: Write> {
    program: &'p CanonicalProgram,
    codes: Vec<Code<'p>>,
    by_label: HashMap<&'p str, usize>,
    memory: Memory,
    host: Host<W>,
    max_steps: Option<u64>,
    steps: u64,
}

impl<'p, W: Write> Interpreter<'p, W> {
    /// Creates an interpreter with `memory_words` words of memory, writing
    /// program output to `out`
    pub fn new(program: &'p CanonicalProgram, memory_words: usize, out: W) -> Self {
        let codes: Vec<Code<'p>> = std::iter::once(&program.init)
            .chain(program.chunks.iter())
            .map(|chunk| Code {
                chunk,
                labels: chunk
                    .stmts
                    .iter()
                    .enumerate()
                    .filter_map(|(i, s)| match s {
                        IrStmt::Label(l) => Some((l.as_str(), i)),
                        _ => None,
                    })
                    .collect(),
            })
            .collect();
        let by_label = codes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.chunk.frame.label.as_str(), i))
            .collect();

        Interpreter {
            program,
            codes,
            by_label,
            memory: Memory::new(memory_words),
            host: Host::new(out),
            max_steps: None,
            steps: 0,
        }
    }

    /// Abort with `Timeout` after `max_steps` statements
    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Memory and registers
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Program output written so far
    pub fn output(&self) -> &W {
        self.host.output()
    }

    /// Consumes the interpreter, returning the output stream
    pub fn into_output(self) -> W {
        self.host.into_output()
    }

    /// Allocate static data, run the global initializers, then the entry
    /// function
    pub fn run(&mut self) -> Result<ExecutionOutcome> {
        let program = self.program;
        for global in &program.globals {
            self.memory
                .allocate_static(&global.label, global.size)
                .map_err(|e| Error::runtime(INIT_LABEL, e))?;
        }
        self.invoke(INIT_LABEL)?;
        let value = self.invoke(&program.entry)?;
        tracing::debug!(steps = self.steps, "execution finished");
        Ok(ExecutionOutcome {
            value,
            steps: self.steps,
        })
    }

    /// Call a chunk with a zero static link and zeroed parameters
    fn invoke(&mut self, label: &str) -> Result<Value> {
        let Some(&index) = self.by_label.get(label) else {
            return Err(Error::runtime(
                label,
                RuntimeError::UnknownFunction {
                    label: label.to_string(),
                },
            ));
        };
        let args = vec![Value::Int(0); self.codes[index].chunk.frame.parameter_count + 1];
        let mut stack = Vec::new();
        self.call(&mut stack, label, args, None)
            .map_err(|e| Error::runtime(label, e))?;

        loop {
            match self.step(&mut stack) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => {
                    let function = stack
                        .last()
                        .map_or(label, |a| self.codes[a.code].chunk.frame.label.as_str());
                    return Err(Error::runtime(function, e));
                }
            }
        }
    }

    /// Execute one statement, or return from the current activation.
    /// Yields the result once the outermost activation returns.
    fn step(&mut self, stack: &mut Vec<Activation>) -> RunResult<Option<Value>> {
        let Some(act) = stack.last_mut() else {
            return Err(RuntimeError::Malformed {
                message: "no active call".into(),
            });
        };
        let chunk: &'p LinearChunk = self.codes[act.code].chunk;
        let Some(stmt) = chunk.stmts.get(act.pc) else {
            return self.leave(stack);
        };
        act.pc += 1;
        self.tick()?;

        match stmt {
            IrStmt::Move {
                dst: IrExpr::Temp(t),
                src: IrExpr::Call { label, args },
            } => {
                let args = self.eval_all(args, &act.temps)?;
                self.call(stack, label, args, Some(*t))?;
            }
            IrStmt::Eval(IrExpr::Call { label, args }) => {
                let args = self.eval_all(args, &act.temps)?;
                self.call(stack, label, args, None)?;
            }
            IrStmt::Move {
                dst: IrExpr::Temp(t),
                src,
            } => {
                let value = self.eval(src, &act.temps)?;
                act.temps.set(*t, value)?;
            }
            IrStmt::Move {
                dst: IrExpr::Mem(address),
                src,
            } => {
                let address = self.eval(address, &act.temps)?.as_int()?;
                let value = self.eval(src, &act.temps)?;
                self.memory.store(address, value)?;
            }
            IrStmt::Eval(e) => {
                self.eval(e, &act.temps)?;
            }
            IrStmt::Jump(label) => act.pc = self.target(act.code, label)?,
            IrStmt::CJump {
                cond,
                if_true,
                if_false,
            } => {
                let taken = if self.eval(cond, &act.temps)?.is_truthy()? {
                    if_true
                } else {
                    if_false
                };
                act.pc = self.target(act.code, taken)?;
            }
            IrStmt::Label(_) => {}
            IrStmt::Move { .. } | IrStmt::Seq(_) => {
                return Err(RuntimeError::Malformed {
                    message: format!("non-canonical statement {:?}", stmt),
                })
            }
        }
        Ok(None)
    }

    fn tick(&mut self) -> RunResult<()> {
        self.steps += 1;
        match self.max_steps {
            Some(max) if self.steps > max => Err(RuntimeError::Timeout { steps: max }),
            _ => Ok(()),
        }
    }

    fn target(&self, code: usize, label: &str) -> RunResult<usize> {
        self.codes[code]
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| RuntimeError::UndefinedLabel {
                label: label.to_string(),
            })
    }

    /// Enter a chunk, or run a built-in in place
    fn call(
        &mut self,
        stack: &mut Vec<Activation>,
        label: &str,
        args: Vec<Value>,
        result: Option<Temp>,
    ) -> RunResult<()> {
        if let Some(&code) = self.by_label.get(label) {
            let frame = &self.codes[code].chunk.frame;
            if args.len() != frame.parameter_count + 1 {
                return Err(RuntimeError::Malformed {
                    message: format!(
                        "`{}` called with {} argument word(s), expected {}",
                        label,
                        args.len(),
                        frame.parameter_count + 1
                    ),
                });
            }
            let (saved_fp, saved_sp) = (self.memory.fp(), self.memory.sp());
            let fp = self.memory.push_frame(frame.size())?;
            for (i, value) in args.into_iter().enumerate() {
                self.memory.store(fp + WORD_SIZE * i as i64, value)?;
            }
            tracing::trace!(label, fp, "enter");
            stack.push(Activation {
                code,
                pc: 0,
                temps: Temps::default(),
                result,
                saved_fp,
                saved_sp,
            });
            return Ok(());
        }

        let builtin = Builtin::from_label(label).ok_or_else(|| RuntimeError::UnknownFunction {
            label: label.to_string(),
        })?;
        let value = self.host.call(builtin, args.get(1..).unwrap_or_default())?;
        match (result, stack.last_mut()) {
            (Some(t), Some(caller)) => caller.temps.set(t, value),
            _ => Ok(()),
        }
    }

    /// Pop the current activation and hand its result to the caller
    fn leave(&mut self, stack: &mut Vec<Activation>) -> RunResult<Option<Value>> {
        let Some(done) = stack.pop() else {
            return Ok(None);
        };
        let value = done.temps.get(Temp::RV, &self.memory);
        self.memory.restore(done.saved_fp, done.saved_sp);
        match stack.last_mut() {
            None => Ok(Some(value)),
            Some(caller) => {
                if let Some(t) = done.result {
                    caller.temps.set(t, value)?;
                }
                Ok(None)
            }
        }
    }

    fn eval_all(&self, exprs: &[IrExpr], temps: &Temps) -> RunResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, temps)).collect()
    }

    fn eval(&self, e: &IrExpr, temps: &Temps) -> RunResult<Value> {
        match e {
            IrExpr::Const(v) => Ok(v.clone()),
            IrExpr::Name(label) => data_address(&self.memory, label),
            IrExpr::Temp(t) => Ok(temps.get(*t, &self.memory)),
            IrExpr::Mem(address) => {
                let address = self.eval(address, temps)?.as_int()?;
                self.memory.load(address)
            }
            IrExpr::Binop { op, left, right } => {
                let l = self.eval(left, temps)?;
                let r = self.eval(right, temps)?;
                Value::binop(*op, &l, &r)
            }
            IrExpr::CheckIndex { index, length } => check_index(&self.eval(index, temps)?, *length),
            IrExpr::Call { .. } | IrExpr::Eseq { .. } => Err(RuntimeError::Malformed {
                message: format!("non-canonical expression {:?}", e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::BinOp;
    use crate::frame::{DataChunk, Frame};

    fn chunk(label: &str, parameter_count: usize, stmts: Vec<IrStmt>) -> LinearChunk {
        let mut frame = Frame::new(label, 1, parameter_count);
        frame.locals_size = WORD_SIZE;
        LinearChunk { frame, stmts }
    }

    fn program(chunks: Vec<LinearChunk>) -> CanonicalProgram {
        CanonicalProgram {
            chunks,
            globals: vec![DataChunk {
                label: "g".into(),
                size: WORD_SIZE,
            }],
            init: chunk(
                INIT_LABEL,
                0,
                vec![IrStmt::mov(
                    IrExpr::mem(IrExpr::Name("g".into())),
                    IrExpr::int(40),
                )],
            ),
            entry: "main".into(),
        }
    }

    fn rv() -> IrExpr {
        IrExpr::Temp(Temp::RV)
    }

    #[test]
    fn test_call_passes_arguments_through_the_frame() {
        // add1(x) = x + 1; main = add1(g) + 1
        let param = IrExpr::mem(IrExpr::binop(
            BinOp::Add,
            IrExpr::Temp(Temp::FP),
            IrExpr::int(Frame::parameter_offset(0)),
        ));
        let add1 = chunk(
            "add1",
            1,
            vec![IrStmt::mov(rv(), IrExpr::binop(BinOp::Add, param, IrExpr::int(1)))],
        );
        let main = chunk(
            "main",
            0,
            vec![
                IrStmt::mov(
                    IrExpr::Temp(Temp(2)),
                    IrExpr::Call {
                        label: "add1".into(),
                        args: vec![IrExpr::int(0), IrExpr::mem(IrExpr::Name("g".into()))],
                    },
                ),
                IrStmt::mov(rv(), IrExpr::binop(BinOp::Add, IrExpr::Temp(Temp(2)), IrExpr::int(1))),
            ],
        );
        let program = program(vec![add1, main]);
        let mut interpreter = Interpreter::new(&program, 64, Vec::new());
        let outcome = interpreter.run().unwrap();
        assert_eq!(outcome.value, Value::Int(42));
        assert_eq!(interpreter.memory().sp(), 64 * WORD_SIZE);
    }

    #[test]
    fn test_loop_with_jumps_and_builtin() {
        // t2 = 0; loop: if t2 < 3 { print_int(t2); t2 += 1; goto loop }
        let t2 = || IrExpr::Temp(Temp(2));
        let main = chunk(
            "main",
            0,
            vec![
                IrStmt::mov(t2(), IrExpr::int(0)),
                IrStmt::Label("test".into()),
                IrStmt::cjump(IrExpr::binop(BinOp::Lt, t2(), IrExpr::int(3)), "body", "exit"),
                IrStmt::Label("body".into()),
                IrStmt::Eval(IrExpr::Call {
                    label: "print_int".into(),
                    args: vec![IrExpr::int(0), t2()],
                }),
                IrStmt::mov(t2(), IrExpr::binop(BinOp::Add, t2(), IrExpr::int(1))),
                IrStmt::Jump("test".into()),
                IrStmt::Label("exit".into()),
            ],
        );
        let program = program(vec![main]);
        let mut interpreter = Interpreter::new(&program, 64, Vec::new());
        interpreter.run().unwrap();
        assert_eq!(
            String::from_utf8(interpreter.into_output()).unwrap(),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_step_budget() {
        let main = chunk(
            "main",
            0,
            vec![IrStmt::Label("spin".into()), IrStmt::Jump("spin".into())],
        );
        let program = program(vec![main]);
        let mut interpreter =
            Interpreter::new(&program, 64, std::io::sink()).with_max_steps(Some(100));
        let err = interpreter.run().unwrap_err();
        assert_eq!(
            err.runtime_error(),
            Some(&RuntimeError::Timeout { steps: 100 })
        );
    }

    #[test]
    fn test_missing_entry_and_unbounded_recursion() {
        let empty = program(Vec::new());
        let err = Interpreter::new(&empty, 64, std::io::sink())
            .run()
            .unwrap_err();
        assert!(matches!(
            err.runtime_error(),
            Some(RuntimeError::UnknownFunction { .. })
        ));

        let main = chunk(
            "main",
            0,
            vec![IrStmt::Eval(IrExpr::Call {
                label: "main".into(),
                args: vec![IrExpr::int(0)],
            })],
        );
        let recursive = program(vec![main]);
        let err = Interpreter::new(&recursive, 64, std::io::sink())
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Runtime {
                error: RuntimeError::StackOverflow { .. },
                ..
            }
        ));
    }
}
