//! Direct evaluator for tree IR
//!
//! Interprets [`IrProgram`] chunks recursively with the same memory model,
//! calling convention and built-ins as the canonical [`super::Interpreter`].
//! Jumps are resolved against the flattened sequence that contains their
//! target; a jump that leaves an expression or a chunk is an error.

use std::collections::HashMap;
use std::io::Write;

use super::{check_index, data_address, ExecutionOutcome, Host, Memory, Temps, Value};
use crate::builtins::Builtin;
use crate::compiler::ir::{CodeChunk, IrExpr, IrProgram, IrStmt, Temp};
use crate::error::{Error, Result, RuntimeError};
use crate::frame::{INIT_LABEL, WORD_SIZE};

type RunResult<T> = std::result::Result<T, RuntimeError>;

/// Control flow out of a statement
enum Flow<'p> {
    Next,
    Jump(&'p str),
}

/// Recursive tree-IR evaluator
pub struct TreeEvaluator<'p, W: Write> {
    program: &'p IrProgram,
    chunks: HashMap<&'p str, &'p CodeChunk>,
    memory: Memory,
    host: Host<W>,
    max_call_depth: usize,
    max_steps: Option<u64>,
    steps: u64,
    /// Labels of the live calls, innermost last
    calls: Vec<&'p str>,
}

impl<'p, W: Write> TreeEvaluator<'p, W> {
    /// Creates an evaluator with `memory_words` words of memory, writing
    /// program output to `out`
    pub fn new(program: &'p IrProgram, memory_words: usize, out: W) -> Self {
        let chunks = std::iter::once(&program.init)
            .chain(program.chunks.iter())
            .map(|c| (c.frame.label.as_str(), c))
            .collect();
        TreeEvaluator {
            program,
            chunks,
            memory: Memory::new(memory_words),
            host: Host::new(out),
            max_call_depth: 1024,
            max_steps: None,
            steps: 0,
            calls: Vec::new(),
        }
    }

    /// Fail with `StackOverflow` past this many nested calls
    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
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

    /// Consumes the evaluator, returning the output stream
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
        tracing::debug!(steps = self.steps, "tree evaluation finished");
        Ok(ExecutionOutcome {
            value,
            steps: self.steps,
        })
    }

    fn invoke(&mut self, label: &str) -> Result<Value> {
        let parameter_count = self
            .chunks
            .get(label)
            .map_or(0, |c| c.frame.parameter_count);
        let args = vec![Value::Int(0); parameter_count + 1];
        self.calls.clear();
        self.call(label, args).map_err(|e| {
            let function = self.calls.last().copied().unwrap_or(label);
            Error::runtime(function, e)
        })
    }

    fn call(&mut self, label: &str, args: Vec<Value>) -> RunResult<Value> {
        let Some(&chunk) = self.chunks.get(label) else {
            let builtin =
                Builtin::from_label(label).ok_or_else(|| RuntimeError::UnknownFunction {
                    label: label.to_string(),
                })?;
            return self.host.call(builtin, args.get(1..).unwrap_or_default());
        };

        let frame = &chunk.frame;
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
        if self.calls.len() >= self.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                stack_pointer: self.memory.sp(),
            });
        }

        let (saved_fp, saved_sp) = (self.memory.fp(), self.memory.sp());
        let fp = self.memory.push_frame(frame.size())?;
        for (i, value) in args.into_iter().enumerate() {
            self.memory.store(fp + WORD_SIZE * i as i64, value)?;
        }
        self.calls.push(frame.label.as_str());

        let mut temps = Temps::default();
        if let Flow::Jump(target) = self.exec(&chunk.body, &mut temps)? {
            return Err(RuntimeError::UndefinedLabel {
                label: target.to_string(),
            });
        }
        let value = temps.get(Temp::RV, &self.memory);

        self.calls.pop();
        self.memory.restore(saved_fp, saved_sp);
        Ok(value)
    }

    fn tick(&mut self) -> RunResult<()> {
        self.steps += 1;
        match self.max_steps {
            Some(max) if self.steps > max => Err(RuntimeError::Timeout { steps: max }),
            _ => Ok(()),
        }
    }

    fn exec(&mut self, stmt: &'p IrStmt, temps: &mut Temps) -> RunResult<Flow<'p>> {
        match stmt {
            IrStmt::Seq(stmts) => {
                let mut flat = Vec::with_capacity(stmts.len());
                flatten(stmts, &mut flat);
                self.exec_list(&flat, temps)
            }
            IrStmt::Label(_) => Ok(Flow::Next),
            IrStmt::Jump(label) => {
                self.tick()?;
                Ok(Flow::Jump(label))
            }
            IrStmt::CJump {
                cond,
                if_true,
                if_false,
            } => {
                self.tick()?;
                let cond = self.eval(cond, temps)?;
                Ok(Flow::Jump(if cond.is_truthy()? {
                    if_true.as_str()
                } else {
                    if_false.as_str()
                }))
            }
            IrStmt::Move { dst, src } => {
                self.tick()?;
                self.assign(dst, src, temps)
            }
            IrStmt::Eval(e) => {
                self.tick()?;
                self.eval(e, temps)?;
                Ok(Flow::Next)
            }
        }
    }

    fn exec_list(&mut self, stmts: &[&'p IrStmt], temps: &mut Temps) -> RunResult<Flow<'p>> {
        let mut pc = 0;
        while let Some(&stmt) = stmts.get(pc) {
            pc += 1;
            if let Flow::Jump(target) = self.exec(stmt, temps)? {
                match position_of(stmts, target) {
                    Some(index) => pc = index,
                    None => return Ok(Flow::Jump(target)),
                }
            }
        }
        Ok(Flow::Next)
    }

    /// `dst <- src`; a memory destination's address is evaluated first
    fn assign(&mut self, dst: &'p IrExpr, src: &'p IrExpr, temps: &mut Temps) -> RunResult<Flow<'p>> {
        match dst {
            IrExpr::Temp(t) => {
                let value = self.eval(src, temps)?;
                temps.set(*t, value)?;
                Ok(Flow::Next)
            }
            IrExpr::Mem(address) => {
                let address = self.eval(address, temps)?.as_int()?;
                let value = self.eval(src, temps)?;
                self.memory.store(address, value)?;
                Ok(Flow::Next)
            }
            IrExpr::Eseq { stmt, expr } => match self.exec(stmt, temps)? {
                Flow::Next => self.assign(expr, src, temps),
                jump => Ok(jump),
            },
            other => Err(RuntimeError::Malformed {
                message: format!("move into a non-location {:?}", other),
            }),
        }
    }

    fn eval(&mut self, e: &'p IrExpr, temps: &mut Temps) -> RunResult<Value> {
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
            IrExpr::CheckIndex { index, length } => {
                let index = self.eval(index, temps)?;
                check_index(&index, *length)
            }
            IrExpr::Call { label, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, temps)?);
                }
                self.call(label, values)
            }
            IrExpr::Eseq { stmt, expr } => match self.exec(stmt, temps)? {
                Flow::Next => self.eval(expr, temps),
                Flow::Jump(target) => Err(RuntimeError::UndefinedLabel {
                    label: target.to_string(),
                }),
            },
        }
    }
}

fn flatten<'p>(stmts: &'p [IrStmt], out: &mut Vec<&'p IrStmt>) {
    for stmt in stmts {
        match stmt {
            IrStmt::Seq(inner) => flatten(inner, out),
            other => out.push(other),
        }
    }
}

fn position_of(stmts: &[&IrStmt], target: &str) -> Option<usize> {
    stmts
        .iter()
        .position(|s| matches!(s, IrStmt::Label(l) if l == target))
}
