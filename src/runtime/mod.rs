//! Runtime execution of PINS programs
//!
//! [`Interpreter`] runs canonical IR; [`TreeEvaluator`] runs tree IR directly.
//! Both share the [`Memory`] model, the calling convention and the built-in
//! [`Host`], so their observable effects can be compared.

mod host;
mod interpreter;
mod memory;
mod tree_eval;
mod value;

pub use host::Host;
pub use interpreter::Interpreter;
pub use memory::Memory;
pub use tree_eval::TreeEvaluator;
pub use value::Value;

use crate::compiler::ir::Temp;
use crate::error::RuntimeError;
use serde::Serialize;

/// Result of running a program to completion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    /// Value returned by the entry function
    pub value: Value,
    /// Statements (or tree nodes) executed
    pub steps: u64,
}

/// Temporaries of one activation
#[derive(Debug, Clone, Default)]
pub(crate) struct Temps(Vec<Value>);

impl Temps {
    /// Current value; `Temp::FP` reads the frame-pointer register
    pub(crate) fn get(&self, t: Temp, memory: &Memory) -> Value {
        if t == Temp::FP {
            return Value::Int(memory.fp());
        }
        self.0.get(t.0 as usize).cloned().unwrap_or_default()
    }

    pub(crate) fn set(&mut self, t: Temp, value: Value) -> Result<(), RuntimeError> {
        if t == Temp::FP {
            return Err(RuntimeError::Malformed {
                message: "the frame pointer is not writable".into(),
            });
        }
        let index = t.0 as usize;
        if index >= self.0.len() {
            self.0.resize(index + 1, Value::default());
        }
        self.0[index] = value;
        Ok(())
    }
}

/// Bounds check behind `IrExpr::CheckIndex`
pub(crate) fn check_index(index: &Value, length: i64) -> Result<Value, RuntimeError> {
    let i = index.as_int()?;
    if i < 0 || i >= length {
        return Err(RuntimeError::ArrayIndexOutOfBounds { index: i, length });
    }
    Ok(Value::Int(i))
}

/// Address of a static-data label
pub(crate) fn data_address(memory: &Memory, label: &str) -> Result<Value, RuntimeError> {
    memory
        .label_address(label)
        .map(Value::Int)
        .ok_or_else(|| RuntimeError::Malformed {
            message: format!("unknown data label `{}`", label),
        })
}
