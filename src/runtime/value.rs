use std::cmp::Ordering;
use std::fmt;

use crate::compiler::ir::BinOp;
use crate::error::RuntimeError;
use serde::Serialize;

/// Contents of one memory word or temporary
///
/// Logical values are the integers 0 and 1; addresses are integers too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Value {
    /// 64-bit integer (wrapping arithmetic)
    Int(i64),
    /// String value
    Str(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl Value {
    /// Value of a logical constant
    pub fn logical(b: bool) -> Self {
        Value::Int(i64::from(b))
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
        }
    }

    /// Integer contents
    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Str(_) => Err(RuntimeError::Malformed {
                message: format!("expected integer, found {}", self.type_name()),
            }),
        }
    }

    /// Checks if the value is truthy (non-zero)
    pub fn is_truthy(&self) -> Result<bool, RuntimeError> {
        Ok(self.as_int()? != 0)
    }

    /// Applies a binary IR operator
    pub fn binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
        if op.is_comparison() {
            let ordering = match (left, right) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => {
                    return Err(RuntimeError::Malformed {
                        message: format!(
                            "cannot compare {} with {}",
                            left.type_name(),
                            right.type_name()
                        ),
                    })
                }
            };
            let result = match op {
                BinOp::Eq => ordering == Ordering::Equal,
                BinOp::Ne => ordering != Ordering::Equal,
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::Le => ordering != Ordering::Greater,
                BinOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::logical(result));
        }

        let a = left.as_int()?;
        let b = right.as_int()?;
        let n = match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div | BinOp::Mod if b == 0 => return Err(RuntimeError::DivisionByZero),
            BinOp::Div => a.wrapping_div(b),
            _ => a.wrapping_rem(b),
        };
        Ok(Value::Int(n))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
