//! Host-side execution of built-in primitives

use std::io::Write;

use super::Value;
use crate::builtins::Builtin;
use crate::error::RuntimeError;

const DEFAULT_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Output stream and random-number state shared by one program run
#[derive(Debug)]
pub struct Host<W: Write> {
    out: W,
    state: u64,
}

impl<W: Write> Host<W> {
    /// Creates a host writing program output to `out`
    pub fn new(out: W) -> Self {
        Host {
            out,
            state: DEFAULT_SEED,
        }
    }

    /// Consumes the host, returning the output stream
    pub fn into_output(self) -> W {
        self.out
    }

    /// Output stream
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Execute `builtin` on its arguments (the static link already removed)
    pub fn call(&mut self, builtin: Builtin, args: &[Value]) -> Result<Value, RuntimeError> {
        let expected = builtin.params().len();
        if args.len() != expected {
            return Err(RuntimeError::Malformed {
                message: format!(
                    "`{}` takes {} argument(s), got {}",
                    builtin.name(),
                    expected,
                    args.len()
                ),
            });
        }
        tracing::trace!(builtin = builtin.name(), "host call");

        match builtin {
            Builtin::PrintInt => {
                let n = args[0].as_int()?;
                writeln!(self.out, "{}", n)?;
                Ok(Value::Int(n))
            }
            Builtin::PrintLog => {
                let b = args[0].is_truthy()?;
                writeln!(self.out, "{}", b)?;
                Ok(Value::logical(b))
            }
            Builtin::PrintStr => match &args[0] {
                Value::Str(s) => {
                    writeln!(self.out, "{}", s)?;
                    Ok(args[0].clone())
                }
                other => Err(RuntimeError::Malformed {
                    message: format!("print_str expects a string, found {}", other.type_name()),
                }),
            },
            Builtin::RandInt => {
                let (lo, hi) = (args[0].as_int()?, args[1].as_int()?);
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                let span = hi.wrapping_sub(lo) as u64;
                let r = self.next();
                let offset = match span.checked_add(1) {
                    Some(range) => r % range,
                    None => r,
                };
                Ok(Value::Int(lo.wrapping_add(offset as i64)))
            }
            Builtin::Seed => {
                let s = args[0].as_int()?;
                self.state = match (s as u64) ^ DEFAULT_SEED {
                    0 => DEFAULT_SEED,
                    state => state,
                };
                Ok(Value::Int(s))
            }
        }
    }

    /// xorshift64*
    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}
