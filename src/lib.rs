//! # PINS - Compiler Back End and IR Interpreter
//!
//! Semantic analysis, intermediate code generation and execution for PINS, a
//! small statically typed, lexically scoped language with nested functions,
//! fixed-size arrays and a handful of built-in primitives.
//!
//! ## Quick Start
//!
//! A parser (or a test) builds the syntax tree with [`ast::AstBuilder`]; the
//! [`Compiler`] takes it from there:
//!
//! ```rust
//! use pins::ast::{AstBuilder, BinaryOp, ParsedProgram};
//! use pins::{CompileOptions, Compiler, Value};
//!
//! # fn main() -> pins::Result<()> {
//! // fun main(): integer = print_int(6 * 7)
//! let mut b = AstBuilder::new();
//! let integer = b.integer();
//! let six = b.int(6);
//! let seven = b.int(7);
//! let product = b.binary(BinaryOp::Mul, six, seven);
//! let body = b.call("print_int", vec![product]);
//! let main = b.fun("main", vec![], integer, body);
//! let parsed = ParsedProgram::from(b.finish(vec![main]));
//!
//! let run = Compiler::new(CompileOptions::default()).execute(&parsed, Vec::new())?;
//! assert_eq!(run.outcome.value, Value::Int(42));
//! assert_eq!(run.output, b"42\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ParsedProgram → NameResolver → TypeChecker → FrameEvaluator
//!               → IrGenerator → Canonicalizer → Interpreter
//! ```
//!
//! Each pass fills a write-once side-table keyed by [`ast::NodeId`]:
//!
//! - [`names`] - Definition-of: which declaration each name denotes
//! - [`types`] - Type-of for every expression and declaration
//! - [`frame`] - Frame-of for functions, Access-of for variables
//! - [`compiler::ir`] - Tree IR and its canonical, flattened form
//! - [`runtime`] - Canonical-IR interpreter and a tree-IR evaluator
//!
//! Name and type errors accumulate into [`error::Diagnostics`]; runtime
//! faults abort with [`error::RuntimeError`].

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod error;
pub mod frame;
pub mod names;
pub mod runtime;
pub mod table;
pub mod types;

/// Version of the PINS back end
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types
pub use compiler::{CompileOptions, Compilation, Compiler, Execution, Phase, StageObserver};
pub use error::{Error, Result};
pub use runtime::{ExecutionOutcome, Interpreter, TreeEvaluator, Value};
pub use types::Type;
