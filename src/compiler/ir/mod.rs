//! # Intermediate Representation (IR) for PINS Compilation
//!
//! The checked syntax tree is lowered to a tree-shaped IR, one chunk per
//! function, which the canonicalizer then flattens into the statement lists
//! the interpreter executes.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── instruction.rs  # Temp, BinOp, IrExpr, IrStmt and effect analysis
//! ├── program.rs      # CodeChunk, IrProgram, LinearChunk, CanonicalProgram
//! ├── generator.rs    # IrGenerator (syntax tree → tree IR)
//! └── canon.rs        # Canonicalizer (tree IR → canonical IR)
//! ```
//!
//! ## Key Types
//!
//! - [`Temp`] - Per-activation temporary; `Temp::FP` reads the frame pointer
//! - [`IrExpr`] / [`IrStmt`] - Tree IR nodes
//! - [`IrGenerator`] - Lowers variables through their frame accesses
//! - [`Canonicalizer`] - Produces [`LinearChunk`]s with no nested effects

mod canon;
mod generator;
mod instruction;
mod program;

// Re-export all public types
pub use canon::{commute, Canonicalizer};
pub use generator::IrGenerator;
pub use instruction::{BinOp, IrExpr, IrStmt, Temp};
pub use program::{CanonicalProgram, CodeChunk, IrProgram, LinearChunk};
pub use crate::frame::DataChunk;
