//! IR chunks and whole-program containers

use super::instruction::{IrExpr, IrStmt};
use crate::frame::{DataChunk, Frame};
use serde::Serialize;

/// Tree IR of one function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeChunk {
    /// Activation-record layout of the function
    pub frame: Frame,
    /// Body; stores the result into `Temp::RV`
    pub body: IrStmt,
}

/// Tree IR of a whole program
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrProgram {
    /// One chunk per function, nested functions before their enclosing one
    pub chunks: Vec<CodeChunk>,
    /// Static data
    pub globals: Vec<DataChunk>,
    /// Global initializers, run before the entry function
    pub init: CodeChunk,
    /// Label of the entry function
    pub entry: String,
}

/// Canonical IR of one function: a flat statement list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearChunk {
    /// Activation-record layout of the function
    pub frame: Frame,
    /// Statements in execution order, with labels as jump targets
    pub stmts: Vec<IrStmt>,
}

impl LinearChunk {
    /// True if every statement is primitive: no sequence, no nested
    /// statement, and calls only directly under `Move(Temp, _)` or `Eval`
    pub fn is_canonical(&self) -> bool {
        self.stmts.iter().all(is_canonical_stmt)
    }
}

/// Canonical IR of a whole program
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalProgram {
    /// One chunk per function, nested functions before their enclosing one
    pub chunks: Vec<LinearChunk>,
    /// Static data
    pub globals: Vec<DataChunk>,
    /// Global initializers, run before the entry function
    pub init: LinearChunk,
    /// Label of the entry function
    pub entry: String,
}

impl CanonicalProgram {
    /// Number of statements across all chunks
    pub fn statement_count(&self) -> usize {
        self.init.stmts.len() + self.chunks.iter().map(|c| c.stmts.len()).sum::<usize>()
    }
}

fn is_flat(e: &IrExpr) -> bool {
    !e.has_call() && !e.has_eseq()
}

fn is_call_with_flat_args(e: &IrExpr) -> bool {
    match e {
        IrExpr::Call { args, .. } => args.iter().all(is_flat),
        _ => false,
    }
}

fn is_canonical_stmt(stmt: &IrStmt) -> bool {
    match stmt {
        IrStmt::Move {
            dst: IrExpr::Temp(_),
            src,
        } => is_flat(src) || is_call_with_flat_args(src),
        IrStmt::Move {
            dst: IrExpr::Mem(address),
            src,
        } => is_flat(address) && is_flat(src),
        IrStmt::Move { .. } => false,
        IrStmt::Eval(e) => is_flat(e) || is_call_with_flat_args(e),
        IrStmt::CJump { cond, .. } => is_flat(cond),
        IrStmt::Jump(_) | IrStmt::Label(_) => true,
        IrStmt::Seq(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::Temp;

    #[test]
    fn test_nested_call_is_not_canonical() {
        let call = |args| IrExpr::Call {
            label: "f".into(),
            args,
        };
        let frame = Frame::new("f", 1, 0);

        let flat = LinearChunk {
            frame: frame.clone(),
            stmts: vec![IrStmt::mov(
                IrExpr::Temp(Temp(2)),
                call(vec![IrExpr::int(0)]),
            )],
        };
        assert!(flat.is_canonical());

        let nested = LinearChunk {
            frame,
            stmts: vec![IrStmt::Eval(call(vec![call(vec![IrExpr::int(0)])]))],
        };
        assert!(!nested.is_canonical());
    }
}
