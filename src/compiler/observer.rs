//! Per-stage hooks for dump and diagnostic tooling
//!
//! The compiler calls each hook right after its stage completes. The crate
//! does not format artifacts itself; every artifact implements
//! `serde::Serialize` so a tool can render it however it likes.

use crate::ast::{Ast, ParsedProgram};
use crate::compiler::ir::{CanonicalProgram, IrProgram};
use crate::frame::FrameLayout;
use crate::names::Definitions;
use crate::runtime::{ExecutionOutcome, Memory};
use crate::types::Types;

/// Receives the artifact of each compiler stage
pub trait StageObserver {
    /// Parser output, as handed to the back end
    fn on_syntax(&mut self, _program: &ParsedProgram) {}

    /// Definition-of entries
    fn on_names(&mut self, _ast: &Ast, _definitions: &Definitions) {}

    /// Type-of entries
    fn on_types(&mut self, _ast: &Ast, _types: &Types) {}

    /// Frames and accesses
    fn on_frames(&mut self, _layout: &FrameLayout) {}

    /// Tree IR, one chunk per function
    fn on_tree_ir(&mut self, _program: &IrProgram) {}

    /// Canonical IR, one chunk per function
    fn on_canonical_ir(&mut self, _program: &CanonicalProgram) {}

    /// Final memory and registers after a successful run
    fn on_execution(&mut self, _outcome: &ExecutionOutcome, _memory: &Memory) {}
}

/// Observer that ignores every stage
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}
