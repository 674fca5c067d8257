//! # PINS Compiler - Syntax Tree to Executable IR
//!
//! Drives the back end over a parsed program:
//!
//! ## Architecture
//!
//! ```text
//! ParsedProgram → Names → Types → Frames → Tree IR → Canonical IR → Interpreter
//! ```
//!
//! Name and type errors are accumulated and reported together; no IR is
//! generated for a program with diagnostics. A [`StageObserver`] sees each
//! stage's artifact as soon as it exists.
//!
//! ## Usage
//!
//! ```ignore
//! use pins::compiler::{CompileOptions, Compiler};
//!
//! let compiler = Compiler::new(CompileOptions::default());
//! let run = compiler.execute(&parsed, std::io::stdout())?;
//! println!("main returned {}", run.outcome.value);
//! ```

pub mod ir;
mod observer;

pub use ir::{Canonicalizer, CanonicalProgram, IrGenerator, IrProgram};
pub use observer::{NoopObserver, StageObserver};

use std::io::Write;

use crate::ast::ParsedProgram;
use crate::error::{Diagnostic, Diagnostics, Error, Result};
use crate::frame::{FrameEvaluator, FrameLayout};
use crate::names::{Definitions, NameResolver};
use crate::runtime::{ExecutionOutcome, Interpreter, Memory, TreeEvaluator};
use crate::types::{TypeChecker, Types};

/// Last stage to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Phase {
    /// Only report the parser's diagnostics
    Syntax,
    /// Name resolution
    Names,
    /// Type checking
    Types,
    /// Frame and access evaluation
    Frames,
    /// Tree IR generation
    Ir,
    /// Canonicalization
    Canonical,
    /// Full execution
    #[default]
    Execute,
}

/// Compilation options
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Interpreter memory capacity in words
    pub memory_words: usize,
    /// Stop after this stage
    pub stop_after: Phase,
    /// Name of the top-level function that starts execution
    pub entry: String,
    /// Abort execution with `Timeout` after this many steps
    pub max_steps: Option<u64>,
    /// Host recursion limit of the tree evaluator
    pub max_call_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            memory_words: 65_536,
            stop_after: Phase::Execute,
            entry: "main".to_string(),
            max_steps: None,
            max_call_depth: 1024,
        }
    }
}

impl CompileOptions {
    /// Set the interpreter memory capacity
    pub fn with_memory_words(mut self, memory_words: usize) -> Self {
        self.memory_words = memory_words;
        self
    }

    /// Stop after `phase`
    pub fn with_stop_after(mut self, phase: Phase) -> Self {
        self.stop_after = phase;
        self
    }

    /// Set the entry function
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Set the execution step budget
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Set the tree evaluator's recursion limit
    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }
}

/// Artifacts of the stages that ran
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    /// Definition-of entries
    pub definitions: Option<Definitions>,
    /// Type-of entries
    pub types: Option<Types>,
    /// Frames and accesses
    pub layout: Option<FrameLayout>,
    /// Tree IR
    pub tree_ir: Option<IrProgram>,
    /// Canonical IR
    pub canonical_ir: Option<CanonicalProgram>,
}

/// A finished run
#[derive(Debug)]
pub struct Execution<W> {
    /// Compile-time artifacts
    pub compilation: Compilation,
    /// Entry result and step count
    pub outcome: ExecutionOutcome,
    /// Final memory and registers
    pub memory: Memory,
    /// Program output stream
    pub output: W,
}

/// PINS back end
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Compilation options
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Run every stage up to `stop_after` (at most canonicalization)
    pub fn compile(&self, parsed: &ParsedProgram) -> Result<Compilation> {
        self.compile_with(parsed, &mut NoopObserver)
    }

    /// Like [`Compiler::compile`], reporting each stage to `observer`
    pub fn compile_with<O: StageObserver>(
        &self,
        parsed: &ParsedProgram,
        observer: &mut O,
    ) -> Result<Compilation> {
        let stop = self.options.stop_after;
        let ast = &parsed.ast;
        let mut compilation = Compilation::default();
        let mut diagnostics = Diagnostics(
            parsed
                .diagnostics
                .iter()
                .cloned()
                .map(Diagnostic::Syntax)
                .collect(),
        );

        // Phase 1: Parser output
        observer.on_syntax(parsed);
        tracing::debug!(
            nodes = ast.len(),
            errors = diagnostics.len(),
            "syntax tree received"
        );
        if stop == Phase::Syntax {
            return finish(compilation, diagnostics);
        }

        // Phase 2: Name resolution
        let names = NameResolver::new(ast).resolve();
        observer.on_names(ast, &names.definitions);
        tracing::debug!(
            bindings = names.definitions.len(),
            errors = names.errors.len(),
            "names resolved"
        );
        diagnostics
            .0
            .extend(names.errors.into_iter().map(Diagnostic::Name));
        let definitions = compilation.definitions.insert(names.definitions);
        if stop == Phase::Names {
            return finish(compilation, diagnostics);
        }

        // Phase 3: Type checking (runs even after name errors)
        let checked = TypeChecker::new(ast, definitions).check();
        observer.on_types(ast, &checked.types);
        tracing::debug!(
            typed = checked.types.len(),
            errors = checked.errors.len(),
            "types checked"
        );
        diagnostics
            .0
            .extend(checked.errors.into_iter().map(Diagnostic::Type));
        let types = checked.types;
        if !diagnostics.is_empty() || stop == Phase::Types {
            compilation.types = Some(types);
            return finish(compilation, diagnostics);
        }

        // Phase 4: Frames and accesses
        let layout = FrameEvaluator::new(ast, definitions, &types).evaluate()?;
        observer.on_frames(&layout);
        tracing::debug!(
            frames = layout.frames.len(),
            globals = layout.globals.len(),
            "frames evaluated"
        );
        if stop == Phase::Frames {
            compilation.types = Some(types);
            compilation.layout = Some(layout);
            return Ok(compilation);
        }

        // Phase 5: Tree IR
        let tree =
            IrGenerator::new(ast, definitions, &types, &layout, self.options.entry.as_str())
                .generate()?;
        observer.on_tree_ir(&tree);
        compilation.types = Some(types);
        compilation.layout = Some(layout);
        if stop == Phase::Ir {
            compilation.tree_ir = Some(tree);
            return Ok(compilation);
        }

        // Phase 6: Canonical IR
        let canonical = Canonicalizer::canonicalize_program(&tree)?;
        observer.on_canonical_ir(&canonical);
        compilation.tree_ir = Some(tree);
        compilation.canonical_ir = Some(canonical);
        Ok(compilation)
    }

    /// Compile and run the canonical IR, writing program output to `out`
    pub fn execute<W: Write>(&self, parsed: &ParsedProgram, out: W) -> Result<Execution<W>> {
        self.execute_with(parsed, out, &mut NoopObserver)
    }

    /// Like [`Compiler::execute`], reporting each stage to `observer`
    pub fn execute_with<W: Write, O: StageObserver>(
        &self,
        parsed: &ParsedProgram,
        out: W,
        observer: &mut O,
    ) -> Result<Execution<W>> {
        let compilation = self.compile_with(parsed, observer)?;
        let Some(program) = compilation.canonical_ir.as_ref() else {
            return Err(stopped_early());
        };

        let mut interpreter = Interpreter::new(program, self.options.memory_words, out)
            .with_max_steps(self.options.max_steps);
        let outcome = interpreter.run()?;
        observer.on_execution(&outcome, interpreter.memory());
        let memory = interpreter.memory().clone();
        let output = interpreter.into_output();

        Ok(Execution {
            compilation,
            outcome,
            memory,
            output,
        })
    }

    /// Compile and evaluate the tree IR directly, skipping canonicalization
    /// at run time. Observable effects match [`Compiler::execute`].
    pub fn execute_tree<W: Write>(&self, parsed: &ParsedProgram, out: W) -> Result<Execution<W>> {
        let compilation = self.compile(parsed)?;
        let Some(program) = compilation.tree_ir.as_ref() else {
            return Err(stopped_early());
        };

        let mut evaluator = TreeEvaluator::new(program, self.options.memory_words, out)
            .with_max_call_depth(self.options.max_call_depth)
            .with_max_steps(self.options.max_steps);
        let outcome = evaluator.run()?;
        let memory = evaluator.memory().clone();
        let output = evaluator.into_output();

        Ok(Execution {
            compilation,
            outcome,
            memory,
            output,
        })
    }
}

fn finish(compilation: Compilation, diagnostics: Diagnostics) -> Result<Compilation> {
    if diagnostics.is_empty() {
        Ok(compilation)
    } else {
        tracing::debug!(errors = diagnostics.len(), "compilation failed");
        Err(Error::Compile(diagnostics))
    }
}

fn stopped_early() -> Error {
    Error::Ir(crate::error::IrError::new(
        "execution requested but compilation stopped before producing IR",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, BinaryOp};
    use crate::runtime::Value;

    /// fun main(): integer = 6 * 7
    fn answer() -> ParsedProgram {
        let mut b = AstBuilder::new();
        let int = b.integer();
        let six = b.int(6);
        let seven = b.int(7);
        let body = b.binary(BinaryOp::Mul, six, seven);
        let main = b.fun("main", vec![], int, body);
        b.finish(vec![main]).into()
    }

    #[derive(Default)]
    struct Recorder(Vec<&'static str>);

    impl StageObserver for Recorder {
        fn on_syntax(&mut self, _: &ParsedProgram) {
            self.0.push("syntax");
        }
        fn on_names(&mut self, _: &crate::ast::Ast, _: &Definitions) {
            self.0.push("names");
        }
        fn on_types(&mut self, _: &crate::ast::Ast, _: &Types) {
            self.0.push("types");
        }
        fn on_frames(&mut self, _: &FrameLayout) {
            self.0.push("frames");
        }
        fn on_tree_ir(&mut self, _: &IrProgram) {
            self.0.push("tree");
        }
        fn on_canonical_ir(&mut self, _: &CanonicalProgram) {
            self.0.push("canonical");
        }
        fn on_execution(&mut self, _: &ExecutionOutcome, _: &Memory) {
            self.0.push("execution");
        }
    }

    #[test]
    fn test_every_stage_is_observed_in_order() {
        let compiler = Compiler::new(CompileOptions::default());
        let mut recorder = Recorder::default();
        let run = compiler
            .execute_with(&answer(), std::io::sink(), &mut recorder)
            .unwrap();
        assert_eq!(run.outcome.value, Value::Int(42));
        assert_eq!(
            recorder.0,
            ["syntax", "names", "types", "frames", "tree", "canonical", "execution"]
        );
    }

    #[test]
    fn test_stop_after_frames() {
        let compiler = Compiler::new(CompileOptions::default().with_stop_after(Phase::Frames));
        let compilation = compiler.compile(&answer()).unwrap();
        assert!(compilation.layout.is_some());
        assert!(compilation.tree_ir.is_none());
        assert!(compiler.execute(&answer(), std::io::sink()).is_err());
    }

    #[test]
    fn test_name_and_type_errors_are_reported_together() {
        // fun main(): integer = missing + "a"
        let mut b = AstBuilder::new();
        let int = b.integer();
        let missing = b.name("missing");
        let a = b.str("a");
        let body = b.binary(BinaryOp::Add, missing, a);
        let main = b.fun("main", vec![], int, body);
        let parsed: ParsedProgram = b.finish(vec![main]).into();

        let err = Compiler::new(CompileOptions::default())
            .compile(&parsed)
            .unwrap_err();
        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.name_errors().count(), 1);
        assert_eq!(diagnostics.type_errors().count(), 1);
    }
}
