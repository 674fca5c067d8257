//! Stage artifacts serialize to JSON for dump tooling

use pins::ast::{Ast, AstBuilder, BinaryOp, ParsedProgram};
use pins::compiler::{CanonicalProgram, IrProgram};
use pins::frame::FrameLayout;
use pins::names::Definitions;
use pins::runtime::Memory;
use pins::types::Types;
use pins::{CompileOptions, Compiler, ExecutionOutcome, StageObserver};
use serde_json::{json, Value as Json};

#[derive(Default)]
struct JsonDump {
    stages: Vec<(&'static str, Json)>,
}

impl JsonDump {
    fn record(&mut self, stage: &'static str, artifact: impl serde::Serialize) {
        let json = serde_json::to_value(artifact).expect("artifact serializes");
        self.stages.push((stage, json));
    }

    fn stage(&self, name: &str) -> &Json {
        self.stages
            .iter()
            .find(|(stage, _)| *stage == name)
            .map(|(_, json)| json)
            .unwrap_or_else(|| panic!("stage {} was not dumped", name))
    }
}

impl StageObserver for JsonDump {
    fn on_syntax(&mut self, program: &ParsedProgram) {
        self.record("syntax", program);
    }

    fn on_names(&mut self, _ast: &Ast, definitions: &Definitions) {
        self.record("names", definitions);
    }

    fn on_types(&mut self, _ast: &Ast, types: &Types) {
        self.record("types", types);
    }

    fn on_frames(&mut self, layout: &FrameLayout) {
        self.record("frames", layout);
    }

    fn on_tree_ir(&mut self, program: &IrProgram) {
        self.record("tree_ir", program);
    }

    fn on_canonical_ir(&mut self, program: &CanonicalProgram) {
        self.record("canonical_ir", program);
    }

    fn on_execution(&mut self, outcome: &ExecutionOutcome, memory: &Memory) {
        self.record("execution", outcome);
        self.record("memory", memory);
    }
}

/// var g: integer = 3; fun main(): integer = g + 4
fn program() -> ParsedProgram {
    let mut b = AstBuilder::new();
    let tg = b.integer();
    let three = b.int(3);
    let g = b.var_init("g", tg, three);
    let g_ref = b.name("g");
    let four = b.int(4);
    let sum = b.binary(BinaryOp::Add, g_ref, four);
    let int = b.integer();
    let main = b.fun("main", vec![], int, sum);
    b.finish(vec![g, main]).into()
}

#[test]
fn test_every_stage_is_dumped_in_order() -> anyhow::Result<()> {
    let mut dump = JsonDump::default();
    let run = Compiler::new(CompileOptions::default()).execute_with(
        &program(),
        Vec::new(),
        &mut dump,
    )?;
    assert_eq!(run.outcome.value, pins::Value::Int(7));

    let order: Vec<&str> = dump.stages.iter().map(|(stage, _)| *stage).collect();
    assert_eq!(
        order,
        [
            "syntax",
            "names",
            "types",
            "frames",
            "tree_ir",
            "canonical_ir",
            "execution",
            "memory"
        ]
    );
    Ok(())
}

#[test]
fn test_layout_and_ir_dumps_name_their_labels() -> anyhow::Result<()> {
    let mut dump = JsonDump::default();
    Compiler::new(CompileOptions::default()).execute_with(&program(), Vec::new(), &mut dump)?;

    let frames = dump.stage("frames");
    assert_eq!(frames["globals"][0]["label"], json!("g"));
    assert_eq!(frames["init"]["label"], json!(".init"));

    let canonical = dump.stage("canonical_ir");
    assert_eq!(canonical["entry"], json!("main"));
    assert_eq!(canonical["chunks"][0]["frame"]["label"], json!("main"));
    let stmts = canonical["chunks"][0]["stmts"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("stmts is not a list"))?;
    assert!(!stmts.is_empty());

    assert_eq!(dump.stage("execution")["value"], json!({ "Int": 7 }));
    Ok(())
}

#[test]
fn test_dump_stops_with_the_compiler() -> anyhow::Result<()> {
    let mut dump = JsonDump::default();
    let compiler = Compiler::new(CompileOptions::default().with_stop_after(pins::Phase::Types));
    compiler.compile_with(&program(), &mut dump)?;

    assert_eq!(dump.stages.len(), 3);
    assert!(dump.stage("types").is_object());
    Ok(())
}
