//! Property tests: the canonical IR behaves exactly like the tree IR
//!
//! Random integer programs are compiled once, then run by both the tree
//! evaluator and the canonical interpreter. Results, output and final memory
//! must agree, and every canonical chunk must be a fixed point of the
//! canonicalizer.

use pins::ast::{AstBuilder, BinaryOp, NodeId, ParsedProgram, UnaryOp};
use pins::compiler::Canonicalizer;
use pins::runtime::{Interpreter, TreeEvaluator};
use pins::{CompileOptions, Compilation, Compiler};
use proptest::prelude::*;

const MEMORY_WORDS: usize = 4096;
const GLOBALS: [&str; 3] = ["g0", "g1", "g2"];
const COUNTERS: [&str; 4] = ["c0", "c1", "c2", "c3"];

// =============================================================================
// PROGRAM SHAPES
// =============================================================================

#[derive(Debug, Clone)]
enum Expr {
    Lit(i64),
    Global(usize),
    Element(Box<Expr>),
    Neg(Box<Expr>),
    Arith(BinaryOp, Box<Expr>, Box<Expr>),
    SetGlobal(usize, Box<Expr>),
    Store(Box<Expr>, Box<Expr>),
    Print(Box<Expr>),
    /// f(e): bumps g1 as a side effect
    Bump(Box<Expr>),
    /// h(e1, e2)
    Pair(Box<Expr>, Box<Expr>),
    /// fact(e % 8)
    Fact(Box<Expr>),
    /// k(e): nested function updating an enclosing local
    Nested(Box<Expr>),
    If(Box<Cond>, Box<Expr>, Box<Expr>),
    Block(Vec<Expr>),
}

#[derive(Debug, Clone)]
enum Cond {
    Lit(bool),
    Compare(BinaryOp, Expr, Expr),
    Not(Box<Cond>),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
}

#[derive(Debug, Clone)]
struct Program {
    inits: [i64; 3],
    loops: Vec<(i64, Expr)>,
    result: Expr,
}

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

fn arith_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Add),
        Just(BinaryOp::Sub),
        Just(BinaryOp::Mul),
        Just(BinaryOp::Div),
        Just(BinaryOp::Mod),
    ]
}

fn compare_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Eq),
        Just(BinaryOp::Neq),
        Just(BinaryOp::Lt),
        Just(BinaryOp::Gt),
        Just(BinaryOp::Leq),
        Just(BinaryOp::Geq),
    ]
}

fn cond(expr: BoxedStrategy<Expr>) -> impl Strategy<Value = Cond> {
    let simple = prop_oneof![
        any::<bool>().prop_map(Cond::Lit),
        (compare_op(), expr.clone(), expr).prop_map(|(op, l, r)| Cond::Compare(op, l, r)),
    ];
    simple.prop_recursive(2, 6, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|c| Cond::Not(Box::new(c))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Cond::And(Box::new(l), Box::new(r))),
            (inner.clone(), inner).prop_map(|(l, r)| Cond::Or(Box::new(l), Box::new(r))),
        ]
    })
}

fn expr() -> BoxedStrategy<Expr> {
    let leaf = prop_oneof![
        (-20i64..20).prop_map(Expr::Lit),
        (0..GLOBALS.len()).prop_map(Expr::Global),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        let data = prop_oneof![
            inner.clone().prop_map(|i| Expr::Element(Box::new(i))),
            inner.clone().prop_map(|e| Expr::Neg(Box::new(e))),
            (arith_op(), inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| Expr::Arith(op, Box::new(l), Box::new(r))),
            (0..GLOBALS.len(), inner.clone())
                .prop_map(|(g, e)| Expr::SetGlobal(g, Box::new(e))),
            (0i64..4, inner.clone())
                .prop_map(|(i, v)| Expr::Store(Box::new(Expr::Lit(i)), Box::new(v))),
            (inner.clone(), inner.clone())
                .prop_map(|(i, v)| Expr::Store(Box::new(i), Box::new(v))),
        ];
        let control = prop_oneof![
            inner.clone().prop_map(|e| Expr::Print(Box::new(e))),
            inner.clone().prop_map(|e| Expr::Bump(Box::new(e))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::Pair(Box::new(l), Box::new(r))),
            inner.clone().prop_map(|e| Expr::Fact(Box::new(e))),
            inner.clone().prop_map(|e| Expr::Nested(Box::new(e))),
            (cond(inner.clone()), inner.clone(), inner.clone())
                .prop_map(|(c, t, e)| Expr::If(Box::new(c), Box::new(t), Box::new(e))),
            prop::collection::vec(inner, 1..4).prop_map(Expr::Block),
        ];
        prop_oneof![data, control]
    })
    .boxed()
}

fn program() -> impl Strategy<Value = Program> {
    (
        prop::array::uniform3(-10i64..10),
        prop::collection::vec((0i64..4, expr()), 0..=COUNTERS.len()),
        expr(),
    )
        .prop_map(|(inits, loops, result)| Program {
            inits,
            loops,
            result,
        })
}

// =============================================================================
// LOWERING
// =============================================================================

fn lower(b: &mut AstBuilder, e: &Expr) -> NodeId {
    match e {
        Expr::Lit(n) => b.int(*n),
        Expr::Global(g) => b.name(GLOBALS[*g]),
        Expr::Element(i) => {
            let base = b.name("a");
            let index = lower(b, i);
            b.index(base, index)
        }
        Expr::Neg(e) => {
            let operand = lower(b, e);
            b.unary(UnaryOp::Minus, operand)
        }
        Expr::Arith(op, l, r) => {
            let left = lower(b, l);
            let right = lower(b, r);
            b.binary(*op, left, right)
        }
        Expr::SetGlobal(g, e) => {
            let target = b.name(GLOBALS[*g]);
            let value = lower(b, e);
            b.assign(target, value)
        }
        Expr::Store(i, v) => {
            let base = b.name("a");
            let index = lower(b, i);
            let target = b.index(base, index);
            let value = lower(b, v);
            b.assign(target, value)
        }
        Expr::Print(e) => {
            let arg = lower(b, e);
            b.call("print_int", vec![arg])
        }
        Expr::Bump(e) => {
            let arg = lower(b, e);
            b.call("f", vec![arg])
        }
        Expr::Pair(l, r) => {
            let left = lower(b, l);
            let right = lower(b, r);
            b.call("h", vec![left, right])
        }
        Expr::Fact(e) => {
            let n = lower(b, e);
            let eight = b.int(8);
            let arg = b.binary(BinaryOp::Mod, n, eight);
            b.call("fact", vec![arg])
        }
        Expr::Nested(e) => {
            let arg = lower(b, e);
            b.call("k", vec![arg])
        }
        Expr::If(c, t, e) => {
            let condition = lower_cond(b, c);
            let then_branch = lower(b, t);
            let else_branch = lower(b, e);
            b.if_else(condition, then_branch, else_branch)
        }
        Expr::Block(es) => {
            let exprs = es.iter().map(|e| lower(b, e)).collect();
            b.block(exprs)
        }
    }
}

fn lower_cond(b: &mut AstBuilder, c: &Cond) -> NodeId {
    match c {
        Cond::Lit(v) => b.logical_lit(*v),
        Cond::Compare(op, l, r) => {
            let left = lower(b, l);
            let right = lower(b, r);
            b.binary(*op, left, right)
        }
        Cond::Not(c) => {
            let operand = lower_cond(b, c);
            b.unary(UnaryOp::Not, operand)
        }
        Cond::And(l, r) => {
            let left = lower_cond(b, l);
            let right = lower_cond(b, r);
            b.binary(BinaryOp::And, left, right)
        }
        Cond::Or(l, r) => {
            let left = lower_cond(b, l);
            let right = lower_cond(b, r);
            b.binary(BinaryOp::Or, left, right)
        }
    }
}

fn int_param(b: &mut AstBuilder, name: &str) -> NodeId {
    let ty = b.integer();
    b.param(name, ty)
}

/// fun f(p: integer): integer = ({g1 = g1 + p}; p * 2)
fn bump(b: &mut AstBuilder) -> NodeId {
    let p = int_param(b, "p");
    let target = b.name("g1");
    let g1 = b.name("g1");
    let p1 = b.name("p");
    let sum = b.binary(BinaryOp::Add, g1, p1);
    let update = b.assign(target, sum);
    let p2 = b.name("p");
    let two = b.int(2);
    let double = b.binary(BinaryOp::Mul, p2, two);
    let body = b.block(vec![update, double]);
    let int = b.integer();
    b.fun("f", vec![p], int, body)
}

/// fun h(p: integer, q: integer): integer = p - q * 3
fn pair(b: &mut AstBuilder) -> NodeId {
    let p = int_param(b, "p");
    let q = int_param(b, "q");
    let p_ref = b.name("p");
    let q_ref = b.name("q");
    let three = b.int(3);
    let scaled = b.binary(BinaryOp::Mul, q_ref, three);
    let body = b.binary(BinaryOp::Sub, p_ref, scaled);
    let int = b.integer();
    b.fun("h", vec![p, q], int, body)
}

/// fun fact(n: integer): integer = {if n <= 1 then 1 else n * fact(n - 1)}
fn fact(b: &mut AstBuilder) -> NodeId {
    let n = int_param(b, "n");
    let n1 = b.name("n");
    let one = b.int(1);
    let cond = b.binary(BinaryOp::Leq, n1, one);
    let base = b.int(1);
    let n2 = b.name("n");
    let n3 = b.name("n");
    let one = b.int(1);
    let pred = b.binary(BinaryOp::Sub, n3, one);
    let rec = b.call("fact", vec![pred]);
    let product = b.binary(BinaryOp::Mul, n2, rec);
    let body = b.if_else(cond, base, product);
    let int = b.integer();
    b.fun("fact", vec![n], int, body)
}

/// ```text
/// fun k(p: integer): integer = (inner(p); s) { where
///     var s: integer = 10
///     fun inner(q: integer): integer = {s = s + q} }
/// ```
fn nested(b: &mut AstBuilder) -> NodeId {
    let ts = b.integer();
    let ten = b.int(10);
    let s = b.var_init("s", ts, ten);

    let q = int_param(b, "q");
    let target = b.name("s");
    let s_ref = b.name("s");
    let q_ref = b.name("q");
    let sum = b.binary(BinaryOp::Add, s_ref, q_ref);
    let update = b.assign(target, sum);
    let t_inner = b.integer();
    let inner = b.fun("inner", vec![q], t_inner, update);

    let p = int_param(b, "p");
    let p_ref = b.name("p");
    let call = b.call("inner", vec![p_ref]);
    let s_ref = b.name("s");
    let body = b.block(vec![call, s_ref]);
    let scoped = b.scoped(vec![s, inner], body);
    let int = b.integer();
    b.fun("k", vec![p], int, scoped)
}

impl Program {
    fn build(&self) -> ParsedProgram {
        let mut b = AstBuilder::new();
        let mut defs = Vec::new();

        for (name, init) in GLOBALS.iter().zip(self.inits) {
            let ty = b.integer();
            let value = b.int(init);
            defs.push(b.var_init(name, ty, value));
        }
        let elem = b.integer();
        let ty = b.array(4, elem);
        defs.push(b.var("a", ty));
        for counter in COUNTERS {
            let ty = b.integer();
            defs.push(b.var(counter, ty));
        }
        defs.push(bump(&mut b));
        defs.push(pair(&mut b));
        defs.push(fact(&mut b));
        defs.push(nested(&mut b));

        let mut body = Vec::new();
        for (counter, (high, e)) in COUNTERS.iter().zip(&self.loops) {
            let counter = b.name(counter);
            let low = b.int(0);
            let high = b.int(*high);
            let step = b.int(1);
            let loop_body = lower(&mut b, e);
            body.push(b.for_loop(counter, low, high, step, loop_body));
        }
        body.push(lower(&mut b, &self.result));
        let block = b.block(body);
        let int = b.integer();
        defs.push(b.fun("main", vec![], int, block));

        b.finish(defs).into()
    }
}

fn compile(program: &Program) -> Result<Compilation, TestCaseError> {
    Compiler::new(CompileOptions::default())
        .compile(&program.build())
        .map_err(|e| TestCaseError::fail(format!("compilation failed: {}", e)))
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Both evaluators agree on result, output and final memory
    #[test]
    fn test_canonical_matches_tree(program in program()) {
        let compilation = compile(&program)?;
        let tree_ir = compilation.tree_ir.as_ref().ok_or_else(|| TestCaseError::fail("no tree IR"))?;
        let canonical = compilation
            .canonical_ir
            .as_ref()
            .ok_or_else(|| TestCaseError::fail("no canonical IR"))?;

        let mut tree = TreeEvaluator::new(tree_ir, MEMORY_WORDS, Vec::new());
        let tree_result = tree.run().map(|outcome| outcome.value);
        let mut interpreter = Interpreter::new(canonical, MEMORY_WORDS, Vec::new());
        let canonical_result = interpreter.run().map(|outcome| outcome.value);

        prop_assert_eq!(&tree_result, &canonical_result);
        prop_assert_eq!(
            String::from_utf8_lossy(tree.output()),
            String::from_utf8_lossy(interpreter.output())
        );
        if tree_result.is_ok() {
            prop_assert_eq!(tree.memory(), interpreter.memory());
        }
    }

    /// Canonical chunks are linear and canonicalizing them again changes nothing
    #[test]
    fn test_canonical_form_is_a_fixed_point(program in program()) {
        let compilation = compile(&program)?;
        let canonical = compilation
            .canonical_ir
            .as_ref()
            .ok_or_else(|| TestCaseError::fail("no canonical IR"))?;

        for chunk in canonical.chunks.iter().chain(std::iter::once(&canonical.init)) {
            prop_assert!(chunk.is_canonical(), "{} is not canonical", chunk.frame.label);
            let again = Canonicalizer::recanonicalize(chunk)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(&again, chunk);
        }
    }
}

#[test]
fn test_fixed_program_agrees() -> anyhow::Result<()> {
    // for c0 = 0, 3, 1: print_int(f(g1)); k(a[1] = h(g1, 2))
    let program = Program {
        inits: [1, 2, 3],
        loops: vec![(
            3,
            Expr::Print(Box::new(Expr::Bump(Box::new(Expr::Global(1))))),
        )],
        result: Expr::Nested(Box::new(Expr::Store(
            Box::new(Expr::Lit(1)),
            Box::new(Expr::Pair(
                Box::new(Expr::Global(1)),
                Box::new(Expr::Lit(2)),
            )),
        ))),
    };
    let parsed = program.build();
    let compiler = Compiler::new(CompileOptions::default());
    let canonical = compiler.execute(&parsed, Vec::new())?;
    let tree = compiler.execute_tree(&parsed, Vec::new())?;

    // g1 doubles 2 -> 4 -> 8 -> 16, each call printing the new value
    assert_eq!(String::from_utf8(canonical.output.clone())?, "4\n8\n16\n");
    // a[1] = h(16, 2) = 10, then k returns 10 + 10
    assert_eq!(canonical.outcome.value, pins::Value::Int(20));
    assert_eq!(tree.outcome.value, canonical.outcome.value);
    assert_eq!(tree.output, canonical.output);
    assert_eq!(tree.memory, canonical.memory);
    Ok(())
}
