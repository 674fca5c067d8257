//! Type checking over whole programs

use pins::ast::{Ast, AstBuilder, BinaryOp, ParsedProgram};
use pins::error::TypeError;
use pins::names::NameResolver;
use pins::types::{TypeCheck, TypeChecker};
use pins::{CompileOptions, Compiler, Phase, Type};

fn check(ast: &Ast) -> TypeCheck {
    let names = NameResolver::new(ast).resolve();
    assert!(names.errors.is_empty(), "{:?}", names.errors);
    TypeChecker::new(ast, &names.definitions).check()
}

#[test]
fn test_integer_plus_string() {
    // fun main(): integer = 1 + "a"
    let mut b = AstBuilder::new();
    let int = b.integer();
    let one = b.int(1);
    let a = b.str("a");
    let sum = b.binary(BinaryOp::Add, one, a);
    let main = b.fun("main", vec![], int, sum);
    let ast = b.finish(vec![main]);

    let checked = check(&ast);
    assert!(matches!(
        checked.errors.as_slice(),
        [TypeError::Mismatch {
            expected: Type::Integer,
            found: Type::String,
            ..
        }]
    ));
    assert_eq!(checked.types.get(sum), Some(&Type::Error));
}

#[test]
fn test_integer_condition() {
    // fun main(): integer = {if 1 then 2 else 3}
    let mut b = AstBuilder::new();
    let int = b.integer();
    let one = b.int(1);
    let two = b.int(2);
    let three = b.int(3);
    let cond = b.if_else(one, two, three);
    let main = b.fun("main", vec![], int, cond);
    let ast = b.finish(vec![main]);

    let checked = check(&ast);
    assert!(matches!(
        checked.errors.as_slice(),
        [TypeError::Mismatch {
            expected: Type::Logical,
            found: Type::Integer,
            ..
        }]
    ));
}

#[test]
fn test_assignment_is_an_expression() {
    // var x: integer; fun main(): integer = {x = 1} + 1
    let mut b = AstBuilder::new();
    let tx = b.integer();
    let x = b.var("x", tx);
    let target = b.name("x");
    let one = b.int(1);
    let assign = b.assign(target, one);
    let another = b.int(1);
    let sum = b.binary(BinaryOp::Add, assign, another);
    let int = b.integer();
    let main = b.fun("main", vec![], int, sum);
    let ast = b.finish(vec![x, main]);

    let checked = check(&ast);
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    assert_eq!(checked.types.get(assign), Some(&Type::Integer));
}

#[test]
fn test_aliases_are_compatible_with_their_target() {
    // typ num: integer; fun inc(n: num): integer = n + 1; fun main(): integer = inc(41)
    let mut b = AstBuilder::new();
    let target = b.integer();
    let num = b.typ("num", target);
    let num_ref = b.named("num");
    let n = b.param("n", num_ref);
    let n_ref = b.name("n");
    let one = b.int(1);
    let sum = b.binary(BinaryOp::Add, n_ref, one);
    let t_inc = b.integer();
    let inc = b.fun("inc", vec![n], t_inc, sum);
    let arg = b.int(41);
    let call = b.call("inc", vec![arg]);
    let t_main = b.integer();
    let main = b.fun("main", vec![], t_main, call);
    let ast = b.finish(vec![num, inc, main]);

    let checked = check(&ast);
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    assert_eq!(checked.types.get(call), Some(&Type::Integer));
}

#[test]
fn test_loops_require_logical_and_integer_parts() {
    // var i: integer
    // fun main(): integer = ({while "s": 0}; {for i = 0, true, 1: 0}; 0)
    let mut b = AstBuilder::new();
    let ti = b.integer();
    let i = b.var("i", ti);
    let s = b.str("s");
    let zero = b.int(0);
    let w = b.while_loop(s, zero);
    let counter = b.name("i");
    let lo = b.int(0);
    let hi = b.logical_lit(true);
    let step = b.int(1);
    let body = b.int(0);
    let f = b.for_loop(counter, lo, hi, step, body);
    let last = b.int(0);
    let block = b.block(vec![w, f, last]);
    let int = b.integer();
    let main = b.fun("main", vec![], int, block);
    let ast = b.finish(vec![i, main]);

    let checked = check(&ast);
    assert_eq!(checked.errors.len(), 2, "{:?}", checked.errors);
    assert_eq!(checked.types.get(w), Some(&Type::Void));
    assert_eq!(checked.types.get(block), Some(&Type::Integer));
}

#[test]
fn test_type_errors_stop_before_code_generation() -> anyhow::Result<()> {
    // fun main(): integer = "not an integer"
    let mut b = AstBuilder::new();
    let int = b.integer();
    let s = b.str("not an integer");
    let main = b.fun("main", vec![], int, s);
    let parsed = ParsedProgram::from(b.finish(vec![main]));

    let compiler = Compiler::new(CompileOptions::default().with_stop_after(Phase::Ir));
    let err = compiler.compile(&parsed).unwrap_err();
    let diagnostics = err
        .diagnostics()
        .ok_or_else(|| anyhow::anyhow!("expected diagnostics, got {}", err))?;
    assert_eq!(diagnostics.type_errors().count(), 1);
    Ok(())
}

#[test]
fn test_array_length_must_be_positive() {
    // var a: arr[-3] integer; fun main(): integer = 0
    let mut b = AstBuilder::new();
    let elem = b.integer();
    let ty = b.array(-3, elem);
    let a = b.var("a", ty);
    let int = b.integer();
    let zero = b.int(0);
    let main = b.fun("main", vec![], int, zero);
    let ast = b.finish(vec![a, main]);

    let checked = check(&ast);
    assert!(matches!(
        checked.errors.as_slice(),
        [TypeError::InvalidArrayLength { length: -3, .. }]
    ));
    assert_eq!(checked.types.get(a), Some(&Type::Error));
}
