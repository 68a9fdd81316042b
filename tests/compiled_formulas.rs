//! Compiled formulas: agreement with the interpreter, compile errors and
//! partial application

use formulate::{ErrorKind, FormulaEngine, Transform, TypeInfo, Value};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case("3 * 2^2", vec![])]
#[case("2x", vec![Value::from(3.0)])]
#[case("|(|3|)(|c|)| - |c|", vec![Value::from(2.0)])]
#[case("f(z, b, a) = 3a1.1b2 - z", vec![Value::from(2.0), Value::from(4.0), Value::from(5.0)])]
#[case("q(a, b, c) = (-b + sqrt(b^2 - 4a c)) / (2a)", vec![Value::from(2.0), Value::from(-7.0), Value::from(3.0)])]
#[case("sin(x)^2 + cos(x)^2", vec![Value::from(0.7)])]
#[case("f(x: number, y: number) = x % y - -x^y", vec![Value::from(7.0), Value::from(3.0)])]
#[case("ln(x) / log(x)", vec![Value::from(42.0)])]
#[case("a:b + a:c:1", vec![Value::from(json!({ "b": 2, "c": [1, 5] }))])]
#[case("cos(a:b.c)", vec![Value::from(json!({ "b": { "c": 0.5 } }))])]
#[case("a.Length * 2", vec![Value::from("hello")])]
#[case("f(s: string) = s.Length + 1", vec![Value::from("abc")])]
#[case("s + t", vec![Value::from("ab"), Value::from("cd")])]
#[case("|v| + 1", vec![Value::from(vec![6.0, 8.0])])]
#[case("nml(v)", vec![Value::from(vec![3.0, 4.0])])]
#[case("a:(i)", vec![Value::from(vec![3.0, 4.0]), Value::from(1.0)])]
#[case("(0 - 2)^x", vec![Value::from(3.0)])]
fn test_interpreter_and_compiler_agree(#[case] text: &str, #[case] inputs: Vec<Value>) {
    let engine = FormulaEngine::new();
    let formula = engine.parse(text).unwrap();
    let interpreted = formula.solve(engine.context(), &inputs).unwrap();
    let compiled = formula
        .compile(engine.context())
        .unwrap()
        .solve(&inputs)
        .unwrap();
    assert!(
        interpreted.approx_eq(&compiled, 1e-3),
        "{text}: {interpreted} != {compiled}"
    );
}

#[test]
fn test_compiled_is_reusable() {
    let engine = FormulaEngine::new();
    let fast = engine.compile("f(x) = x^2 - 1").unwrap();
    assert_eq!(fast.arity(), 1);
    assert_eq!(fast.variables().collect::<Vec<_>>(), vec!["x"]);
    for i in 0..10 {
        let x = f64::from(i);
        assert_eq!(fast.solve(&[Value::from(x)]).unwrap(), Value::from(x * x - 1.0));
    }
}

#[test]
fn test_compiled_across_threads() {
    let engine = FormulaEngine::new();
    let fast = std::sync::Arc::new(engine.compile("2x + 1").unwrap());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let fast = fast.clone();
            std::thread::spawn(move || fast.solve(&[Value::from(f64::from(i))]).unwrap())
        })
        .collect();
    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![
            Value::from(1.0),
            Value::from(3.0),
            Value::from(5.0),
            Value::from(7.0)
        ]
    );
}

#[test]
fn test_partial_application() {
    let engine = FormulaEngine::new();
    let fast = engine
        .compile_with_inputs("f(a, x) = a x^2", &[Value::from(2.0)])
        .unwrap();
    assert_eq!(fast.arity(), 1);
    assert_eq!(fast.solve(&[Value::from(3.0)]).unwrap(), Value::from(18.0));

    let err = engine
        .compile_with_inputs("f(a) = 2a", &[Value::from(1.0), Value::from(2.0)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
}

#[test]
fn test_too_few_inputs() {
    let engine = FormulaEngine::new();
    let fast = engine.compile("x + y").unwrap();
    let err = fast.solve(&[Value::from(1.0)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Solve);
    assert_eq!(fast.solve(&[Value::from(1.0), Value::from(2.0), Value::from(9.0)]).unwrap(), Value::from(3.0));
}

#[rstest]
#[case("f(x: string, y: number) = x * y")]
#[case("f(x: string) = x.Width")]
#[case("f(x: list) = x:b")]
#[case("f(x: number) = x:0")]
#[case("f(x: bool) = -x")]
#[case("cbrt(x)")]
#[case("f(x) = x + y")]
fn test_compile_errors(#[case] text: &str) {
    let engine = FormulaEngine::new();
    let err = engine.compile(text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile, "{text}: {err}");
}

#[test]
fn test_compile_error_names_subexpression() {
    let engine = FormulaEngine::new();
    let err = engine
        .compile("f(x: string, y: number) = 1 + x * y")
        .unwrap_err();
    assert_eq!(err.expression(), Some("x * y"));
}

#[test]
fn test_dynamic_transform_dispatch() {
    let engine = FormulaEngine::new();
    engine.register_transform(Transform::new(
        "size",
        TypeInfo::String,
        TypeInfo::Number,
        |v| Ok(Value::from(v.as_str().map_or(0.0, |s| s.len() as f64))),
    ));
    engine.register_transform(Transform::new(
        "size",
        TypeInfo::Number,
        TypeInfo::Number,
        |v| Ok(v.clone()),
    ));

    let fast = engine.compile("size(x)").unwrap();
    assert_eq!(fast.solve(&[Value::from("four")]).unwrap(), Value::from(4.0));
    assert_eq!(fast.solve(&[Value::from(2.5)]).unwrap(), Value::from(2.5));

    assert!(engine.remove_transform("size", Some(&TypeInfo::String)));
    assert_eq!(engine.solve("size(x)", &[Value::from(2.5)]).unwrap(), Value::from(2.5));
    assert!(engine.remove_transform("size", None));
    assert_eq!(engine.compile("size(x)").unwrap_err().kind(), ErrorKind::Compile);
}

#[test]
fn test_non_finite_position_fails_in_both_paths() {
    let engine = FormulaEngine::new();
    let formula = engine.parse("f(a) = a:(0/0)").unwrap();
    let inputs = [Value::from(vec![5.0, 6.0])];
    let interpreted = formula.solve(engine.context(), &inputs).unwrap_err();
    let compiled = formula
        .compile(engine.context())
        .unwrap()
        .solve(&inputs)
        .unwrap_err();
    assert_eq!(interpreted.kind(), ErrorKind::Solve);
    assert_eq!(compiled.kind(), ErrorKind::Solve);
}

#[test]
fn test_runtime_error_context() {
    let engine = FormulaEngine::new();
    let fast = engine.compile("1 + a:3").unwrap();
    let err = fast.solve(&[Value::from(vec![1.0])]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Solve);
    assert_eq!(err.expression(), Some("a:3"));
    assert_eq!(err.bindings(), Some(&[("a".to_string(), "[1]".to_string())][..]));
}
