//! Host types: declared members, operator coercion, type aliases and the
//! member cache

use std::any::Any;

use formulate::ast::Operation;
use formulate::{
    ErrorKind, FormulaConfig, FormulaEngine, FormulaError, HostValue, TypeDescriptor, TypeInfo,
    Value,
};
use pretty_assertions::assert_eq;

#[derive(Debug)]
struct Meters(f64);

impl HostValue for Meters {
    fn type_name(&self) -> &str {
        "Meters"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn meters_of(value: &Value) -> Result<f64, FormulaError> {
    value
        .downcast_ref::<Meters>()
        .map(|m| m.0)
        .ok_or_else(|| FormulaError::solve(format!("Expected Meters, got {}", value.type_info())))
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn meters() -> TypeInfo {
    TypeInfo::Host("Meters".into())
}

fn engine_with_meters(config: FormulaConfig) -> FormulaEngine {
    let engine = FormulaEngine::with_config(config);
    engine.register_type(
        TypeDescriptor::new(meters())
            .with_member("Value", TypeInfo::Number, |v| meters_of(v).map(Value::from))
            .with_operator(Operation::Add, meters(), meters(), meters(), |l, r| {
                Ok(Value::host(Meters(meters_of(l)? + meters_of(r)?)))
            })
            .with_negation(|v| Ok(Value::host(Meters(-meters_of(v)?))))
            .with_conversion(TypeInfo::Number, meters(), |v| match v {
                Value::Number(n) => Ok(Value::host(Meters(*n))),
                other => Err(FormulaError::solve(format!("Expected a Number, got {other}"))),
            }),
        &["meters", "length_m"],
    );
    engine
}

#[test]
fn test_coerced_operator_both_paths() {
    init_logging();
    let engine = engine_with_meters(FormulaConfig::default());
    let formula = engine.parse("f(m: meters, n: number) = (m + n).Value").unwrap();
    let inputs = [Value::host(Meters(2.0)), Value::from(3.0)];

    assert_eq!(formula.solve(engine.context(), &inputs).unwrap(), Value::from(5.0));
    let fast = formula.compile(engine.context()).unwrap();
    assert_eq!(fast.solve(&inputs).unwrap(), Value::from(5.0));
}

#[test]
fn test_number_input_converts_to_declared_host_type() {
    let engine = engine_with_meters(FormulaConfig::default());
    let formula = engine.parse("f(m: length_m) = (-m).Value").unwrap();
    let inputs = [Value::from(4.0)];
    assert_eq!(formula.solve(engine.context(), &inputs).unwrap(), Value::from(-4.0));
    let fast = formula.compile(engine.context()).unwrap();
    assert_eq!(fast.solve(&inputs).unwrap(), Value::from(-4.0));
}

#[test]
fn test_unsupported_host_operator() {
    let engine = engine_with_meters(FormulaConfig::default());
    let err = engine.compile("f(m: meters) = m * 2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);

    let err = engine
        .solve("f(m: meters) = m * 2", &[Value::host(Meters(1.0))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Solve);
}

#[test]
fn test_type_deduction() {
    let engine = FormulaEngine::new();
    engine.register_type(TypeDescriptor::host("geo.Vector"), &[]);
    assert!(engine.parse("f(v: Vector) = v").is_ok());
    assert!(engine.parse("f(v: geo.Vector) = v").is_ok());

    let strict = FormulaEngine::with_config(FormulaConfig::strict());
    strict.register_type(TypeDescriptor::host("geo.Vector"), &[]);
    assert!(strict.parse("f(v: Vector) = v").is_err());
    strict.enable_type(TypeInfo::Host("geo.Vector".into()), &["vec"]);
    assert!(strict.parse("f(v: vec) = v").is_ok());
}

#[test]
fn test_ambiguous_type_deduction() {
    init_logging();
    let engine = FormulaEngine::new();
    engine.register_type(TypeDescriptor::host("geo.Point"), &[]);
    engine.register_type(TypeDescriptor::host("ui.Point"), &[]);
    let err = engine.parse("f(p: Point) = p").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(engine.parse("f(p: ui.Point) = p").is_ok());
}

#[derive(Debug)]
struct Tagged {
    kind: &'static str,
    value: f64,
}

impl HostValue for Tagged {
    fn type_name(&self) -> &str {
        self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn member(&self, name: &str) -> Option<Value> {
        (name == "raw").then(|| Value::from(self.value))
    }
}

fn tagged(kind: &'static str, value: f64) -> Value {
    Value::host(Tagged { kind, value })
}

fn tagged_value(v: &Value) -> Result<Value, FormulaError> {
    v.downcast_ref::<Tagged>()
        .map(|t| Value::from(t.value * 10.0))
        .ok_or_else(|| FormulaError::solve("Expected a tagged value"))
}

#[test]
fn test_cache_transparency() {
    init_logging();
    let cached = FormulaEngine::with_config(FormulaConfig::testing());
    let uncached = FormulaEngine::with_config(
        FormulaConfig::default().with_cache(formulate::CacheConfig::disabled()),
    );
    for engine in [&cached, &uncached] {
        for kind in ["A", "B", "C", "D"] {
            engine.register_type(
                TypeDescriptor::host(kind).with_member("scaled", TypeInfo::Number, tagged_value),
                &[],
            );
        }
    }

    let values: Vec<Value> = ["A", "B", "C", "D", "A", "C", "B", "D", "A"]
        .into_iter()
        .enumerate()
        .map(|(i, kind)| tagged(kind, i as f64))
        .collect();

    let first: Vec<Value> = values
        .iter()
        .map(|v| uncached.solve("a.scaled + a.raw", &[v.clone()]).unwrap())
        .collect();

    for _ in 0..3 {
        for (value, expected) in values.iter().zip(&first) {
            let result = cached.solve("a.scaled + a.raw", &[value.clone()]).unwrap();
            assert_eq!(&result, expected);
        }
    }

    let stats = cached.context().members().stats();
    assert!(stats.evictions > 0);
    assert!(stats.hits > 0);
    assert!(cached.context().members().len() <= 2);
    assert_eq!(uncached.context().members().len(), 0);
}

#[test]
fn test_reregistering_type_drops_cached_members() {
    let engine = FormulaEngine::new();
    engine.register_type(
        TypeDescriptor::host("A").with_member("x", TypeInfo::Number, |_| Ok(Value::from(1.0))),
        &[],
    );
    assert_eq!(engine.solve("a.x", &[tagged("A", 0.0)]).unwrap(), Value::from(1.0));

    engine.register_type(
        TypeDescriptor::host("A").with_member("x", TypeInfo::Number, |_| Ok(Value::from(2.0))),
        &[],
    );
    assert_eq!(engine.solve("a.x", &[tagged("A", 0.0)]).unwrap(), Value::from(2.0));
}

#[test]
fn test_reregistration_keeps_each_solve_consistent() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    // each version pairs a member with a matching negation, so a solve that
    // mixes a cached member with a newer descriptor no longer sums to zero
    let describe = |level: f64| {
        TypeDescriptor::host("A")
            .with_member("x", TypeInfo::Number, move |_| Ok(Value::from(level)))
            .with_negation(move |_| Ok(Value::from(-level)))
    };
    let engine = Arc::new(FormulaEngine::new());
    engine.register_type(describe(0.0), &[]);

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let value = engine.solve("a.x + (-a)", &[tagged("A", 0.0)]).unwrap();
                    assert_eq!(value, Value::from(0.0));
                }
            })
        })
        .collect();

    for level in 1..=200 {
        engine.register_type(describe(f64::from(level)), &[]);
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }
}
