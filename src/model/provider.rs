//! Value provider: concrete math injected into a formula context

use std::fmt;

use super::types::TypeInfo;
use super::value::Value;
use crate::error::{FormulaError, FormulaResult};
use crate::registry::{FunctionRegistry, TypeRegistry};

/// Supplies the numeric view of values and the transforms and types a
/// context starts with.
pub trait ValueProvider: fmt::Debug + Send + Sync {
    /// Numeric view of a value, used to normalize and to feed native math
    fn to_number(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => Some(*n),
            Value::Opaque(host) => host.to_number(),
            _ => None,
        }
    }

    /// Seed a function registry
    fn register_transforms(&self, functions: &mut FunctionRegistry);

    /// Seed a type registry with application types
    fn register_types(&self, _types: &mut TypeRegistry) {}
}

/// Scalar math plus length and normalization of numeric sequences
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardProvider;

fn sign(x: f64) -> f64 {
    if x == 0.0 || x.is_nan() { x } else { x.signum() }
}

fn components(value: &Value) -> FormulaResult<Vec<f64>> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => Ok(*n),
                other => Err(FormulaError::solve(format!(
                    "Expected numeric components, got {}",
                    other.type_info()
                ))),
            })
            .collect(),
        other => Err(FormulaError::solve(format!(
            "Expected a Sequence, got {}",
            other.type_info()
        ))),
    }
}

fn length(value: &Value) -> FormulaResult<f64> {
    Ok(components(value)?.iter().map(|c| c * c).sum::<f64>().sqrt())
}

impl ValueProvider for StandardProvider {
    fn register_transforms(&self, functions: &mut FunctionRegistry) {
        functions.register_numeric("abs", f64::abs);
        functions.register_numeric("sgn", sign);
        functions.register_numeric("sqrt", f64::sqrt);
        functions.register_numeric("ln", f64::ln);
        functions.register_numeric("log", f64::log10);
        functions.register_numeric("sin", f64::sin);
        functions.register_numeric("asin", f64::asin);
        functions.register_numeric("cos", f64::cos);
        functions.register_numeric("acos", f64::acos);
        functions.register_numeric("tan", f64::tan);
        functions.register_numeric("atan", f64::atan);
        functions.register_numeric("nml", sign);

        functions.register("abs", TypeInfo::Sequence, TypeInfo::Number, |v| {
            length(v).map(Value::Number)
        });
        functions.register("nml", TypeInfo::Sequence, TypeInfo::Sequence, |v| {
            let parts = components(v)?;
            let len = parts.iter().map(|c| c * c).sum::<f64>().sqrt();
            if len == 0.0 {
                return Ok(v.clone());
            }
            Ok(Value::from(parts.into_iter().map(|c| c / len).collect::<Vec<f64>>()))
        });
    }
}
