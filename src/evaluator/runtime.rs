//! Runtime operations shared by the interpreter and compiled formulas
//!
//! Both execution paths funnel dynamic work through [`Runtime`] so that a
//! formula solved by walking its tree and the same formula compiled into
//! closures agree on every result.

use crate::ast::Operation;
use crate::error::{FormulaError, FormulaResult};
use crate::model::{TypeInfo, Value, ValueProvider};
use crate::registry::{
    FunctionRegistry, MemberCache, Transform, TypeRegistry, resolve_binary, resolve_negation,
    select_overload,
};

/// Borrowed view of a formula context for the duration of one call
#[derive(Clone, Copy)]
pub struct Runtime<'a> {
    /// Known types
    pub types: &'a TypeRegistry,
    /// Known transforms
    pub functions: &'a FunctionRegistry,
    /// Member resolution cache
    pub members: &'a MemberCache,
    /// Numeric view of values
    pub provider: &'a dyn ValueProvider,
}

impl<'a> Runtime<'a> {
    /// Turn numeric-like values into `Number`
    pub fn normalize(&self, value: Value) -> Value {
        if matches!(value, Value::Number(_)) {
            return value;
        }
        match self.provider.to_number(&value) {
            Some(n) => Value::Number(n),
            None => value,
        }
    }

    /// Numeric view through the provider, then through a registered conversion
    pub fn to_number(&self, value: &Value) -> Option<f64> {
        if let Some(n) = self.provider.to_number(value) {
            return Some(n);
        }
        self.types
            .conversion(&value.type_info(), &TypeInfo::Number)
            .and_then(|c| c.apply(value).ok())
            .and_then(|v| v.as_number())
    }

    /// Convert a value to `target`: identity when assignable, numeric
    /// conversion for `Number`, otherwise a registered implicit conversion.
    pub fn convert(&self, value: Value, target: &TypeInfo) -> FormulaResult<Value> {
        let from = value.type_info();
        if target.is_assignable_from(&from) {
            return Ok(value);
        }
        if let Some(conversion) = self.types.conversion(&from, target) {
            return conversion.apply(&value);
        }
        if *target == TypeInfo::Number {
            if let Some(n) = self.to_number(&value) {
                return Ok(Value::Number(n));
            }
        }
        Err(FormulaError::solve(format!("Cannot convert {from} to {target}")))
    }

    /// Bind an input to its declared type. `Any` inputs are only normalized.
    pub fn bind_input(&self, value: Value, declared: &TypeInfo) -> FormulaResult<Value> {
        if declared.is_any() {
            Ok(self.normalize(value))
        } else {
            self.convert(value, declared)
        }
    }

    /// Binary arithmetic or power on runtime types
    pub fn binary(&self, op: Operation, left: &Value, right: &Value) -> FormulaResult<Value> {
        if let (Value::Number(l), Value::Number(r)) = (left, right) {
            if let Some(n) = op.apply_numeric(*l, *r) {
                return Ok(Value::Number(n));
            }
        }

        let (lt, rt) = (left.type_info(), right.type_info());
        if let Some(plan) = resolve_binary(op, &lt, &rt, self.types) {
            return plan.apply(left, right);
        }

        match (self.to_number(left), self.to_number(right)) {
            (Some(l), Some(r)) => op
                .apply_numeric(l, r)
                .map(Value::Number)
                .ok_or_else(|| FormulaError::solve(format!("Unsupported operator {op}"))),
            _ => Err(FormulaError::solve(format!(
                "Unable to {op} {lt} and {rt}"
            ))),
        }
    }

    /// Unary minus on a runtime type
    pub fn negate(&self, value: &Value) -> FormulaResult<Value> {
        if let Value::Number(n) = value {
            return Ok(Value::Number(-n));
        }
        let ty = value.type_info();
        if let Some(negation) = resolve_negation(&ty, self.types) {
            return negation(value);
        }
        self.to_number(value)
            .map(|n| Value::Number(-n))
            .ok_or_else(|| FormulaError::solve(format!("Unable to negate {ty}")))
    }

    /// Positional or keyed lookup
    pub fn index(&self, owner: &Value, key: &Value) -> FormulaResult<Value> {
        let found = match owner {
            Value::Sequence(items) => {
                let position = self.to_number(key).ok_or_else(|| {
                    FormulaError::solve(format!(
                        "Sequence index must be numeric, got {}",
                        key.type_info()
                    ))
                })?;
                let position = position.trunc();
                if !position.is_finite() || position < 0.0 || position >= items.len() as f64 {
                    return Err(FormulaError::solve(format!(
                        "Index {position} is out of range for a sequence of {}",
                        items.len()
                    )));
                }
                items[position as usize].clone()
            }
            Value::Map(map) => {
                let key = key_text(key);
                map.get(&key).cloned().ok_or_else(|| {
                    FormulaError::solve(format!("Key '{key}' does not exist on Map"))
                })?
            }
            Value::Opaque(host) => host.index(key).ok_or_else(|| {
                FormulaError::solve(format!(
                    "{} has no entry for {key}",
                    host.type_name()
                ))
            })?,
            other => {
                return Err(FormulaError::solve(format!(
                    "{} cannot be indexed",
                    other.type_info()
                )));
            }
        };
        Ok(self.normalize(found))
    }

    /// Named member lookup on the runtime type of `owner`
    pub fn property(&self, owner: &Value, name: &str) -> FormulaResult<Value> {
        let ty = owner.type_info();
        let member = self
            .members
            .lookup(&ty, name, self.types)
            .into_result(&ty, name)?;
        Ok(self.normalize(member.get(owner)?))
    }

    /// Dispatch a transform by name on the runtime type of `argument`
    pub fn transform(&self, name: &str, argument: &Value) -> FormulaResult<Value> {
        let overloads = self
            .functions
            .overloads(name)
            .ok_or_else(|| FormulaError::solve(format!("Unknown transform '{name}'")))?;
        self.dispatch(name, overloads, argument)
    }

    /// Dispatch among a known overload list
    pub fn dispatch(
        &self,
        name: &str,
        overloads: &[Transform],
        argument: &Value,
    ) -> FormulaResult<Value> {
        let ty = argument.type_info();
        let transform = select_overload(overloads, &ty, self.types).ok_or_else(|| {
            FormulaError::solve(format!("No overload of '{name}' accepts {ty}"))
        })?;
        self.call(transform, argument)
    }

    /// Invoke one overload, converting the argument to its input type when
    /// a conversion exists
    pub fn call(&self, transform: &Transform, argument: &Value) -> FormulaResult<Value> {
        let argument = match self.convert(argument.clone(), transform.input()) {
            Ok(converted) => converted,
            Err(e) => {
                log::debug!(
                    "Passing {} to '{}' unconverted: {}",
                    argument.type_info(),
                    transform.name(),
                    e.message()
                );
                argument.clone()
            }
        };
        Ok(self.normalize(transform.call(&argument)?))
    }
}

/// Map key text for an index operand
fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}
