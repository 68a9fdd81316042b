// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Operator overloads and binary operation planning
//!
//! A [`BinaryPlan`] is the outcome of resolving an operator against two
//! operand types. The evaluator resolves plans from runtime types on every
//! call; the compiler resolves them once from static types.

use std::fmt;

use super::coercion::coerce;
use super::types::TypeRegistry;
use super::{BinaryFn, UnaryFn};
use crate::ast::Operation;
use crate::error::{FormulaError, FormulaResult};
use crate::model::{TypeInfo, Value};

/// Binary operator implementation declared by a type
#[derive(Clone)]
pub struct OperatorOverload {
    /// Operator
    pub op: Operation,
    /// Left parameter type
    pub left: TypeInfo,
    /// Right parameter type
    pub right: TypeInfo,
    /// Result type
    pub result: TypeInfo,
    /// Implementation
    pub func: BinaryFn,
}

impl fmt::Debug for OperatorOverload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}) -> {}",
            self.op, self.left, self.right, self.result
        )
    }
}

#[derive(Clone)]
enum PlanKind {
    Native(Operation),
    Overload(BinaryFn),
}

/// Resolved binary operation with the operand conversions it needs
#[derive(Clone)]
pub struct BinaryPlan {
    kind: PlanKind,
    left: Option<UnaryFn>,
    right: Option<UnaryFn>,
    result: TypeInfo,
}

impl BinaryPlan {
    /// Static result type
    pub fn result(&self) -> &TypeInfo {
        &self.result
    }

    /// True when the operation runs on plain numbers
    pub fn is_native(&self) -> bool {
        matches!(self.kind, PlanKind::Native(_))
    }

    /// True when at least one operand is converted first
    pub fn is_coerced(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }

    /// Run the plan
    pub fn apply(&self, left: &Value, right: &Value) -> FormulaResult<Value> {
        let left = match &self.left {
            Some(convert) => convert(left)?,
            None => left.clone(),
        };
        let right = match &self.right {
            Some(convert) => convert(right)?,
            None => right.clone(),
        };
        match &self.kind {
            PlanKind::Native(op) => match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => op
                    .apply_numeric(*l, *r)
                    .map(Value::Number)
                    .ok_or_else(|| unsupported(*op, &left, &right)),
                _ => Err(unsupported(*op, &left, &right)),
            },
            PlanKind::Overload(func) => func(&left, &right),
        }
    }
}

fn unsupported(op: Operation, left: &Value, right: &Value) -> FormulaError {
    FormulaError::solve(format!(
        "Unable to {op} {} and {}",
        left.type_info(),
        right.type_info()
    ))
}

impl fmt::Debug for BinaryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            PlanKind::Native(op) => format!("native {op}"),
            PlanKind::Overload(_) => "overload".to_string(),
        };
        f.debug_struct("BinaryPlan")
            .field("kind", &kind)
            .field("coerced", &self.is_coerced())
            .field("result", &self.result)
            .finish()
    }
}

/// Overload of `op` declared by either operand type for exactly `(left, right)`
pub fn find_overload<'t>(
    op: Operation,
    left: &TypeInfo,
    right: &TypeInfo,
    types: &'t TypeRegistry,
) -> Option<&'t OperatorOverload> {
    [left, right]
        .into_iter()
        .filter_map(|ty| types.descriptor(ty))
        .flat_map(|d| d.operators_for(op))
        .find(|o| &o.left == left && &o.right == right)
}

/// Conversion needed to pass a `from` value where `to` is expected.
/// `Some(None)` means no conversion is needed.
fn conversion_step(from: &TypeInfo, to: &TypeInfo, types: &TypeRegistry) -> Option<Option<UnaryFn>> {
    if to.is_assignable_from(from) {
        return Some(None);
    }
    types.conversion(from, to).map(|c| Some(c.func.clone()))
}

/// Resolve a binary arithmetic operator for two operand types.
///
/// Tries native numbers, then an exact declared overload, then a coercion
/// search. Returns `None` when the types cannot be combined.
pub fn resolve_binary(
    op: Operation,
    left: &TypeInfo,
    right: &TypeInfo,
    types: &TypeRegistry,
) -> Option<BinaryPlan> {
    if *left == TypeInfo::Number && *right == TypeInfo::Number {
        return Some(BinaryPlan {
            kind: PlanKind::Native(op),
            left: None,
            right: None,
            result: TypeInfo::Number,
        });
    }

    if let Some(overload) = find_overload(op, left, right, types) {
        return Some(BinaryPlan {
            kind: PlanKind::Overload(overload.func.clone()),
            left: None,
            right: None,
            result: overload.result.clone(),
        });
    }

    let coercion = coerce(op, left, right, types)?;
    let left_step = conversion_step(left, &coercion.left, types)?;
    let right_step = conversion_step(right, &coercion.right, types)?;
    log::debug!(
        "Coercing {op}({left}, {right}) to {op}({}, {})",
        coercion.left,
        coercion.right
    );

    if coercion.left == TypeInfo::Number && coercion.right == TypeInfo::Number {
        return Some(BinaryPlan {
            kind: PlanKind::Native(op),
            left: left_step,
            right: right_step,
            result: TypeInfo::Number,
        });
    }

    let overload = find_overload(op, &coercion.left, &coercion.right, types)?;
    Some(BinaryPlan {
        kind: PlanKind::Overload(overload.func.clone()),
        left: left_step,
        right: right_step,
        result: overload.result.clone(),
    })
}

/// Resolve unary negation for an operand type
pub fn resolve_negation(ty: &TypeInfo, types: &TypeRegistry) -> Option<UnaryFn> {
    types.descriptor(ty).and_then(|d| d.negation().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::TypeDescriptor;

    #[test]
    fn test_native_numbers() {
        let types = TypeRegistry::with_builtins();
        let plan = resolve_binary(Operation::Add, &TypeInfo::Number, &TypeInfo::Number, &types)
            .unwrap();
        assert!(plan.is_native());
        assert_eq!(
            plan.apply(&Value::from(2.0), &Value::from(3.0)).unwrap(),
            Value::from(5.0)
        );
    }

    #[test]
    fn test_string_concatenation() {
        let types = TypeRegistry::with_builtins();
        let plan = resolve_binary(Operation::Add, &TypeInfo::String, &TypeInfo::String, &types)
            .unwrap();
        assert_eq!(plan.result(), &TypeInfo::String);
        assert_eq!(
            plan.apply(&Value::from("ab"), &Value::from("c")).unwrap(),
            Value::from("abc")
        );
        assert!(
            resolve_binary(Operation::Multiply, &TypeInfo::String, &TypeInfo::String, &types)
                .is_none()
        );
    }

    #[test]
    fn test_coerced_plan() {
        let mut types = TypeRegistry::with_builtins();
        let pair = TypeInfo::Host("Pair".into());
        types.register(
            TypeDescriptor::new(pair.clone())
                .with_operator(
                    Operation::Add,
                    pair.clone(),
                    pair.clone(),
                    pair.clone(),
                    |l, _| Ok(l.clone()),
                )
                .with_conversion(TypeInfo::Number, pair.clone(), |v| Ok(v.clone())),
            &[],
        );
        let plan = resolve_binary(Operation::Add, &TypeInfo::Number, &pair, &types).unwrap();
        assert!(plan.is_coerced());
        assert_eq!(plan.result(), &pair);
        assert!(resolve_binary(Operation::Add, &TypeInfo::Bool, &pair, &types).is_none());
    }
}
