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

//! Function registry: named transforms overloaded by input type

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

use super::UnaryFn;
use super::types::TypeRegistry;
use crate::error::{FormulaError, FormulaResult};
use crate::model::{TypeInfo, Value};

/// One overload of a named transform
#[derive(Clone)]
pub struct Transform {
    name: String,
    input: TypeInfo,
    output: TypeInfo,
    func: UnaryFn,
}

impl Transform {
    /// Create a transform overload
    pub fn new<F>(name: impl Into<String>, input: TypeInfo, output: TypeInfo, func: F) -> Self
    where
        F: Fn(&Value) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input,
            output,
            func: Arc::new(func),
        }
    }

    /// Transform name as registered
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared input type
    pub fn input(&self) -> &TypeInfo {
        &self.input
    }

    /// Declared output type
    pub fn output(&self) -> &TypeInfo {
        &self.output
    }

    /// Invoke the callable on an already converted input
    pub fn call(&self, value: &Value) -> FormulaResult<Value> {
        (self.func)(value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.input, self.output)
    }
}

/// Overloads of one transform, in registration order
pub type Overloads = SmallVec<[Transform; 2]>;

/// Case-insensitive name to overload list registry
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    transforms: FxHashMap<String, Overloads>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an overload. An existing overload for the same input type
    /// keeps its position and gets the new callable.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        input: TypeInfo,
        output: TypeInfo,
        func: F,
    ) where
        F: Fn(&Value) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        self.register_transform(Transform::new(name, input, output, func));
    }

    /// Register a prepared overload
    pub fn register_transform(&mut self, transform: Transform) {
        let overloads = self
            .transforms
            .entry(transform.name.to_lowercase())
            .or_default();
        match overloads.iter_mut().find(|t| t.input == transform.input) {
            Some(existing) => {
                log::debug!("Replacing transform {transform:?}");
                *existing = transform;
            }
            None => {
                log::debug!("Registering transform {transform:?}");
                overloads.push(transform);
            }
        }
    }

    /// Register a `Number -> Number` transform
    pub fn register_numeric(&mut self, name: impl Into<String>, func: fn(f64) -> f64) {
        let name = name.into();
        let label = name.clone();
        self.register(name, TypeInfo::Number, TypeInfo::Number, move |value| match value {
            Value::Number(n) => Ok(Value::Number(func(*n))),
            other => Err(FormulaError::solve(format!(
                "{label} expects a Number, got {}",
                other.type_info()
            ))),
        });
    }

    /// Remove every overload of `name`, or only the one accepting `input`.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, name: &str, input: Option<&TypeInfo>) -> bool {
        let key = name.to_lowercase();
        let removed = match input {
            None => self.transforms.remove(&key).is_some(),
            Some(ty) => match self.transforms.get_mut(&key) {
                Some(overloads) => {
                    let before = overloads.len();
                    overloads.retain(|t| &t.input != ty);
                    let removed = overloads.len() != before;
                    if overloads.is_empty() {
                        self.transforms.remove(&key);
                    }
                    removed
                }
                None => false,
            },
        };
        if removed {
            log::debug!("Removed transform {name}");
        }
        removed
    }

    /// Whether any overload of `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(&name.to_lowercase())
    }

    /// Overloads of `name` in registration order
    pub fn overloads(&self, name: &str) -> Option<&[Transform]> {
        self.transforms
            .get(&name.to_lowercase())
            .map(|o| o.as_slice())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .transforms
            .values()
            .filter_map(|o| o.first().map(|t| t.name()))
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Pick the overload of `name` for a value of type `ty`
    pub fn resolve(&self, name: &str, ty: &TypeInfo, types: &TypeRegistry) -> Option<&Transform> {
        select_overload(self.overloads(name)?, ty, types)
    }
}

/// Dispatch among overloads: exact input type, then the first castable one,
/// then the first registered one.
pub fn select_overload<'a>(
    candidates: &'a [Transform],
    ty: &TypeInfo,
    types: &TypeRegistry,
) -> Option<&'a Transform> {
    if let Some(exact) = candidates.iter().find(|t| &t.input == ty) {
        return Some(exact);
    }
    if let Some(castable) = candidates.iter().find(|t| types.castable(ty, &t.input)) {
        return Some(castable);
    }
    let fallback = candidates.first()?;
    log::warn!(
        "No overload of '{}' accepts {ty}, falling back to {fallback:?}",
        fallback.name
    );
    Some(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register_numeric("Sqrt", f64::sqrt);
        registry.register("sqrt", TypeInfo::String, TypeInfo::String, |v| Ok(v.clone()));
        registry
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let registry = registry();
        assert!(registry.contains("SQRT"));
        assert_eq!(registry.overloads("sqrt").map(|o| o.len()), Some(2));
        assert_eq!(registry.names(), vec!["Sqrt"]);
    }

    #[test]
    fn test_dispatch_order() {
        let registry = registry();
        let types = TypeRegistry::with_builtins();
        let exact = registry.resolve("sqrt", &TypeInfo::String, &types).unwrap();
        assert_eq!(exact.input(), &TypeInfo::String);

        let fallback = registry.resolve("sqrt", &TypeInfo::Bool, &types).unwrap();
        assert_eq!(fallback.input(), &TypeInfo::Number);

        assert!(registry.resolve("cbrt", &TypeInfo::Number, &types).is_none());
    }

    #[test]
    fn test_castable_dispatch() {
        let mut registry = FunctionRegistry::new();
        registry.register("show", TypeInfo::Bool, TypeInfo::String, |_| Ok(Value::from("b")));
        registry.register("show", TypeInfo::Any, TypeInfo::String, |_| Ok(Value::from("any")));
        let types = TypeRegistry::with_builtins();
        let picked = registry.resolve("show", &TypeInfo::Number, &types).unwrap();
        assert_eq!(picked.input(), &TypeInfo::Any);
    }

    #[test]
    fn test_replace_and_remove() {
        let mut registry = registry();
        registry.register("sqrt", TypeInfo::Number, TypeInfo::Number, |_| Ok(Value::from(0.0)));
        let overloads = registry.overloads("sqrt").unwrap();
        assert_eq!(overloads.len(), 2);
        assert_eq!(overloads[0].call(&Value::from(4.0)).unwrap(), Value::from(0.0));

        assert!(registry.remove("sqrt", Some(&TypeInfo::String)));
        assert!(!registry.remove("sqrt", Some(&TypeInfo::String)));
        assert!(registry.remove("SQRT", None));
        assert!(registry.is_empty());
    }
}
