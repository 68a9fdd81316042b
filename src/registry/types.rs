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

//! Type registry: aliases, descriptors and implicit conversions

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::operator::OperatorOverload;
use super::{BinaryFn, UnaryFn};
use crate::ast::Operation;
use crate::error::{FormulaError, FormulaResult};
use crate::model::{TypeInfo, Value};

/// Type lookup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// No alias or known type matches
    #[error("Unknown type '{name}'")]
    UnknownType {
        /// Requested type name
        name: String,
    },

    /// Several known types share the requested name
    #[error("Type '{name}' is ambiguous between {}", candidates.join(", "))]
    AmbiguousType {
        /// Requested type name
        name: String,
        /// Full names of the matching types
        candidates: Vec<String>,
    },
}

impl From<RegistryError> for FormulaError {
    fn from(err: RegistryError) -> Self {
        FormulaError::parse(err.to_string())
    }
}

/// Member declared on a type
#[derive(Clone)]
pub struct MemberDef {
    /// Member name
    pub name: String,
    /// Static type of the member value
    pub ty: TypeInfo,
    /// Getter
    pub accessor: UnaryFn,
}

/// Implicit conversion between two types
#[derive(Clone)]
pub struct Conversion {
    /// Source type
    pub from: TypeInfo,
    /// Target type
    pub to: TypeInfo,
    /// Converter
    pub func: UnaryFn,
}

impl Conversion {
    /// Apply the conversion
    pub fn apply(&self, value: &Value) -> FormulaResult<Value> {
        (self.func)(value)
    }
}

/// Capabilities a type declares: members, operators and conversions
#[derive(Clone)]
pub struct TypeDescriptor {
    ty: TypeInfo,
    members: Vec<MemberDef>,
    operators: Vec<OperatorOverload>,
    negation: Option<UnaryFn>,
    conversions: Vec<Conversion>,
}

impl TypeDescriptor {
    /// Describe `ty` with no capabilities yet
    pub fn new(ty: TypeInfo) -> Self {
        Self {
            ty,
            members: Vec::new(),
            operators: Vec::new(),
            negation: None,
            conversions: Vec::new(),
        }
    }

    /// Describe a host type
    pub fn host(name: impl Into<String>) -> Self {
        Self::new(TypeInfo::Host(name.into()))
    }

    /// Declare a member
    pub fn with_member<F>(mut self, name: impl Into<String>, ty: TypeInfo, getter: F) -> Self
    where
        F: Fn(&Value) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        self.members.push(MemberDef {
            name: name.into(),
            ty,
            accessor: Arc::new(getter),
        });
        self
    }

    /// Declare a binary operator overload
    pub fn with_operator<F>(
        mut self,
        op: Operation,
        left: TypeInfo,
        right: TypeInfo,
        result: TypeInfo,
        func: F,
    ) -> Self
    where
        F: Fn(&Value, &Value) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        let func: BinaryFn = Arc::new(func);
        self.operators.push(OperatorOverload {
            op,
            left,
            right,
            result,
            func,
        });
        self
    }

    /// Declare unary negation
    pub fn with_negation<F>(mut self, func: F) -> Self
    where
        F: Fn(&Value) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        self.negation = Some(Arc::new(func));
        self
    }

    /// Declare an implicit conversion. Either side may be this type.
    pub fn with_conversion<F>(mut self, from: TypeInfo, to: TypeInfo, func: F) -> Self
    where
        F: Fn(&Value) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        self.conversions.push(Conversion {
            from,
            to,
            func: Arc::new(func),
        });
        self
    }

    /// Described type
    pub fn ty(&self) -> &TypeInfo {
        &self.ty
    }

    /// Type name without its namespace
    pub fn name(&self) -> &str {
        let full = self.ty.name();
        full.rsplit_once('.').map_or(full, |(_, short)| short)
    }

    /// Type name including its namespace, e.g. `geo.Vector`
    pub fn full_name(&self) -> &str {
        self.ty.name()
    }

    /// Declared members
    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    /// Declared operator overloads
    pub fn operators(&self) -> &[OperatorOverload] {
        &self.operators
    }

    /// Declared overloads of `op`
    pub fn operators_for(&self, op: Operation) -> impl Iterator<Item = &OperatorOverload> {
        self.operators.iter().filter(move |o| o.op == op)
    }

    /// Declared negation
    pub fn negation(&self) -> Option<&UnaryFn> {
        self.negation.as_ref()
    }

    /// Declared conversions
    pub fn conversions(&self) -> &[Conversion] {
        &self.conversions
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type", &self.full_name())
            .field(
                "members",
                &self.members.iter().map(|m| &m.name).collect::<Vec<_>>(),
            )
            .field("operators", &self.operators.len())
            .field("conversions", &self.conversions.len())
            .finish()
    }
}

/// Alias to type lookup with optional deduction from known type names
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    aliases: FxHashMap<String, TypeInfo>,
    descriptors: IndexMap<TypeInfo, TypeDescriptor>,
    type_deduction: bool,
}

fn alias_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            aliases: FxHashMap::default(),
            descriptors: IndexMap::new(),
            type_deduction: true,
        }
    }

    /// Create a registry seeded with the builtin types and aliases
    pub fn with_builtins() -> Self {
        BUILTIN_REGISTRY.clone()
    }

    /// Enable or disable deduction of unregistered aliases
    pub fn set_type_deduction(&mut self, enabled: bool) {
        self.type_deduction = enabled;
    }

    /// Whether unregistered aliases are deduced from known type names
    pub fn type_deduction(&self) -> bool {
        self.type_deduction
    }

    /// Register a type description and aliases for it. An existing
    /// description of the same type is replaced.
    pub fn register(&mut self, descriptor: TypeDescriptor, aliases: &[&str]) {
        let ty = descriptor.ty().clone();
        log::debug!("Registering type {} with aliases {:?}", descriptor.full_name(), aliases);
        self.descriptors.insert(ty.clone(), descriptor);
        self.enable(ty, aliases);
    }

    /// Map aliases to a type
    pub fn enable(&mut self, ty: TypeInfo, aliases: &[&str]) {
        for alias in aliases {
            self.aliases.insert(alias_key(alias), ty.clone());
        }
    }

    /// Remove every alias of a type. Returns how many were removed.
    pub fn disable(&mut self, ty: &TypeInfo) -> usize {
        let before = self.aliases.len();
        self.aliases.retain(|_, t| t != ty);
        let removed = before - self.aliases.len();
        log::debug!("Disabled type {ty}, {removed} aliases removed");
        removed
    }

    /// Whether an alias is currently mapped
    pub fn is_enabled(&self, alias: &str) -> bool {
        self.aliases.contains_key(&alias_key(alias))
    }

    /// Resolve a type name through aliases, then through deduction
    pub fn find(&self, name: &str) -> Result<TypeInfo, RegistryError> {
        if let Some(ty) = self.aliases.get(&alias_key(name)) {
            return Ok(ty.clone());
        }
        if !self.type_deduction {
            return Err(RegistryError::UnknownType {
                name: name.to_string(),
            });
        }
        self.deduce(name)
    }

    fn deduce(&self, name: &str) -> Result<TypeInfo, RegistryError> {
        let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        let by_full_name = name.contains('.');
        let candidates: Vec<&TypeDescriptor> = self
            .descriptors
            .values()
            .filter(|d| {
                if by_full_name {
                    d.full_name() == name
                } else {
                    d.name() == name
                }
            })
            .collect();

        match candidates.as_slice() {
            [] => Err(RegistryError::UnknownType { name }),
            [only] => Ok(only.ty().clone()),
            many => Err(RegistryError::AmbiguousType {
                name,
                candidates: many.iter().map(|d| d.full_name().to_string()).collect(),
            }),
        }
    }

    /// Description of a type
    pub fn descriptor(&self, ty: &TypeInfo) -> Option<&TypeDescriptor> {
        self.descriptors.get(ty)
    }

    /// Every known type description, in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.values()
    }

    /// Implicit conversion from `from` to `to` declared by either type
    pub fn conversion(&self, from: &TypeInfo, to: &TypeInfo) -> Option<&Conversion> {
        [from, to]
            .into_iter()
            .filter_map(|ty| self.descriptor(ty))
            .flat_map(|d| d.conversions().iter())
            .find(|c| &c.from == from && &c.to == to)
    }

    /// Identical, assignable, or implicitly convertible
    pub fn castable(&self, from: &TypeInfo, to: &TypeInfo) -> bool {
        to.is_assignable_from(from) || self.conversion(from, to).is_some()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

static BUILTIN_REGISTRY: Lazy<TypeRegistry> = Lazy::new(|| {
    let mut registry = TypeRegistry::new();
    for descriptor in builtin_descriptors() {
        let aliases = builtin_aliases(descriptor.ty());
        registry.register(descriptor, aliases);
    }
    registry
});

fn builtin_aliases(ty: &TypeInfo) -> &'static [&'static str] {
    match ty {
        TypeInfo::Any => &["any", "object", "dynamic"],
        TypeInfo::Number => &["number", "double", "float", "int", "decimal", "real"],
        TypeInfo::Bool => &["bool", "boolean"],
        TypeInfo::String => &["string", "str", "text"],
        TypeInfo::Sequence => &["sequence", "seq", "list", "array"],
        TypeInfo::Map => &["map", "dict", "dictionary"],
        TypeInfo::Host(_) => &[],
    }
}

fn length_of(value: &Value) -> FormulaResult<Value> {
    match value {
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        Value::Sequence(items) => Ok(Value::Number(items.len() as f64)),
        other => Err(FormulaError::solve(format!(
            "{} has no length",
            other.type_info()
        ))),
    }
}

fn builtin_descriptors() -> Vec<TypeDescriptor> {
    TypeInfo::builtins()
        .into_iter()
        .map(|ty| {
            let descriptor = TypeDescriptor::new(ty.clone());
            match ty {
                TypeInfo::String => descriptor
                    .with_member("Length", TypeInfo::Number, length_of)
                    .with_operator(
                        Operation::Add,
                        TypeInfo::String,
                        TypeInfo::String,
                        TypeInfo::String,
                        |l, r| match (l, r) {
                            (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{a}{b}"))),
                            _ => Err(FormulaError::solve("String concatenation expects strings")),
                        },
                    ),
                TypeInfo::Sequence => descriptor
                    .with_member("Length", TypeInfo::Number, length_of)
                    .with_member("Count", TypeInfo::Number, length_of),
                _ => descriptor,
            }
        })
        .collect()
}
