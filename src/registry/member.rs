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

//! Named member resolution

use std::fmt;
use std::sync::Arc;

use super::UnaryFn;
use super::types::{MemberDef, TypeRegistry};
use crate::error::{FormulaError, FormulaResult};
use crate::model::{TypeInfo, Value};

/// Member resolved to a getter
#[derive(Clone)]
pub struct ResolvedMember {
    /// Member name as declared
    pub name: String,
    /// Static type of the member value
    pub ty: TypeInfo,
    /// Getter
    pub accessor: UnaryFn,
}

impl ResolvedMember {
    /// Read the member from `value`
    pub fn get(&self, value: &Value) -> FormulaResult<Value> {
        (self.accessor)(value)
    }
}

impl fmt::Debug for ResolvedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// Outcome of a member lookup
#[derive(Debug, Clone)]
pub enum MemberLookup {
    /// Exactly one member matched
    Found(ResolvedMember),
    /// No member of that name
    Missing,
    /// Several members matched
    Ambiguous(Vec<String>),
    /// The owner type is not known statically
    Deferred,
}

impl MemberLookup {
    /// Turn a lookup into a getter or a descriptive error
    pub fn into_result(self, owner: &TypeInfo, name: &str) -> Result<ResolvedMember, FormulaError> {
        match self {
            MemberLookup::Found(member) => Ok(member),
            MemberLookup::Missing => Err(FormulaError::solve(format!(
                "Member '{name}' does not exist on {owner}"
            ))),
            MemberLookup::Ambiguous(candidates) => Err(FormulaError::solve(format!(
                "Member '{name}' is ambiguous on {owner}: {}",
                candidates.join(", ")
            ))),
            MemberLookup::Deferred => Err(FormulaError::solve(format!(
                "Member '{name}' cannot be resolved on {owner}"
            ))),
        }
    }
}

/// Resolve `name` on `owner`.
///
/// Maps expose their keys. Declared members match by exact name first, then
/// case-insensitively; several case-insensitive matches are ambiguous. Host
/// types without a declared match fall back to [`HostValue::member`].
///
/// [`HostValue::member`]: crate::model::HostValue::member
pub fn resolve_member(owner: &TypeInfo, name: &str, types: &TypeRegistry) -> MemberLookup {
    match owner {
        TypeInfo::Any => return MemberLookup::Deferred,
        TypeInfo::Map => return MemberLookup::Found(map_key(name)),
        _ => {}
    }

    let declared = types
        .descriptor(owner)
        .map(|d| find_declared(d.members(), name))
        .unwrap_or(MemberLookup::Missing);

    match (declared, owner) {
        (MemberLookup::Missing, TypeInfo::Host(_)) => MemberLookup::Found(host_member(name)),
        (lookup, _) => lookup,
    }
}

fn find_declared(members: &[MemberDef], name: &str) -> MemberLookup {
    if let Some(exact) = members.iter().find(|m| m.name == name) {
        return MemberLookup::Found(resolved(exact));
    }
    let folded: Vec<&MemberDef> = members
        .iter()
        .filter(|m| m.name.eq_ignore_ascii_case(name))
        .collect();
    match folded.as_slice() {
        [] => MemberLookup::Missing,
        [only] => MemberLookup::Found(resolved(only)),
        many => MemberLookup::Ambiguous(many.iter().map(|m| m.name.clone()).collect()),
    }
}

fn resolved(member: &MemberDef) -> ResolvedMember {
    ResolvedMember {
        name: member.name.clone(),
        ty: member.ty.clone(),
        accessor: member.accessor.clone(),
    }
}

fn map_key(name: &str) -> ResolvedMember {
    let key = name.to_string();
    ResolvedMember {
        name: name.to_string(),
        ty: TypeInfo::Any,
        accessor: Arc::new(move |value: &Value| match value {
            Value::Map(map) => map.get(&key).cloned().ok_or_else(|| {
                FormulaError::solve(format!("Member '{key}' does not exist on Map"))
            }),
            other => Err(FormulaError::solve(format!(
                "Expected a Map, got {}",
                other.type_info()
            ))),
        }),
    }
}

fn host_member(name: &str) -> ResolvedMember {
    let key = name.to_string();
    ResolvedMember {
        name: name.to_string(),
        ty: TypeInfo::Any,
        accessor: Arc::new(move |value: &Value| {
            let host = value.as_host().ok_or_else(|| {
                FormulaError::solve(format!("Expected a host value, got {}", value.type_info()))
            })?;
            host.member(&key).ok_or_else(|| {
                FormulaError::solve(format!(
                    "Member '{key}' does not exist on {}",
                    host.type_name()
                ))
            })
        }),
    }
}
