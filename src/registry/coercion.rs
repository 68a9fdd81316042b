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

//! Operand coercion search for binary operators

use super::types::TypeRegistry;
use crate::ast::Operation;
use crate::model::TypeInfo;

/// Types both operands must be converted to before applying an operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coercion {
    /// Target type of the left operand
    pub left: TypeInfo,
    /// Target type of the right operand
    pub right: TypeInfo,
}

/// Find conversion targets that make `op` applicable to `(left, right)`.
///
/// The left type's declared overloads are searched first for a right
/// parameter castable from `right`; then the right type's overloads for a
/// left parameter castable from `left`. The first hit wins.
pub fn coerce(
    op: Operation,
    left: &TypeInfo,
    right: &TypeInfo,
    types: &TypeRegistry,
) -> Option<Coercion> {
    if let Some(descriptor) = types.descriptor(left) {
        if let Some(overload) = descriptor
            .operators_for(op)
            .find(|o| types.castable(right, &o.right))
        {
            return Some(Coercion {
                left: left.clone(),
                right: overload.right.clone(),
            });
        }
    }

    if let Some(descriptor) = types.descriptor(right) {
        if let Some(overload) = descriptor
            .operators_for(op)
            .find(|o| types.castable(left, &o.left))
        {
            return Some(Coercion {
                left: overload.left.clone(),
                right: right.clone(),
            });
        }
    }

    None
}
