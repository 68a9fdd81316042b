//! Function and type registries, operator resolution and the member cache

use std::sync::Arc;

use crate::error::FormulaResult;
use crate::model::Value;

pub mod cache;
pub mod coercion;
pub mod function;
pub mod member;
pub mod operator;
pub mod types;

/// Shared single argument callable: transforms, getters and conversions
pub type UnaryFn = Arc<dyn Fn(&Value) -> FormulaResult<Value> + Send + Sync>;

/// Shared two argument callable: operator overloads
pub type BinaryFn = Arc<dyn Fn(&Value, &Value) -> FormulaResult<Value> + Send + Sync>;

pub use cache::{CacheStats, MemberCache};
pub use coercion::{Coercion, coerce};
pub use function::{FunctionRegistry, Overloads, Transform, select_overload};
pub use member::{MemberLookup, ResolvedMember, resolve_member};
pub use operator::{BinaryPlan, OperatorOverload, find_overload, resolve_binary, resolve_negation};
pub use types::{Conversion, MemberDef, RegistryError, TypeDescriptor, TypeRegistry};
