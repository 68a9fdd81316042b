//! Core value types for formula evaluation

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::types::TypeInfo;
use crate::error::FormulaError;

/// Capability interface for host supplied values.
///
/// Open-ended host types implement this instead of being reflected over.
/// Members and operators declared through a [`TypeDescriptor`] take priority;
/// `member` and `index` are the fallback resolvers used when nothing is declared.
///
/// [`TypeDescriptor`]: crate::registry::TypeDescriptor
pub trait HostValue: fmt::Debug + Send + Sync {
    /// Type identifier, matching the name of a registered host type
    fn type_name(&self) -> &str;

    /// Downcasting support for registered operators and conversions
    fn as_any(&self) -> &dyn Any;

    /// Numeric view of this value, if it has one
    fn to_number(&self) -> Option<f64> {
        None
    }

    /// Named member lookup
    fn member(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Keyed or positional lookup
    fn index(&self, _key: &Value) -> Option<Value> {
        None
    }
}

/// Value produced and consumed by formulas
#[derive(Clone)]
pub enum Value {
    /// Double precision number, the common interchange type
    Number(f64),

    /// Boolean value
    Bool(bool),

    /// String value
    String(Arc<str>),

    /// Ordered sequence, indexed by position
    Sequence(Arc<Vec<Value>>),

    /// String keyed map, indexed by key or property
    Map(Arc<IndexMap<String, Value>>),

    /// Host object reference
    Opaque(Arc<dyn HostValue>),
}

impl Value {
    /// Create a host value
    pub fn host<T: HostValue + 'static>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    /// Create a sequence
    pub fn sequence(values: Vec<Value>) -> Self {
        Value::Sequence(Arc::new(values))
    }

    /// Create a map from key/value pairs, keeping insertion order
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Runtime type of this value
    pub fn type_info(&self) -> TypeInfo {
        match self {
            Value::Number(_) => TypeInfo::Number,
            Value::Bool(_) => TypeInfo::Bool,
            Value::String(_) => TypeInfo::String,
            Value::Sequence(_) => TypeInfo::Sequence,
            Value::Map(_) => TypeInfo::Map,
            Value::Opaque(h) => TypeInfo::Host(h.type_name().to_string()),
        }
    }

    /// Number payload, without conversion
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Host payload
    pub fn as_host(&self) -> Option<&dyn HostValue> {
        match self {
            Value::Opaque(h) => Some(h.as_ref()),
            _ => None,
        }
    }

    /// Downcast a host payload to a concrete type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_host().and_then(|h| h.as_any().downcast_ref::<T>())
    }

    /// Numeric approximate equality, structural otherwise
    pub fn approx_eq(&self, other: &Value, tolerance: f64) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a == b || (a - b).abs() <= tolerance
            }
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.approx_eq(y, tolerance))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.approx_eq(w, tolerance)))
            }
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::sequence(values)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::sequence(values.into_iter().map(Value::Number).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(Arc::new(map))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::sequence(Vec::new()),
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::map(obj.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = FormulaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => Ok(n),
            Value::Opaque(h) => h.to_number().ok_or_else(|| {
                FormulaError::solve(format!("Unable to convert {} to Number", h.type_name()))
            }),
            other => Err(FormulaError::solve(format!(
                "Unable to convert {} to Number",
                other.type_info()
            ))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = FormulaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(FormulaError::solve(format!(
                "Unable to convert {} to Bool",
                other.type_info()
            ))),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = FormulaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            other => Err(FormulaError::solve(format!(
                "Unable to convert {} to String",
                other.type_info()
            ))),
        }
    }
}

impl TryFrom<Value> for Vec<Value> {
    type Error = FormulaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Sequence(items) => Ok(items.as_ref().clone()),
            other => Err(FormulaError::solve(format!(
                "Unable to convert {} to Sequence",
                other.type_info()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Opaque(h) => write!(f, "{h:?}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Sequence(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Opaque(h) => write!(f, "Opaque({h:?})"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Opaque(h) => serializer.serialize_str(&format!("{h:?}")),
        }
    }
}
