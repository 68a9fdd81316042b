//! Type system definitions for formula values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Static or runtime type of a formula value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeInfo {
    /// Unknown at compile time; assignable from every type
    Any,
    /// Double precision number
    Number,
    /// Boolean value
    Bool,
    /// String value
    String,
    /// Ordered sequence of values
    Sequence,
    /// String keyed map of values
    Map,
    /// Host supplied type identified by name
    Host(String),
}

impl TypeInfo {
    /// Canonical type name
    pub fn name(&self) -> &str {
        match self {
            TypeInfo::Any => "Any",
            TypeInfo::Number => "Number",
            TypeInfo::Bool => "Bool",
            TypeInfo::String => "String",
            TypeInfo::Sequence => "Sequence",
            TypeInfo::Map => "Map",
            TypeInfo::Host(name) => name,
        }
    }

    /// Whether a value of type `other` may be stored where `self` is expected
    /// without conversion.
    pub fn is_assignable_from(&self, other: &TypeInfo) -> bool {
        matches!(self, TypeInfo::Any) || self == other
    }

    /// True for [`TypeInfo::Any`]
    pub fn is_any(&self) -> bool {
        matches!(self, TypeInfo::Any)
    }

    /// True for host types
    pub fn is_host(&self) -> bool {
        matches!(self, TypeInfo::Host(_))
    }

    /// Builtin types, in the order they are seeded into a type registry
    pub fn builtins() -> [TypeInfo; 6] {
        [
            TypeInfo::Any,
            TypeInfo::Number,
            TypeInfo::Bool,
            TypeInfo::String,
            TypeInfo::Sequence,
            TypeInfo::Map,
        ]
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignability() {
        assert!(TypeInfo::Any.is_assignable_from(&TypeInfo::Number));
        assert!(TypeInfo::Number.is_assignable_from(&TypeInfo::Number));
        assert!(!TypeInfo::Number.is_assignable_from(&TypeInfo::Any));
        assert!(!TypeInfo::Host("vec".into()).is_assignable_from(&TypeInfo::Number));
    }

    #[test]
    fn test_names() {
        assert_eq!(TypeInfo::Host("Meters".into()).to_string(), "Meters");
        assert_eq!(TypeInfo::Sequence.name(), "Sequence");
    }
}
