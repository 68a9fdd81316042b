//! Operator kinds and their precedence

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// `+`
    Add,
    /// binary `-`
    Subtract,
    /// `*` or implicit adjacency
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// unary `-`
    Negate,
    /// `^`
    Power,
    /// `.` member access
    Property,
    /// `:` positional or keyed access
    Index,
    /// function application by adjacency to a group or magnitude
    Transform,
}

impl Operation {
    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            Operation::Add | Operation::Subtract => 0,
            Operation::Multiply | Operation::Divide | Operation::Modulo => 1,
            Operation::Negate => 2,
            Operation::Power => 3,
            Operation::Property | Operation::Index | Operation::Transform => 4,
        }
    }

    /// Operator for a source character
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operation::Add),
            '-' => Some(Operation::Subtract),
            '*' => Some(Operation::Multiply),
            '/' => Some(Operation::Divide),
            '%' => Some(Operation::Modulo),
            '^' => Some(Operation::Power),
            '.' => Some(Operation::Property),
            ':' => Some(Operation::Index),
            _ => None,
        }
    }

    /// Source symbol, empty for function application
    pub fn symbol(self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract | Operation::Negate => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
            Operation::Modulo => "%",
            Operation::Power => "^",
            Operation::Property => ".",
            Operation::Index => ":",
            Operation::Transform => "",
        }
    }

    /// Binary arithmetic resolved through native math or operator overloads
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Operation::Add
                | Operation::Subtract
                | Operation::Multiply
                | Operation::Divide
                | Operation::Modulo
        )
    }

    /// Operators whose operands are variables when inferring a specification
    pub fn takes_variable_operands(self) -> bool {
        self.is_arithmetic() || matches!(self, Operation::Negate | Operation::Power)
    }

    /// Access operators whose right operand is a key or member name
    pub fn is_access(self) -> bool {
        matches!(self, Operation::Property | Operation::Index)
    }

    /// Apply a binary numeric operator. `Negate` ignores `left`.
    ///
    /// Returns `None` for the access and application operators.
    pub fn apply_numeric(self, left: f64, right: f64) -> Option<f64> {
        match self {
            Operation::Add => Some(left + right),
            Operation::Subtract => Some(left - right),
            Operation::Multiply => Some(left * right),
            Operation::Divide => Some(left / right),
            Operation::Modulo => Some(left % right),
            Operation::Power => Some(left.powf(right)),
            Operation::Negate => Some(-right),
            Operation::Property | Operation::Index | Operation::Transform => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "Add",
            Operation::Subtract => "Subtract",
            Operation::Multiply => "Multiply",
            Operation::Divide => "Divide",
            Operation::Modulo => "Modulo",
            Operation::Negate => "Negate",
            Operation::Power => "Power",
            Operation::Property => "Property",
            Operation::Index => "Index",
            Operation::Transform => "Transform",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(Operation::Add.precedence() < Operation::Multiply.precedence());
        assert!(Operation::Multiply.precedence() < Operation::Negate.precedence());
        assert!(Operation::Negate.precedence() < Operation::Power.precedence());
        assert!(Operation::Power.precedence() < Operation::Index.precedence());
        assert_eq!(
            Operation::Property.precedence(),
            Operation::Transform.precedence()
        );
    }

    #[test]
    fn test_apply_numeric() {
        assert_eq!(Operation::Power.apply_numeric(2.0, 3.0), Some(8.0));
        assert_eq!(Operation::Modulo.apply_numeric(8.0, 3.0), Some(2.0));
        assert_eq!(Operation::Negate.apply_numeric(0.0, 4.0), Some(-4.0));
        assert_eq!(Operation::Index.apply_numeric(1.0, 1.0), None);
    }
}
