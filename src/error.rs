//! Error types for formula parsing, compilation and solving

use std::fmt;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = Result<T, FormulaError>;

/// Category of a [`FormulaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed formula text or specification
    Parse,
    /// Tree cannot be lowered into a fast evaluator
    Compile,
    /// Runtime failure while solving
    Solve,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Parse => write!(f, "parse"),
            ErrorKind::Compile => write!(f, "compile"),
            ErrorKind::Solve => write!(f, "solve"),
        }
    }
}

/// Errors raised by the formula pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    /// Formula text could not be parsed
    #[error("Parse error: {message}{}", render_expression(expression))]
    Parse {
        /// Error message
        message: String,
        /// Source text that failed to parse
        expression: Option<String>,
    },

    /// Formula could not be compiled
    #[error("Compile error: {message}{}", render_expression(expression))]
    Compile {
        /// Error message
        message: String,
        /// Subexpression that failed to compile
        expression: Option<String>,
    },

    /// Formula could not be solved
    #[error("Solve error: {message}{}{}", render_expression(expression), render_bindings(bindings))]
    Solve {
        /// Error message
        message: String,
        /// Subexpression that failed to solve
        expression: Option<String>,
        /// Variable bindings at the time of failure
        bindings: Option<Vec<(String, String)>>,
    },
}

fn render_expression(expression: &Option<String>) -> String {
    expression
        .as_ref()
        .map(|e| format!(" in '{e}'"))
        .unwrap_or_default()
}

fn render_bindings(bindings: &Option<Vec<(String, String)>>) -> String {
    match bindings {
        Some(b) if !b.is_empty() => {
            let parts: Vec<String> = b.iter().map(|(k, v)| format!("{k} = {v}")).collect();
            format!(" with {}", parts.join(", "))
        }
        _ => String::new(),
    }
}

impl FormulaError {
    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        FormulaError::Parse {
            message: message.into(),
            expression: None,
        }
    }

    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        FormulaError::Compile {
            message: message.into(),
            expression: None,
        }
    }

    /// Create a solve error
    pub fn solve(message: impl Into<String>) -> Self {
        FormulaError::Solve {
            message: message.into(),
            expression: None,
            bindings: None,
        }
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::Parse { .. } => ErrorKind::Parse,
            FormulaError::Compile { .. } => ErrorKind::Compile,
            FormulaError::Solve { .. } => ErrorKind::Solve,
        }
    }

    /// Error message without context
    pub fn message(&self) -> &str {
        match self {
            FormulaError::Parse { message, .. }
            | FormulaError::Compile { message, .. }
            | FormulaError::Solve { message, .. } => message,
        }
    }

    /// Offending subexpression, if known
    pub fn expression(&self) -> Option<&str> {
        match self {
            FormulaError::Parse { expression, .. }
            | FormulaError::Compile { expression, .. }
            | FormulaError::Solve { expression, .. } => expression.as_deref(),
        }
    }

    /// Binding snapshot of a solve error
    pub fn bindings(&self) -> Option<&[(String, String)]> {
        match self {
            FormulaError::Solve { bindings, .. } => bindings.as_deref(),
            _ => None,
        }
    }

    /// Attach the offending subexpression unless one is already recorded.
    pub fn with_expression(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            FormulaError::Parse { expression, .. }
            | FormulaError::Compile { expression, .. }
            | FormulaError::Solve { expression, .. } => {
                if expression.is_none() {
                    *expression = Some(text.into());
                }
            }
        }
        self
    }

    /// Attach a binding snapshot to a solve error. Other kinds are returned unchanged.
    pub fn with_bindings(mut self, snapshot: Vec<(String, String)>) -> Self {
        if let FormulaError::Solve { bindings, .. } = &mut self {
            if bindings.is_none() {
                *bindings = Some(snapshot);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FormulaError::parse("Unexpected symbol '#'").with_expression("2 # 3");
        assert_eq!(
            err.to_string(),
            "Parse error: Unexpected symbol '#' in '2 # 3'"
        );

        let err = FormulaError::solve("Too few inputs")
            .with_expression("x + y")
            .with_bindings(vec![("x".to_string(), "2".to_string())]);
        assert_eq!(
            err.to_string(),
            "Solve error: Too few inputs in 'x + y' with x = 2"
        );
    }

    #[test]
    fn test_innermost_expression_wins() {
        let err = FormulaError::compile("Unknown variable 'q'")
            .with_expression("q")
            .with_expression("q + 1");
        assert_eq!(err.expression(), Some("q"));
        assert_eq!(err.kind(), ErrorKind::Compile);
    }

    #[test]
    fn test_bindings_only_on_solve() {
        let err = FormulaError::parse("bad").with_bindings(vec![]);
        assert!(err.bindings().is_none());
    }
}
