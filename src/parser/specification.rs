//! Formula specification: name and typed variable list
//!
//! A specification is either declared (`f(x, y: number) = ...`) or inferred
//! from the variables an expression uses.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::tokenizer::Tokenizer;
use crate::ast::{NodeId, NodeKind, Operation, Tree};
use crate::error::{FormulaError, FormulaResult};
use crate::model::TypeInfo;
use crate::registry::TypeRegistry;

/// Declared or inferred formula signature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    name: String,
    variables: IndexMap<String, TypeInfo>,
    explicit: bool,
}

impl Specification {
    /// Create an explicit specification without variables
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
            explicit: true,
        }
    }

    /// Append a variable, failing if it is already declared
    pub fn with_variable(mut self, name: impl Into<String>, ty: TypeInfo) -> FormulaResult<Self> {
        let name = name.into();
        if self.variables.contains_key(&name) {
            return Err(FormulaError::parse(format!(
                "Variable '{name}' is declared more than once"
            )));
        }
        self.variables.insert(name, ty);
        Ok(self)
    }

    /// Parse the part left of `=`: `name` or `name(v[: type], ...)`
    pub fn parse(text: &str, types: &TypeRegistry) -> FormulaResult<Self> {
        parse_declared(text, types).map_err(|e| e.with_expression(text.trim()))
    }

    /// Infer variables from an expression tree.
    ///
    /// Text leaves count when they are operands of arithmetic, negation or
    /// power, the left operand of an access, a computed index key such as
    /// `a:(i)`, or the argument of a function. Order follows first appearance
    /// from left to right.
    pub fn infer(tree: &Tree, root: NodeId) -> Self {
        let mut variables = IndexMap::new();
        for id in tree.post_order(root) {
            let NodeKind::Variable(name) = tree.kind(id) else {
                continue;
            };
            let is_operand = match tree.parent(id).filter(|_| id != root) {
                None => true,
                Some(parent) => match tree.operation(parent) {
                    Some(op) if op.takes_variable_operands() => true,
                    Some(Operation::Index) => true,
                    Some(op) if op.is_access() => tree.left(parent) == Some(id),
                    Some(Operation::Transform) => tree.right(parent) == Some(id),
                    _ => false,
                },
            };
            if is_operand {
                variables.entry(name.clone()).or_insert(TypeInfo::Any);
            }
        }
        Self {
            name: String::new(),
            variables,
            explicit: false,
        }
    }

    /// Formula name, empty when inferred
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when written in the source rather than inferred
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Variable names in input order
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Variables with their declared types, in input order
    pub fn typed_variables(&self) -> impl Iterator<Item = (&str, &TypeInfo)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Declared type of a variable
    pub fn variable_type(&self, name: &str) -> Option<&TypeInfo> {
        self.variables.get(name)
    }

    /// Input position of a variable
    pub fn position(&self, name: &str) -> Option<usize> {
        self.variables.get_index_of(name)
    }

    /// Number of inputs
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True when the formula takes no inputs
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.variables.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (i, (name, ty)) in self.variables.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match ty {
                TypeInfo::Any => write!(f, "{name}")?,
                ty => write!(f, "{name}: {ty}")?,
            }
        }
        write!(f, ")")
    }
}

fn parse_declared(text: &str, types: &TypeRegistry) -> FormulaResult<Specification> {
    let mut tokenizer = Tokenizer::new(text);
    tokenizer.skip_whitespace();
    let mut spec = Specification::new(tokenizer.consume_name());
    tokenizer.skip_whitespace();
    if tokenizer.is_finished() {
        return Ok(spec);
    }

    if tokenizer.consume_char() != Some('(') {
        return Err(FormulaError::parse("Expected '(' after the formula name"));
    }

    loop {
        tokenizer.skip_whitespace();
        if tokenizer.peek() == Some(')') {
            tokenizer.consume_char();
            break;
        }

        let variable = tokenizer.consume_variable()?;
        tokenizer.skip_whitespace();
        let ty = if tokenizer.peek() == Some(':') {
            tokenizer.consume_char();
            tokenizer.skip_whitespace();
            let typename = tokenizer.consume_typename();
            if typename.is_empty() {
                return Err(FormulaError::parse(format!(
                    "Missing type name for variable '{variable}'"
                )));
            }
            types.find(&typename)?
        } else {
            TypeInfo::Any
        };
        spec = spec.with_variable(variable, ty)?;

        tokenizer.skip_whitespace();
        match tokenizer.consume_char() {
            Some(',') => continue,
            Some(')') => break,
            Some(other) => {
                return Err(FormulaError::parse(format!(
                    "Unexpected '{other}' in variable list"
                )));
            }
            None => return Err(FormulaError::parse("Unterminated variable list")),
        }
    }

    tokenizer.skip_whitespace();
    if !tokenizer.is_finished() {
        return Err(FormulaError::parse(format!(
            "Unexpected '{}' after the variable list",
            tokenizer.remaining().trim()
        )));
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use pretty_assertions::assert_eq;

    fn types() -> TypeRegistry {
        TypeRegistry::with_builtins()
    }

    #[test]
    fn test_parse_declared() {
        let spec = Specification::parse("f(x, y: number, s_1: string)", &types()).unwrap();
        assert_eq!(spec.name(), "f");
        assert_eq!(spec.variables().collect::<Vec<_>>(), vec!["x", "y", "s_1"]);
        assert_eq!(spec.variable_type("x"), Some(&TypeInfo::Any));
        assert_eq!(spec.variable_type("y"), Some(&TypeInfo::Number));
        assert_eq!(spec.position("s_1"), Some(2));
        assert_eq!(spec.to_string(), "f(x, y: Number, s_1: String)");
    }

    #[test]
    fn test_parse_name_only() {
        let spec = Specification::parse(" z ", &types()).unwrap();
        assert_eq!(spec.name(), "z");
        assert!(spec.is_empty());
        assert!(spec.is_explicit());
    }

    #[test]
    fn test_parse_errors() {
        let types = types();
        assert!(Specification::parse("f(x: widget)", &types).is_err());
        assert!(Specification::parse("f(x, x)", &types).is_err());
        assert!(Specification::parse("f(x", &types).is_err());
        assert!(Specification::parse("f(x) y", &types).is_err());
        assert!(Specification::parse("f(1)", &types).is_err());
    }

    #[test]
    fn test_infer_order() {
        let (tree, root) = parse_expression("b*c - b + a").unwrap();
        let spec = Specification::infer(&tree, root);
        assert_eq!(spec.variables().collect::<Vec<_>>(), vec!["b", "c", "a"]);
        assert!(!spec.is_explicit());

        let (tree, root) = parse_expression("x + (y - x)").unwrap();
        let spec = Specification::infer(&tree, root);
        assert_eq!(spec.variables().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_infer_access_and_functions() {
        let (tree, root) = parse_expression("cos(a:b.c) + d.Length").unwrap();
        let spec = Specification::infer(&tree, root);
        assert_eq!(spec.variables().collect::<Vec<_>>(), vec!["a", "d"]);

        let (tree, root) = parse_expression("x").unwrap();
        assert_eq!(Specification::infer(&tree, root).len(), 1);

        let (tree, root) = parse_expression("a:(i) + a:k").unwrap();
        let spec = Specification::infer(&tree, root);
        assert_eq!(spec.variables().collect::<Vec<_>>(), vec!["a", "i"]);
    }
}
