//! Tree-walking formula evaluator
//!
//! Solves a reduced expression tree against a per-call binding map. The tree
//! is never mutated, so one formula can be solved from many threads at once.

pub mod runtime;

pub use runtime::Runtime;

use rustc_hash::FxHashMap;

use crate::ast::{NodeId, NodeKind, Operation, Tree};
use crate::error::{FormulaError, FormulaResult};
use crate::model::Value;
use crate::parser::Specification;

/// Variable values for one solve call
pub type Bindings<'s> = FxHashMap<&'s str, Value>;

/// Bind positional inputs to the variables of `spec`.
///
/// Fails when fewer inputs than variables are given; extra inputs are
/// ignored. Each input is converted to its declared type.
pub fn bind<'s>(
    runtime: &Runtime<'_>,
    spec: &'s Specification,
    inputs: &[Value],
) -> FormulaResult<Bindings<'s>> {
    if inputs.len() < spec.len() {
        return Err(FormulaError::solve(format!(
            "Expected {} inputs, got {}",
            spec.len(),
            inputs.len()
        )));
    }
    let mut bindings = Bindings::default();
    for ((name, ty), value) in spec.typed_variables().zip(inputs) {
        let value = runtime
            .bind_input(value.clone(), ty)
            .map_err(|e| FormulaError::solve(format!("Input '{name}': {}", e.message())))?;
        bindings.insert(name, value);
    }
    Ok(bindings)
}

/// Render bindings in specification order for error reports
pub fn snapshot(spec: &Specification, bindings: &Bindings<'_>) -> Vec<(String, String)> {
    spec.variables()
        .filter_map(|name| {
            bindings
                .get(name)
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Solve `tree` at `root` with positional inputs
pub fn solve(
    runtime: Runtime<'_>,
    tree: &Tree,
    root: NodeId,
    spec: &Specification,
    inputs: &[Value],
) -> FormulaResult<Value> {
    let bindings = bind(&runtime, spec, inputs).map_err(|e| e.with_expression(tree.text(root)))?;
    let evaluator = Evaluator::new(runtime, tree, &bindings);
    evaluator
        .evaluate(root)
        .map(|value| runtime.normalize(value))
        .map_err(|e| e.with_bindings(snapshot(spec, &bindings)))
}

/// Post-order evaluator over one tree and one binding map
pub struct Evaluator<'a> {
    runtime: Runtime<'a>,
    tree: &'a Tree,
    bindings: &'a Bindings<'a>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator
    pub fn new(runtime: Runtime<'a>, tree: &'a Tree, bindings: &'a Bindings<'a>) -> Self {
        Self {
            runtime,
            tree,
            bindings,
        }
    }

    /// Evaluate the subtree at `id`. Errors carry the innermost failing
    /// subexpression.
    pub fn evaluate(&self, id: NodeId) -> FormulaResult<Value> {
        self.evaluate_node(id)
            .map_err(|e| e.with_expression(self.tree.text(id)))
    }

    fn evaluate_node(&self, id: NodeId) -> FormulaResult<Value> {
        match self.tree.kind(id) {
            NodeKind::Number(n) => Ok(Value::Number(*n)),
            NodeKind::Variable(name) => self
                .bindings
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| FormulaError::solve(format!("Unbound variable '{name}'"))),
            NodeKind::Name(name) => Err(FormulaError::solve(format!(
                "'{name}' is not a value"
            ))),
            NodeKind::Group(_) | NodeKind::Magnitude(_) => {
                Err(FormulaError::solve("Unexpanded group"))
            }
            NodeKind::Operator(op) => self.evaluate_operator(id, *op),
        }
    }

    fn evaluate_operator(&self, id: NodeId, op: Operation) -> FormulaResult<Value> {
        let rt = &self.runtime;
        match op {
            Operation::Negate => rt.negate(&self.evaluate(self.operand(id, false)?)?),
            Operation::Property => {
                let owner = self.evaluate(self.operand(id, true)?)?;
                let name = self.name_operand(id, false)?;
                rt.property(&owner, name)
            }
            Operation::Index => {
                let owner = self.evaluate(self.operand(id, true)?)?;
                let key_node = self.operand(id, false)?;
                let key = match self.tree.kind(key_node) {
                    NodeKind::Name(key) => Value::from(key.as_str()),
                    _ => self.evaluate(key_node)?,
                };
                rt.index(&owner, &key)
            }
            Operation::Transform => {
                let name = self.name_operand(id, true)?;
                let argument = self.evaluate(self.operand(id, false)?)?;
                rt.transform(name, &argument)
            }
            _ => {
                let left = self.evaluate(self.operand(id, true)?)?;
                let right = self.evaluate(self.operand(id, false)?)?;
                rt.binary(op, &left, &right)
            }
        }
    }

    fn operand(&self, id: NodeId, left: bool) -> FormulaResult<NodeId> {
        let child = if left {
            self.tree.left(id)
        } else {
            self.tree.right(id)
        };
        child.ok_or_else(|| FormulaError::solve("Operator is missing an operand"))
    }

    fn name_operand(&self, id: NodeId, left: bool) -> FormulaResult<&'a str> {
        let child = self.operand(id, left)?;
        let tree: &'a Tree = self.tree;
        match tree.kind(child) {
            NodeKind::Name(name) => Ok(name.as_str()),
            other => Err(FormulaError::solve(format!("Expected a name, found {other}"))),
        }
    }
}
