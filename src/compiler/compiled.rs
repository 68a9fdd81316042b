//! Compiled formulas

use std::fmt;

use super::{CompiledExpr, Frame};
use crate::context::FormulaContext;
use crate::error::{FormulaError, FormulaResult};
use crate::model::{TypeInfo, Value};

/// Reusable closure form of a formula.
///
/// Holds the context it was compiled against; registry read locks are taken
/// once per [`solve`](FastFormula::solve) call.
pub struct FastFormula {
    context: FormulaContext,
    root: CompiledExpr,
    inputs: Vec<(String, TypeInfo)>,
    text: String,
}

impl FastFormula {
    pub(crate) fn new(
        context: FormulaContext,
        root: CompiledExpr,
        inputs: Vec<(String, TypeInfo)>,
        text: String,
    ) -> Self {
        Self {
            context,
            root,
            inputs,
            text,
        }
    }

    /// Number of inputs expected by [`solve`](FastFormula::solve)
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// Names of the expected inputs, in order
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(name, _)| name.as_str())
    }

    /// Source expression this was compiled from
    pub fn expression(&self) -> &str {
        &self.text
    }

    /// Solve with positional inputs. Extra inputs are ignored.
    pub fn solve(&self, inputs: &[Value]) -> FormulaResult<Value> {
        if inputs.len() < self.inputs.len() {
            return Err(FormulaError::solve(format!(
                "Expected {} inputs, got {}",
                self.inputs.len(),
                inputs.len()
            ))
            .with_expression(self.text.as_str()));
        }

        self.context.with_runtime(|runtime| {
            let bound = self
                .inputs
                .iter()
                .zip(inputs)
                .map(|((name, ty), value)| {
                    runtime.bind_input(value.clone(), ty).map_err(|e| {
                        FormulaError::solve(format!("Input '{name}': {}", e.message()))
                    })
                })
                .collect::<FormulaResult<Vec<_>>>()
                .map_err(|e| e.with_expression(self.text.as_str()))?;

            let frame = Frame {
                runtime,
                inputs: &bound,
            };
            (self.root)(&frame)
                .map(|value| runtime.normalize(value))
                .map_err(|e| e.with_bindings(self.snapshot(&bound)))
        })
    }

    /// Solve and convert the result
    pub fn solve_as<T>(&self, inputs: &[Value]) -> FormulaResult<T>
    where
        T: TryFrom<Value, Error = FormulaError>,
    {
        T::try_from(self.solve(inputs)?)
    }

    fn snapshot(&self, bound: &[Value]) -> Vec<(String, String)> {
        self.inputs
            .iter()
            .zip(bound)
            .map(|((name, _), value)| (name.clone(), value.to_string()))
            .collect()
    }
}

impl fmt::Debug for FastFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastFormula")
            .field("expression", &self.text)
            .field("inputs", &self.inputs)
            .finish()
    }
}
