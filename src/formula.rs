//! Parsed formulas and declaration composition

use std::fmt;

use crate::ast::{NodeId, NodeKind, Tree};
use crate::compiler::{FastFormula, FormulaCompiler};
use crate::context::FormulaContext;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator;
use crate::model::Value;
use crate::parser::{Specification, parse_expression, reducer, split_declaration};
use crate::registry::TypeRegistry;

/// Specification plus reduced expression tree. Immutable once built.
#[derive(Debug, Clone)]
pub struct Formula {
    spec: Specification,
    tree: Tree,
    root: NodeId,
}

impl Formula {
    /// Parse `expr` or `name(v[: type], ...) = expr`. Without a declared
    /// specification the variables are inferred from the expression.
    pub fn parse(source: &str, types: &TypeRegistry) -> FormulaResult<Self> {
        let (declared, expression) = split_declaration(source);
        let (tree, root) = parse_expression(expression)?;
        let spec = match declared {
            Some(lhs) => Specification::parse(lhs, types)?,
            None => Specification::infer(&tree, root),
        };
        log::debug!("Parsed formula '{}' as {spec}", tree.text(root));
        Ok(Self { spec, tree, root })
    }

    /// Compose declarations into the last source.
    ///
    /// Every source but the last must be a named declaration without
    /// parameters (`z = y - x`). Declarations are substituted into matching
    /// variables from the last one backwards, so a declaration may use the
    /// ones listed before it. The composed tree is folded again and, when the
    /// last source has no declared specification, its variables are inferred
    /// from the composed tree.
    pub fn compose<S: AsRef<str>>(sources: &[S], types: &TypeRegistry) -> FormulaResult<Self> {
        let Some((last, declarations)) = sources.split_last() else {
            return Err(FormulaError::parse("Nothing to compose"));
        };
        let (declared, expression) = split_declaration(last.as_ref());
        let (mut tree, mut root) = parse_expression(expression)?;

        for source in declarations.iter().rev() {
            let source = source.as_ref();
            let (name, sub, sub_root) = parse_declaration(source, types)?;
            root = substitute(&mut tree, root, &name, &sub, sub_root);
            log::debug!("Substituted declaration {name}");
        }

        let root = reducer::reduce(&mut tree, root)?;
        let (tree, root) = tree.compact(root);
        let spec = match declared {
            Some(lhs) => Specification::parse(lhs, types)?,
            None => Specification::infer(&tree, root),
        };
        log::debug!("Composed {} sources into {spec}", sources.len());
        Ok(Self { spec, tree, root })
    }

    /// Declared or inferred specification
    pub fn specification(&self) -> &Specification {
        &self.spec
    }

    /// Formula name, empty when not declared
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Input variables in order
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.spec.variables()
    }

    /// Number of inputs
    pub fn arity(&self) -> usize {
        self.spec.len()
    }

    /// Expression tree
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Root of the expression tree
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Expression text regenerated from the tree
    pub fn expression(&self) -> String {
        self.tree.text(self.root)
    }

    /// Solve by walking the tree
    pub fn solve(&self, context: &FormulaContext, inputs: &[Value]) -> FormulaResult<Value> {
        context.with_runtime(|rt| evaluator::solve(rt, &self.tree, self.root, &self.spec, inputs))
    }

    /// Solve and convert the result
    pub fn solve_as<T>(&self, context: &FormulaContext, inputs: &[Value]) -> FormulaResult<T>
    where
        T: TryFrom<Value, Error = FormulaError>,
    {
        T::try_from(self.solve(context, inputs)?)
    }

    /// Compile into closures
    pub fn compile(&self, context: &FormulaContext) -> FormulaResult<FastFormula> {
        self.compile_with_inputs(context, &[])
    }

    /// Compile with the first `initial.len()` inputs fixed as constants. The
    /// result expects the remaining inputs.
    pub fn compile_with_inputs(
        &self,
        context: &FormulaContext,
        initial: &[Value],
    ) -> FormulaResult<FastFormula> {
        let root = context.with_runtime(|rt| {
            FormulaCompiler::new(rt, &self.tree, &self.spec, initial)?.compile(self.root)
        })?;
        let remaining = self
            .spec
            .typed_variables()
            .skip(initial.len())
            .map(|(name, ty)| (name.to_string(), ty.clone()))
            .collect();
        Ok(FastFormula::new(
            context.clone(),
            root,
            remaining,
            self.expression(),
        ))
    }

    /// Fix the first inputs for interpreted solves
    pub fn bind(&self, initial: Vec<Value>) -> BoundFormula<'_> {
        BoundFormula {
            formula: self,
            initial,
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spec.is_explicit() {
            write!(f, "{} = ", self.spec)?;
        }
        write!(f, "{}", self.expression())
    }
}

/// Formula with leading inputs fixed
#[derive(Debug, Clone)]
pub struct BoundFormula<'f> {
    formula: &'f Formula,
    initial: Vec<Value>,
}

impl BoundFormula<'_> {
    /// Number of inputs still expected
    pub fn arity(&self) -> usize {
        self.formula.arity().saturating_sub(self.initial.len())
    }

    /// Solve with the remaining inputs
    pub fn solve(&self, context: &FormulaContext, inputs: &[Value]) -> FormulaResult<Value> {
        let all: Vec<Value> = self.initial.iter().chain(inputs).cloned().collect();
        self.formula.solve(context, &all)
    }
}

fn parse_declaration(source: &str, types: &TypeRegistry) -> FormulaResult<(String, Tree, NodeId)> {
    let (declared, expression) = split_declaration(source);
    let lhs = declared.ok_or_else(|| {
        FormulaError::parse("Declaration has no name").with_expression(source.trim())
    })?;
    let spec = Specification::parse(lhs, types)?;
    if spec.name().is_empty() {
        return Err(FormulaError::parse("Declaration has no name").with_expression(source.trim()));
    }
    if !spec.is_empty() {
        return Err(FormulaError::parse(format!(
            "Declaration '{}' must not declare parameters",
            spec.name()
        ))
        .with_expression(source.trim()));
    }
    let (tree, root) = parse_expression(expression)?;
    Ok((spec.name().to_string(), tree, root))
}

/// Replace every `name` variable under `root` with a copy of `sub`
fn substitute(tree: &mut Tree, root: NodeId, name: &str, sub: &Tree, sub_root: NodeId) -> NodeId {
    let mut root = root;
    for id in tree.post_order(root) {
        if matches!(tree.kind(id), NodeKind::Variable(v) if v == name) {
            let copy = tree.graft(sub, sub_root);
            tree.replace(copy, id);
            if id == root {
                root = copy;
            }
        }
    }
    root
}
