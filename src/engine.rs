//! Formula engine: one-stop entry point over a [`FormulaContext`]

use std::sync::Arc;

use crate::compiler::FastFormula;
use crate::config::FormulaConfig;
use crate::context::FormulaContext;
use crate::error::{FormulaError, FormulaResult};
use crate::formula::Formula;
use crate::model::{TypeInfo, Value, ValueProvider};
use crate::registry::{Transform, TypeDescriptor};

/// Parses, composes, solves and compiles formulas against one context
#[derive(Debug, Clone, Default)]
pub struct FormulaEngine {
    context: FormulaContext,
}

impl FormulaEngine {
    /// Engine with the standard provider and default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a custom configuration
    pub fn with_config(config: FormulaConfig) -> Self {
        Self {
            context: FormulaContext::new(config),
        }
    }

    /// Engine with a custom provider
    pub fn with_provider(provider: Arc<dyn ValueProvider>, config: FormulaConfig) -> Self {
        Self {
            context: FormulaContext::with_provider(provider, config),
        }
    }

    /// Engine over an existing context
    pub fn from_context(context: FormulaContext) -> Self {
        Self { context }
    }

    /// Shared context
    pub fn context(&self) -> &FormulaContext {
        &self.context
    }

    /// Parse one formula
    pub fn parse(&self, source: &str) -> FormulaResult<Formula> {
        Formula::parse(source, &self.context.types())
    }

    /// Compose declarations into the last source
    pub fn compose<S: AsRef<str>>(&self, sources: &[S]) -> FormulaResult<Formula> {
        Formula::compose(sources, &self.context.types())
    }

    /// Parse and solve in one step
    pub fn solve(&self, source: &str, inputs: &[Value]) -> FormulaResult<Value> {
        self.parse(source)?.solve(&self.context, inputs)
    }

    /// Parse, solve and convert the result
    pub fn solve_as<T>(&self, source: &str, inputs: &[Value]) -> FormulaResult<T>
    where
        T: TryFrom<Value, Error = FormulaError>,
    {
        self.parse(source)?.solve_as(&self.context, inputs)
    }

    /// Parse and compile
    pub fn compile(&self, source: &str) -> FormulaResult<FastFormula> {
        self.parse(source)?.compile(&self.context)
    }

    /// Parse and compile with leading inputs fixed
    pub fn compile_with_inputs(&self, source: &str, initial: &[Value]) -> FormulaResult<FastFormula> {
        self.parse(source)?.compile_with_inputs(&self.context, initial)
    }

    /// Add or replace a transform overload
    pub fn register_transform(&self, transform: Transform) {
        self.context.register_transform(transform);
    }

    /// Remove a transform, or only its overload for `input`
    pub fn remove_transform(&self, name: &str, input: Option<&TypeInfo>) -> bool {
        self.context.remove_transform(name, input)
    }

    /// Add or replace a type description
    pub fn register_type(&self, descriptor: TypeDescriptor, aliases: &[&str]) {
        self.context.register_type(descriptor, aliases);
    }

    /// Map aliases to a known type
    pub fn enable_type(&self, ty: TypeInfo, aliases: &[&str]) {
        self.context.enable_type(ty, aliases);
    }

    /// Remove the aliases of a type
    pub fn disable_type(&self, ty: &TypeInfo) -> usize {
        self.context.disable_type(ty)
    }
}
