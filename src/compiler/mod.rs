//! Formula compiler
//!
//! Lowers a reduced expression tree into nested closures. Static types flow
//! bottom-up: operators, members and transforms whose operand types are known
//! are resolved once here, and only `Any` operands defer to runtime dispatch.
//! Known types that cannot be combined are a compile error.

pub mod compiled;

pub use compiled::FastFormula;

use crate::ast::{NodeId, NodeKind, Operation, Tree};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Runtime;
use crate::model::{TypeInfo, Value};
use crate::parser::Specification;
use crate::registry::{resolve_binary, resolve_negation, select_overload};

/// Per-call state visible to compiled closures
pub struct Frame<'a> {
    /// Registries and provider for dynamic dispatch
    pub runtime: Runtime<'a>,
    /// Call-time inputs, already converted to their declared types
    pub inputs: &'a [Value],
}

/// Compiled expression node
pub type CompiledExpr = Box<dyn Fn(&Frame<'_>) -> FormulaResult<Value> + Send + Sync>;

/// Compiled node with its static type
struct Compiled {
    expr: CompiledExpr,
    ty: TypeInfo,
}

impl Compiled {
    fn new<F>(ty: TypeInfo, f: F) -> Self
    where
        F: Fn(&Frame<'_>) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        Self {
            expr: Box::new(f),
            ty,
        }
    }

    fn constant(value: Value) -> Self {
        let ty = value.type_info();
        Self::new(ty, move |_| Ok(value.clone()))
    }
}

/// Static type of a normalized value of type `ty`. Only numbers are known to
/// stay numbers; anything else may be turned into a number by the provider.
fn normalized(ty: &TypeInfo) -> TypeInfo {
    match ty {
        TypeInfo::Number => TypeInfo::Number,
        _ => TypeInfo::Any,
    }
}

/// Where a variable comes from
enum Slot {
    Constant(Value),
    Input(usize, TypeInfo),
}

/// Lowers one tree against one specification
pub struct FormulaCompiler<'a> {
    runtime: Runtime<'a>,
    tree: &'a Tree,
    spec: &'a Specification,
    initial: Vec<Value>,
}

impl<'a> FormulaCompiler<'a> {
    /// Prepare a compiler. The first `initial.len()` variables of `spec` are
    /// closed over as constants, converted to their declared types.
    pub fn new(
        runtime: Runtime<'a>,
        tree: &'a Tree,
        spec: &'a Specification,
        initial: &[Value],
    ) -> FormulaResult<Self> {
        if initial.len() > spec.len() {
            return Err(FormulaError::compile(format!(
                "{} initial inputs given for {} variables",
                initial.len(),
                spec.len()
            )));
        }
        let initial = spec
            .typed_variables()
            .zip(initial)
            .map(|((name, ty), value)| {
                runtime.bind_input(value.clone(), ty).map_err(|e| {
                    FormulaError::compile(format!("Initial input '{name}': {}", e.message()))
                })
            })
            .collect::<FormulaResult<Vec<_>>>()?;
        Ok(Self {
            runtime,
            tree,
            spec,
            initial,
        })
    }

    /// Compile the subtree at `root`
    pub fn compile(&self, root: NodeId) -> FormulaResult<CompiledExpr> {
        let compiled = self.compile_node(root)?;
        log::debug!(
            "Compiled '{}' with static type {}",
            self.tree.text(root),
            compiled.ty
        );
        Ok(compiled.expr)
    }

    fn compile_node(&self, id: NodeId) -> FormulaResult<Compiled> {
        self.lower(id)
            .map_err(|e| e.with_expression(self.tree.text(id)))
    }

    fn lower(&self, id: NodeId) -> FormulaResult<Compiled> {
        match self.tree.kind(id) {
            NodeKind::Number(n) => Ok(Compiled::constant(Value::Number(*n))),
            NodeKind::Variable(name) => self.variable(name),
            NodeKind::Name(name) => Err(FormulaError::compile(format!(
                "'{name}' is not a value"
            ))),
            NodeKind::Group(_) | NodeKind::Magnitude(_) => {
                Err(FormulaError::compile("Unexpanded group"))
            }
            NodeKind::Operator(op) => {
                let compiled = match op {
                    Operation::Negate => self.negate(id)?,
                    Operation::Property => self.property(id)?,
                    Operation::Index => self.index(id)?,
                    Operation::Transform => self.transform(id)?,
                    op => self.binary(id, *op)?,
                };
                Ok(with_context(compiled, self.tree.text(id)))
            }
        }
    }

    fn slot(&self, name: &str) -> Option<Slot> {
        let position = self.spec.position(name)?;
        match self.initial.get(position) {
            Some(value) => Some(Slot::Constant(value.clone())),
            None => {
                let ty = self.spec.variable_type(name)?.clone();
                Some(Slot::Input(position - self.initial.len(), ty))
            }
        }
    }

    fn variable(&self, name: &str) -> FormulaResult<Compiled> {
        match self.slot(name) {
            Some(Slot::Constant(value)) => Ok(Compiled::constant(value)),
            Some(Slot::Input(index, ty)) => {
                let label = name.to_string();
                Ok(Compiled::new(ty, move |frame| {
                    frame.inputs.get(index).cloned().ok_or_else(|| {
                        FormulaError::solve(format!("Missing input '{label}'"))
                    })
                }))
            }
            None => Err(FormulaError::compile(format!("Unknown variable '{name}'"))),
        }
    }

    fn child(&self, id: NodeId, left: bool) -> FormulaResult<NodeId> {
        let child = if left {
            self.tree.left(id)
        } else {
            self.tree.right(id)
        };
        child.ok_or_else(|| FormulaError::compile("Operator is missing an operand"))
    }

    fn name_child(&self, id: NodeId, left: bool) -> FormulaResult<String> {
        match self.tree.kind(self.child(id, left)?) {
            NodeKind::Name(name) => Ok(name.clone()),
            other => Err(FormulaError::compile(format!("Expected a name, found {other}"))),
        }
    }

    fn negate(&self, id: NodeId) -> FormulaResult<Compiled> {
        let Compiled { expr, ty } = self.compile_node(self.child(id, false)?)?;
        match ty {
            TypeInfo::Number => Ok(Compiled::new(TypeInfo::Number, move |frame| {
                match expr(frame)? {
                    Value::Number(n) => Ok(Value::Number(-n)),
                    other => frame.runtime.negate(&other),
                }
            })),
            TypeInfo::Any => Ok(Compiled::new(TypeInfo::Any, move |frame| {
                frame.runtime.negate(&expr(frame)?)
            })),
            ty => {
                let negation = resolve_negation(&ty, self.runtime.types).ok_or_else(|| {
                    FormulaError::compile(format!("Unable to negate {ty}"))
                })?;
                Ok(Compiled::new(ty, move |frame| negation(&expr(frame)?)))
            }
        }
    }

    fn binary(&self, id: NodeId, op: Operation) -> FormulaResult<Compiled> {
        let left = self.compile_node(self.child(id, true)?)?;
        let right = self.compile_node(self.child(id, false)?)?;
        let (l, r) = (left.expr, right.expr);

        if left.ty.is_any() || right.ty.is_any() {
            return Ok(Compiled::new(TypeInfo::Any, move |frame| {
                frame.runtime.binary(op, &l(frame)?, &r(frame)?)
            }));
        }

        let plan = resolve_binary(op, &left.ty, &right.ty, self.runtime.types).ok_or_else(|| {
            FormulaError::compile(format!(
                "No coercion between {} and {} for {op}",
                left.ty, right.ty
            ))
        })?;

        if plan.is_native() && !plan.is_coerced() {
            return Ok(Compiled::new(TypeInfo::Number, move |frame| {
                match (l(frame)?, r(frame)?) {
                    (Value::Number(a), Value::Number(b)) => op
                        .apply_numeric(a, b)
                        .map(Value::Number)
                        .ok_or_else(|| FormulaError::solve(format!("Unsupported operator {op}"))),
                    (a, b) => frame.runtime.binary(op, &a, &b),
                }
            }));
        }

        let ty = plan.result().clone();
        Ok(Compiled::new(ty, move |frame| plan.apply(&l(frame)?, &r(frame)?)))
    }

    fn property(&self, id: NodeId) -> FormulaResult<Compiled> {
        let owner = self.compile_node(self.child(id, true)?)?;
        let name = self.name_child(id, false)?;
        let expr = owner.expr;

        if owner.ty.is_any() {
            return Ok(Compiled::new(TypeInfo::Any, move |frame| {
                frame.runtime.property(&expr(frame)?, &name)
            }));
        }

        let member = self
            .runtime
            .members
            .lookup(&owner.ty, &name, self.runtime.types)
            .into_result(&owner.ty, &name)
            .map_err(|e| FormulaError::compile(e.message()))?;
        let ty = normalized(&member.ty);
        Ok(Compiled::new(ty, move |frame| {
            let value = member.get(&expr(frame)?)?;
            Ok(frame.runtime.normalize(value))
        }))
    }

    fn index(&self, id: NodeId) -> FormulaResult<Compiled> {
        let owner = self.compile_node(self.child(id, true)?)?;
        let key_node = self.child(id, false)?;
        let key = match self.tree.kind(key_node) {
            NodeKind::Name(key) => Compiled::constant(Value::from(key.as_str())),
            _ => self.compile_node(key_node)?,
        };

        match (&owner.ty, &key.ty) {
            (TypeInfo::Number | TypeInfo::Bool | TypeInfo::String, _) => {
                return Err(FormulaError::compile(format!("{} cannot be indexed", owner.ty)));
            }
            (TypeInfo::Sequence, TypeInfo::String | TypeInfo::Bool | TypeInfo::Map) => {
                return Err(FormulaError::compile(format!(
                    "Sequence index must be numeric, got {}",
                    key.ty
                )));
            }
            _ => {}
        }

        let (o, k) = (owner.expr, key.expr);
        Ok(Compiled::new(TypeInfo::Any, move |frame| {
            frame.runtime.index(&o(frame)?, &k(frame)?)
        }))
    }

    fn transform(&self, id: NodeId) -> FormulaResult<Compiled> {
        let name = self.name_child(id, true)?;
        let argument = self.compile_node(self.child(id, false)?)?;
        let overloads = self
            .runtime
            .functions
            .overloads(&name)
            .ok_or_else(|| FormulaError::compile(format!("Unknown transform '{name}'")))?;
        let expr = argument.expr;

        if argument.ty.is_any() {
            let overloads = overloads.to_vec();
            return Ok(Compiled::new(TypeInfo::Any, move |frame| {
                frame.runtime.dispatch(&name, &overloads, &expr(frame)?)
            }));
        }

        let transform = select_overload(overloads, &argument.ty, self.runtime.types)
            .cloned()
            .ok_or_else(|| {
                FormulaError::compile(format!("No overload of '{name}' accepts {}", argument.ty))
            })?;
        let ty = normalized(transform.output());
        Ok(Compiled::new(ty, move |frame| {
            frame.runtime.call(&transform, &expr(frame)?)
        }))
    }
}

/// Attach the subexpression text to runtime failures of a compiled node
fn with_context(compiled: Compiled, text: String) -> Compiled {
    let Compiled { expr, ty } = compiled;
    Compiled::new(ty, move |frame| {
        expr(frame).map_err(|e| e.with_expression(text.as_str()))
    })
}
