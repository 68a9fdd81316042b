//! Shared formula context: registries, member cache and value provider
//!
//! A context replaces process-wide registries. It is cheap to clone and every
//! clone sees the same registries, so formulas compiled against it pick up
//! transforms and types registered later where dispatch is dynamic.

use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::Arc;

use crate::config::FormulaConfig;
use crate::evaluator::Runtime;
use crate::model::{StandardProvider, TypeInfo, ValueProvider};
use crate::registry::{FunctionRegistry, MemberCache, Transform, TypeDescriptor, TypeRegistry};

struct ContextInner {
    functions: RwLock<FunctionRegistry>,
    types: RwLock<TypeRegistry>,
    members: MemberCache,
    provider: Arc<dyn ValueProvider>,
    config: FormulaConfig,
}

/// Registries, member cache and provider shared by formulas
#[derive(Clone)]
pub struct FormulaContext {
    inner: Arc<ContextInner>,
}

impl FormulaContext {
    /// Context with the standard provider
    pub fn new(config: FormulaConfig) -> Self {
        Self::with_provider(Arc::new(StandardProvider), config)
    }

    /// Context seeded from a custom provider
    pub fn with_provider(provider: Arc<dyn ValueProvider>, config: FormulaConfig) -> Self {
        let mut functions = FunctionRegistry::new();
        provider.register_transforms(&mut functions);

        let mut types = TypeRegistry::with_builtins();
        types.set_type_deduction(config.type_deduction);
        provider.register_types(&mut types);

        log::debug!(
            "Created formula context with {} transforms and provider {provider:?}",
            functions.len()
        );

        Self {
            inner: Arc::new(ContextInner {
                functions: RwLock::new(functions),
                types: RwLock::new(types),
                members: MemberCache::new(&config.cache),
                provider,
                config,
            }),
        }
    }

    /// Configuration the context was built with
    pub fn config(&self) -> &FormulaConfig {
        &self.inner.config
    }

    /// Read access to the function registry
    pub fn functions(&self) -> RwLockReadGuard<'_, FunctionRegistry> {
        self.inner.functions.read()
    }

    /// Read access to the type registry
    pub fn types(&self) -> RwLockReadGuard<'_, TypeRegistry> {
        self.inner.types.read()
    }

    /// Member cache
    pub fn members(&self) -> &MemberCache {
        &self.inner.members
    }

    /// Value provider
    pub fn provider(&self) -> &dyn ValueProvider {
        self.inner.provider.as_ref()
    }

    /// Run `f` with both registries read-locked once.
    ///
    /// `f` must not call back into registration on this context.
    pub fn with_runtime<R>(&self, f: impl FnOnce(Runtime<'_>) -> R) -> R {
        let functions = self.inner.functions.read();
        let types = self.inner.types.read();
        f(Runtime {
            types: &types,
            functions: &functions,
            members: &self.inner.members,
            provider: self.inner.provider.as_ref(),
        })
    }

    /// Add or replace a transform overload
    pub fn register_transform(&self, transform: Transform) {
        self.inner.functions.write().register_transform(transform);
    }

    /// Remove a transform, or one of its overloads
    pub fn remove_transform(&self, name: &str, input: Option<&TypeInfo>) -> bool {
        self.inner.functions.write().remove(name, input)
    }

    /// Add or replace a type description. Cached members of that type are
    /// dropped.
    pub fn register_type(&self, descriptor: TypeDescriptor, aliases: &[&str]) {
        let ty = descriptor.ty().clone();
        let mut types = self.inner.types.write();
        types.register(descriptor, aliases);
        // evict before readers can see the new descriptor
        self.inner.members.evict(&ty);
    }

    /// Map aliases to a known type
    pub fn enable_type(&self, ty: TypeInfo, aliases: &[&str]) {
        self.inner.types.write().enable(ty, aliases);
    }

    /// Remove the aliases of a type
    pub fn disable_type(&self, ty: &TypeInfo) -> usize {
        self.inner.types.write().disable(ty)
    }
}

impl Default for FormulaContext {
    fn default() -> Self {
        Self::new(FormulaConfig::default())
    }
}

impl fmt::Debug for FormulaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaContext")
            .field("transforms", &self.functions().len())
            .field("members", &self.inner.members)
            .field("provider", &self.inner.provider)
            .field("config", &self.inner.config)
            .finish()
    }
}
