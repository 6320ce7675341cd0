//! Registration of bindings.
//!
//! The [Registry] collects bindings until it is sealed. Sealing builds the dependency graph and,
//! unless disabled in the [RegistryOptions], validates it as a whole: missing bindings and cycles
//! are then reported before any factory runs. A sealed registry is read-only and can be shared
//! by any number of containers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::binding::{Binding, Dependencies, Scope};
use crate::container::Container;
use crate::error::{BoxError, FactoryError, Result, WiringError};
use crate::graph::ResolutionGraph;
use crate::key::{Key, TypeKey};

/// When to check the dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    /// Check the whole graph when sealing the registry
    #[default]
    Eager,
    /// Only check the dependencies of each key the first time it is resolved
    Lazy,
}

/// Settings of a registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    pub validation: Validation,
    /// Instantiate all singletons when creating the container
    pub eager_singletons: bool,
}

impl RegistryOptions {
    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn eager_singletons(mut self, eager: bool) -> Self {
        self.eager_singletons = eager;
        self
    }
}

/// Callback run on a bound instance once the container is created
pub(crate) type InitHook = Arc<dyn Fn(&Container) -> Result<()> + Send + Sync>;

/// Group of bindings registered together
pub trait Module {
    fn register(&self, registry: &Registry) -> Result<()>;
}

impl<F: Fn(&Registry) -> Result<()>> Module for F {
    fn register(&self, registry: &Registry) -> Result<()> {
        self(registry)
    }
}

/// Content of a sealed registry
pub(crate) struct Sealed {
    pub(crate) graph: ResolutionGraph,
    pub(crate) hooks: Vec<(TypeKey, InitHook)>,
    pub(crate) validation: Validation,
}

enum Phase {
    Open,
    Sealed(Arc<Sealed>),
    Failed(WiringError),
}

struct Inner {
    bindings: Vec<Binding>,
    /// Position of each key in `bindings`
    index: HashMap<TypeKey, usize>,
    hooks: Vec<(TypeKey, InitHook)>,
    /// Keys of rejected duplicate registrations, reported again when sealing
    rejected: Vec<TypeKey>,
    phase: Phase,
}

impl Inner {
    fn check_open(&self, key: &TypeKey) -> Result<()> {
        match self.phase {
            Phase::Open => Ok(()),
            _ => Err(WiringError::RegistrySealed { key: key.clone() }),
        }
    }
}

/// Collection of bindings, unique per key
pub struct Registry {
    inner: RwLock<Inner>,
    options: RegistryOptions,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            inner: RwLock::new(Inner {
                bindings: Vec::new(),
                index: HashMap::new(),
                hooks: Vec::new(),
                rejected: Vec::new(),
                phase: Phase::Open,
            }),
            options,
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Add a binding.
    ///
    /// The first binding registered for a key wins: later ones are rejected with
    /// [WiringError::DuplicateBinding], and the rejection fails the sealing of the registry.
    pub fn register(&self, binding: Binding) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.check_open(binding.key())?;
        if binding.is_eager() && binding.scope() == Scope::Transient {
            return Err(WiringError::EagerTransient {
                key: binding.key().clone(),
            });
        }
        let position = inner.bindings.len();
        match inner.index.entry(binding.key().clone()) {
            Entry::Occupied(_) => {
                debug!(key = %binding.key(), "Rejected duplicate binding");
                inner.rejected.push(binding.key().clone());
                return Err(WiringError::DuplicateBinding {
                    key: binding.key().clone(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(position);
            }
        }
        debug!(
            key = %binding.key(),
            scope = %binding.scope(),
            dependencies = binding.dependencies().len(),
            "Registered binding"
        );
        inner.bindings.push(binding);
        Ok(())
    }

    /// Bind a key to a shared instance, built at most once from the instances of its dependencies
    pub fn register_singleton<T, D, R, F>(&self, key: Key<T>, deps: D, factory: F) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
        D: Dependencies,
        R: Into<Arc<T>>,
        F: Fn(D::Instances) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        self.register(Binding::singleton(key, deps, factory))
    }

    /// Bind a key to fresh instances, built for each resolution
    pub fn register_transient<T, D, R, F>(&self, key: Key<T>, deps: D, factory: F) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
        D: Dependencies,
        R: Into<Arc<T>>,
        F: Fn(D::Instances) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        self.register(Binding::transient(key, deps, factory))
    }

    /// Register a group of bindings
    pub fn register_module(&self, module: &impl Module) -> Result<()> {
        module.register(self)
    }

    /// Run a callback with the instance bound to a key after the container is created.
    ///
    /// Hooks run in registration order, once the eager singletons are instantiated. They can use
    /// the container to wire objects that cannot receive their collaborators at construction.
    pub fn on_init<T, F>(&self, key: &Key<T>, hook: F) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container, Arc<T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        inner.check_open(key.type_key())?;
        let target = key.clone();
        let hook: InitHook = Arc::new(move |container: &Container| -> Result<()> {
            let value = container.resolve(&target)?;
            hook(container, value)
                .map_err(|e| FactoryError::init_hook(target.type_key().clone(), e).into())
        });
        inner.hooks.push((key.type_key().clone(), hook));
        Ok(())
    }

    /// Copy the bindings and init hooks of another registry
    pub fn extend_from(&self, other: &Registry) -> Result<()> {
        let (bindings, hooks) = {
            let other = other.inner.read();
            (other.bindings.clone(), other.hooks.clone())
        };
        for binding in bindings {
            self.register(binding)?;
        }
        let mut inner = self.inner.write();
        for (key, hook) in hooks {
            inner.check_open(&key)?;
            inner.hooks.push((key, hook));
        }
        Ok(())
    }

    /// Retrieve the binding registered for a key
    pub fn lookup(&self, key: &TypeKey) -> Result<Binding> {
        let inner = self.inner.read();
        inner
            .index
            .get(key)
            .map(|&position| inner.bindings[position].clone())
            .ok_or_else(|| WiringError::UnboundDependency {
                key: key.clone(),
                requested_by: None,
                registered: inner.bindings.iter().map(|b| b.key().clone()).collect(),
            })
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.inner.read().index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered keys, in registration order
    pub fn keys(&self) -> Vec<TypeKey> {
        self.inner.read().bindings.iter().map(|b| b.key().clone()).collect()
    }

    pub fn is_sealed(&self) -> bool {
        !matches!(self.inner.read().phase, Phase::Open)
    }

    /// Close the registration phase and validate the bindings.
    ///
    /// Sealing is final, even when it fails: further registrations are rejected and
    /// containers can not be created from a registry that failed validation.
    /// Sealing again returns the outcome of the first call.
    pub fn seal(&self) -> Result<()> {
        let mut inner = self.inner.write();
        match &inner.phase {
            Phase::Sealed(_) => return Ok(()),
            Phase::Failed(err) => return Err(err.clone()),
            Phase::Open => (),
        }

        match self.build(&inner) {
            Ok(sealed) => {
                info!(
                    bindings = sealed.graph.len(),
                    hooks = sealed.hooks.len(),
                    validation = ?sealed.validation,
                    "Sealed registry"
                );
                inner.phase = Phase::Sealed(Arc::new(sealed));
                Ok(())
            }
            Err(err) => {
                info!(error = %err, "Registry failed validation");
                inner.phase = Phase::Failed(err.clone());
                Err(err)
            }
        }
    }

    fn build(&self, inner: &Inner) -> Result<Sealed> {
        if let Some(key) = inner.rejected.first() {
            return Err(WiringError::DuplicateBinding { key: key.clone() });
        }

        let mut bindings = inner.bindings.clone();
        if self.options.eager_singletons {
            bindings
                .iter_mut()
                .filter(|b| b.scope() == Scope::Singleton)
                .for_each(Binding::set_eager);
        }
        let graph = ResolutionGraph::new(bindings);

        if self.options.validation == Validation::Eager {
            graph.validate()?;
            if let Some((key, _)) = inner.hooks.iter().find(|(k, _)| graph.lookup(k).is_none()) {
                return Err(WiringError::UnboundDependency {
                    key: key.clone(),
                    requested_by: None,
                    registered: graph.keys().cloned().collect(),
                });
            }
        }

        Ok(Sealed {
            graph,
            hooks: inner.hooks.clone(),
            validation: self.options.validation,
        })
    }

    /// Content of the sealed registry, used to create containers
    pub(crate) fn sealed(&self) -> Result<Arc<Sealed>> {
        match &self.inner.read().phase {
            Phase::Open => Err(WiringError::NotSealed),
            Phase::Failed(err) => Err(WiringError::SealFailed(Box::new(err.clone()))),
            Phase::Sealed(sealed) => Ok(sealed.clone()),
        }
    }
}
