//! Resolution of instances from a sealed registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use tracing::{debug, info, trace};

use crate::binding::{downcast, Instance, Scope};
use crate::cache::InstanceCache;
use crate::error::{Result, WiringError};
use crate::graph::NodeId;
use crate::key::{Key, TypeKey};
use crate::registry::{Registry, Sealed};

/// Dependency injection container.
///
/// The container shares the bindings of a sealed [Registry] and owns the singleton instances
/// created from them. Cloning a container is cheap and clones share their singletons: an
/// application creates one container and passes it explicitly to the code needing it.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

struct Inner {
    sealed: Arc<Sealed>,
    cache: InstanceCache,
    /// Instantiation order of each node, computed on first use
    plans: Vec<OnceCell<Arc<[NodeId]>>>,
}

impl Container {
    /// Create a container from a sealed registry.
    ///
    /// Eager singletons are instantiated, then the init hooks are called in registration order.
    pub fn new(registry: &Registry) -> Result<Self> {
        let sealed = registry.sealed()?;
        let graph = &sealed.graph;
        let cache = InstanceCache::new(
            (0..graph.len())
                .map(|n| graph.binding(n))
                .filter(|b| b.scope() == Scope::Singleton)
                .map(|b| b.key()),
        );
        let plans = (0..graph.len()).map(|_| OnceCell::new()).collect();
        let container = Self {
            inner: Arc::new(Inner {
                sealed: sealed.clone(),
                cache,
                plans,
            }),
        };

        let mut eager = 0;
        for node in 0..graph.len() {
            if graph.binding(node).is_eager() {
                container.resolve_node(node)?;
                eager += 1;
            }
        }
        for (key, hook) in &sealed.hooks {
            debug!(key = %key, "Running init hook");
            hook(&container)?;
        }
        info!(
            bindings = graph.len(),
            eager,
            hooks = sealed.hooks.len(),
            "Container ready"
        );
        Ok(container)
    }

    /// Obtain the instance bound to a key
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self, key: &Key<T>) -> Result<Arc<T>> {
        let instance = self.resolve_key(key.type_key())?;
        downcast(key.type_key(), &instance)
    }

    /// Alias of [Container::resolve]
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, key: &Key<T>) -> Result<Arc<T>> {
        self.resolve(key)
    }

    /// Obtain the type-erased instance bound to a key
    pub fn resolve_key(&self, key: &TypeKey) -> Result<Instance> {
        let graph = &self.inner.sealed.graph;
        let node = graph
            .lookup(key)
            .ok_or_else(|| WiringError::UnboundDependency {
                key: key.clone(),
                requested_by: None,
                registered: graph.keys().cloned().collect(),
            })?;
        self.resolve_node(node)
    }

    /// Deferred access to the instance bound to a key.
    ///
    /// The handle does not keep the container alive.
    pub fn lazy<T: ?Sized + Send + Sync + 'static>(&self, key: &Key<T>) -> Lazy<T> {
        Lazy {
            container: Arc::downgrade(&self.inner),
            key: key.clone(),
        }
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.inner.sealed.graph.lookup(key).is_some()
    }

    /// Check if the singleton bound to a key was already created
    pub fn is_instantiated(&self, key: &TypeKey) -> bool {
        self.inner.cache.is_ready(key)
    }

    /// Number of singletons created so far
    pub fn instantiated_count(&self) -> usize {
        self.inner.cache.ready_count()
    }

    /// Bound keys, in registration order
    pub fn keys(&self) -> Vec<TypeKey> {
        self.inner.sealed.graph.keys().cloned().collect()
    }

    fn plan(&self, node: NodeId) -> Result<&Arc<[NodeId]>> {
        self.inner.plans[node].get_or_try_init(|| {
            let plan = self.inner.sealed.graph.plan(node)?;
            trace!(
                key = %self.inner.sealed.graph.binding(node).key(),
                steps = plan.len(),
                "Computed instantiation plan"
            );
            Ok(Arc::from(plan))
        })
    }

    fn resolve_node(&self, node: NodeId) -> Result<Instance> {
        let graph = &self.inner.sealed.graph;
        let cache = &self.inner.cache;
        let binding = graph.binding(node);
        trace!(key = %binding.key(), scope = %binding.scope(), "Resolving");

        if binding.scope() == Scope::Singleton {
            if let Some(instance) = cache.get(binding.key()) {
                return Ok(instance);
            }
        }
        let plan = self.plan(node)?;

        // Walk the plan backwards to skip the dependencies of already created singletons
        let mut needed = HashSet::from([node]);
        for &step in plan.iter().rev() {
            if !needed.contains(&step) {
                continue;
            }
            let b = graph.binding(step);
            if b.scope() == Scope::Singleton && cache.is_ready(b.key()) {
                continue;
            }
            needed.extend(graph.edges(step));
        }

        let mut produced: HashMap<NodeId, Instance> = HashMap::with_capacity(needed.len());
        for &step in plan.iter().filter(|s| needed.contains(*s)) {
            let b = graph.binding(step);
            let instance = match b.scope() {
                Scope::Singleton => cache.get_or_create(b.key(), || self.construct(step, &produced))?,
                Scope::Transient => self.construct(step, &produced)?,
            };
            produced.insert(step, instance);
        }
        produced
            .remove(&node)
            .ok_or_else(|| WiringError::UnboundDependency {
                key: binding.key().clone(),
                requested_by: None,
                registered: graph.keys().cloned().collect(),
            })
    }

    /// Run the factory of a node with the instances of its dependencies
    fn construct(&self, node: NodeId, produced: &HashMap<NodeId, Instance>) -> Result<Instance> {
        let graph = &self.inner.sealed.graph;
        let args = graph
            .edges(node)
            .map(|dep| match produced.get(&dep) {
                Some(instance) => Ok(instance.clone()),
                None => self.resolve_node(dep),
            })
            .collect::<Result<Vec<_>>>()?;
        let binding = graph.binding(node);
        trace!(key = %binding.key(), "Invoking factory");
        binding.produce(&args)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.inner.sealed.graph.len())
            .field("validation", &self.inner.sealed.validation)
            .field("instantiated", &self.instantiated_count())
            .finish()
    }
}

/// Deferred resolution of a key.
///
/// Each call to [Lazy::get] resolves the key again: singletons are shared and transients are
/// rebuilt. The handle only holds a weak reference to its container.
pub struct Lazy<T: ?Sized> {
    container: Weak<Inner>,
    key: Key<T>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub fn get(&self) -> Result<Arc<T>> {
        let inner = self.container.upgrade().ok_or_else(|| WiringError::ContainerDropped {
            key: self.key.type_key().clone(),
        })?;
        Container { inner }.resolve(&self.key)
    }

    pub fn key(&self) -> &Key<T> {
        &self.key
    }
}

impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            key: self.key.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lazy({})", self.key)
    }
}
