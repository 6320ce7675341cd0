//! Production rules registered in the container.
//!
//! A [Binding] associates a [TypeKey] with a factory, a [Scope] and the explicit list of keys
//! the factory depends on. Typed constructors take a [Key] and a tuple of dependency keys
//! implementing [Dependencies]: the compiler then checks that the factory receives the
//! instances it declares and produces the type of its key.

use std::any::{type_name, Any};
use std::fmt;
use std::slice;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BoxError, FactoryError, Result, WiringError};
use crate::key::{Key, TypeKey};

/// Type-erased instance produced by a binding
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased factory: receives the instances of the declared dependencies, in order
pub(crate) type RawFactory = Arc<dyn Fn(&[Instance]) -> Result<Instance> + Send + Sync>;

/// Lifetime of the instances produced by a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One instance for the lifetime of the container
    Singleton,
    /// A new instance for each resolution
    Transient,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Transient => f.write_str("transient"),
        }
    }
}

/// Wrap a shared value into a type-erased [Instance].
///
/// Instances always hold an `Arc<T>`, which allows to bind unsized types like trait objects.
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Instance {
    Arc::new(value)
}

/// Recover a typed value from an [Instance] produced for `key`
pub fn downcast<T: ?Sized + Send + Sync + 'static>(key: &TypeKey, instance: &Instance) -> Result<Arc<T>> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| WiringError::TypeMismatch {
            key: key.clone(),
            expected: type_name::<T>(),
        })
}

/// A single production rule
#[derive(Clone)]
pub struct Binding {
    key: TypeKey,
    dependencies: Vec<TypeKey>,
    scope: Scope,
    eager: bool,
    factory: RawFactory,
}

impl Binding {
    /// Declare a shared instance built once by the factory
    pub fn singleton<T, D, R, F>(key: Key<T>, deps: D, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: Dependencies,
        R: Into<Arc<T>>,
        F: Fn(D::Instances) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        Self::typed(key, Scope::Singleton, deps, factory)
    }

    /// Declare on-demand instances built by the factory for each resolution
    pub fn transient<T, D, R, F>(key: Key<T>, deps: D, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: Dependencies,
        R: Into<Arc<T>>,
        F: Fn(D::Instances) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        Self::typed(key, Scope::Transient, deps, factory)
    }

    /// Declare a singleton for an already built value
    pub fn singleton_value<T: ?Sized + Send + Sync + 'static>(key: Key<T>, value: impl Into<Arc<T>>) -> Self {
        let value: Arc<T> = value.into();
        Self::typed(key, Scope::Singleton, (), move |()| Ok::<_, BoxError>(value.clone()))
    }

    /// Declare a binding from a type-erased factory.
    ///
    /// This is meant for integration layers producing bindings at runtime: the factory receives
    /// one instance per declared dependency, in order, and must return an instance built with [erase]
    /// for the type of `key`.
    pub fn from_raw<F>(key: TypeKey, dependencies: Vec<TypeKey>, scope: Scope, factory: F) -> Self
    where
        F: Fn(&[Instance]) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        let owner = key.clone();
        Self {
            key,
            dependencies,
            scope,
            eager: false,
            factory: Arc::new(move |resolved: &[Instance]| -> Result<Instance> {
                factory(resolved).map_err(|e| FactoryError::new(owner.clone(), e).into())
            }),
        }
    }

    fn typed<T, D, R, F>(key: Key<T>, scope: Scope, deps: D, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: Dependencies,
        R: Into<Arc<T>>,
        F: Fn(D::Instances) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        let key: TypeKey = key.into();
        let dependencies = deps.keys();
        let owner = key.clone();
        Self {
            key,
            dependencies,
            scope,
            eager: false,
            factory: Arc::new(move |resolved: &[Instance]| -> Result<Instance> {
                let args = deps.extract(resolved)?;
                match factory(args) {
                    Ok(value) => Ok(erase::<T>(value.into())),
                    Err(e) => Err(FactoryError::new(owner.clone(), e).into()),
                }
            }),
        }
    }

    /// Request the instantiation of this singleton when the container is created
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn dependencies(&self) -> &[TypeKey] {
        &self.dependencies
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub(crate) fn set_eager(&mut self) {
        self.eager = true;
    }

    /// Run the factory with the instances of the declared dependencies
    pub(crate) fn produce(&self, resolved: &[Instance]) -> Result<Instance> {
        debug_assert_eq!(resolved.len(), self.dependencies.len());
        (self.factory)(resolved)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .field("scope", &self.scope)
            .field("eager", &self.eager)
            .finish()
    }
}

/// Explicit list of dependencies of a factory.
///
/// This trait is implemented for tuples of up to 10 [Key]s. The factory of a binding
/// receives the tuple of the corresponding shared instances.
pub trait Dependencies: Send + Sync + 'static {
    /// Tuple of resolved instances handed to the factory
    type Instances;

    /// Dependency keys in declaration order
    fn keys(&self) -> Vec<TypeKey>;

    /// Extract typed instances from the resolved dependencies, in declaration order
    fn extract(&self, resolved: &[Instance]) -> Result<Self::Instances>;
}

fn next_instance<T: ?Sized + Send + Sync + 'static>(
    key: &Key<T>,
    resolved: &mut slice::Iter<'_, Instance>,
) -> Result<Arc<T>> {
    match resolved.next() {
        Some(instance) => downcast(key.type_key(), instance),
        None => Err(WiringError::TypeMismatch {
            key: key.type_key().clone(),
            expected: type_name::<T>(),
        }),
    }
}

macro_rules! dependency_tuple ({ $($param:ident)* } => {
    #[allow(non_snake_case)]
    #[allow(clippy::unused_unit)]
    impl<$($param: ?Sized + Send + Sync + 'static,)*> Dependencies for ($(Key<$param>,)*) {
        type Instances = ($(Arc<$param>,)*);

        #[inline]
        fn keys(&self) -> Vec<TypeKey> {
            let ($($param,)*) = self;
            vec![$($param.type_key().clone(),)*]
        }

        #[inline]
        #[allow(unused_variables, unused_mut)]
        fn extract(&self, resolved: &[Instance]) -> Result<Self::Instances> {
            let ($($param,)*) = self;
            let mut resolved = resolved.iter();
            Ok(($(next_instance($param, &mut resolved)?,)*))
        }
    }
});

dependency_tuple! {}
dependency_tuple! { A }
dependency_tuple! { A B }
dependency_tuple! { A B C }
dependency_tuple! { A B C D }
dependency_tuple! { A B C D E }
dependency_tuple! { A B C D E F }
dependency_tuple! { A B C D E F G }
dependency_tuple! { A B C D E F G H }
dependency_tuple! { A B C D E F G H I }
dependency_tuple! { A B C D E F G H I J }
