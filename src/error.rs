use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::key::TypeKey;

/// Boxed error returned by user factories and hooks
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

pub type Result<T, E = WiringError> = std::result::Result<T, E>;

/// Errors triggered while declaring, validating or resolving bindings
#[derive(Error, Debug, Clone)]
pub enum WiringError {
    #[error("Duplicate binding: {key} is already bound")]
    DuplicateBinding { key: TypeKey },

    #[error("Registry is sealed: cannot register {key}")]
    RegistrySealed { key: TypeKey },

    #[error("Registry is not sealed: call seal() before building a container")]
    NotSealed,

    #[error("Registry failed validation when it was sealed: {0}")]
    SealFailed(Box<WiringError>),

    #[error("{}", unbound_message(.key, .requested_by.as_ref(), .registered))]
    UnboundDependency {
        key: TypeKey,
        requested_by: Option<TypeKey>,
        registered: Vec<TypeKey>,
    },

    #[error("Cyclic dependency detected while resolving {}: {}", cycle_origin(.path), chain(.path))]
    CyclicDependency { path: Vec<TypeKey> },

    #[error("Transient binding {key} cannot be eagerly instantiated")]
    EagerTransient { key: TypeKey },

    #[error("Type mismatch: the instance bound to {key} does not have the requested type {expected}")]
    TypeMismatch {
        key: TypeKey,
        expected: &'static str,
    },

    #[error("Container dropped: cannot resolve {key} from a lazy handle")]
    ContainerDropped { key: TypeKey },

    #[error(transparent)]
    Factory(#[from] FactoryError),
}

impl WiringError {
    /// Keys involved in this error, for diagnostics
    pub fn keys(&self) -> Vec<&TypeKey> {
        match self {
            WiringError::DuplicateBinding { key }
            | WiringError::RegistrySealed { key }
            | WiringError::EagerTransient { key }
            | WiringError::ContainerDropped { key }
            | WiringError::TypeMismatch { key, .. } => vec![key],
            WiringError::UnboundDependency {
                key, requested_by, ..
            } => std::iter::once(key).chain(requested_by.as_ref()).collect(),
            WiringError::CyclicDependency { path } => path.iter().collect(),
            WiringError::Factory(e) => vec![e.key()],
            WiringError::SealFailed(e) => e.keys(),
            WiringError::NotSealed => vec![],
        }
    }
}

fn unbound_message(key: &TypeKey, requested_by: Option<&TypeKey>, registered: &[TypeKey]) -> String {
    let requester = match requested_by {
        Some(r) => format!(" required by {}", r),
        None => String::new(),
    };
    format!(
        "Unbound dependency: no binding for {}{}. Registered bindings: [{}]",
        key,
        requester,
        join(registered, ", ")
    )
}

fn cycle_origin(path: &[TypeKey]) -> String {
    path.last().map(ToString::to_string).unwrap_or_default()
}

fn chain(path: &[TypeKey]) -> String {
    join(path, " -> ")
}

fn join(keys: &[TypeKey], sep: &str) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Failure raised by user code while producing the instance of a binding.
///
/// The underlying error is shared so that a single failed attempt can be reported
/// to every caller that was waiting on it.
#[derive(Clone)]
pub struct FactoryError {
    key: TypeKey,
    stage: Stage,
    source: Arc<dyn Error + Send + Sync + 'static>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Factory,
    InitHook,
}

impl FactoryError {
    pub(crate) fn new(key: TypeKey, source: BoxError) -> Self {
        Self {
            key,
            stage: Stage::Factory,
            source: Arc::from(source),
        }
    }

    pub(crate) fn init_hook(key: TypeKey, source: BoxError) -> Self {
        Self {
            key,
            stage: Stage::InitHook,
            source: Arc::from(source),
        }
    }

    /// Key of the binding whose factory failed
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Check if the failure happened in a post-initialization hook rather than in the factory
    pub fn is_init_hook(&self) -> bool {
        self.stage == Stage::InitHook
    }

    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.source
    }
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Stage::Factory => write!(f, "Factory for {} failed: {}", self.key, self.source),
            Stage::InitHook => write!(f, "Init hook for {} failed: {}", self.key, self.source),
        }
    }
}

impl fmt::Debug for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryError")
            .field("key", &self.key)
            .field("stage", &self.stage)
            .field("source", &self.source)
            .finish()
    }
}

impl Error for FactoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn cycle_message_lists_the_chain() {
        let err = WiringError::CyclicDependency {
            path: vec![TypeKey::of::<A>(), TypeKey::of::<B>(), TypeKey::of::<A>()],
        };
        let msg = err.to_string();
        assert!(msg.contains("error::tests::A -> "), "{}", msg);
        assert!(msg.contains("error::tests::B -> "), "{}", msg);
        assert_eq!(err.keys().len(), 3);
    }

    #[test]
    fn unbound_message_names_requester_and_registered_keys() {
        let err = WiringError::UnboundDependency {
            key: TypeKey::named::<u16>("port"),
            requested_by: Some(TypeKey::of::<String>()),
            registered: vec![TypeKey::of::<String>()],
        };
        let msg = err.to_string();
        assert!(msg.contains("no binding for u16@port"), "{}", msg);
        assert!(msg.contains("required by alloc::string::String"), "{}", msg);
        assert!(msg.ends_with("[alloc::string::String]"), "{}", msg);
    }

    #[test]
    fn factory_error_keeps_its_source() {
        let source: BoxError = "boom".into();
        let err: WiringError = FactoryError::new(TypeKey::of::<A>(), source).into();
        let copy = err.clone();
        assert!(copy.to_string().ends_with("failed: boom"));
        let WiringError::Factory(inner) = copy else {
            panic!("unexpected error {:?}", err);
        };
        assert!(!inner.is_init_hook());
        assert_eq!(inner.inner().to_string(), "boom");
        assert!(Error::source(&inner).is_some());
    }
}
