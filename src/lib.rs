//! Dependency injection container with explicit, statically typed bindings.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use bindgraph::*;
//! // Define traits and implementors
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Polite {
//!     name: Arc<String>,
//! }
//!
//! impl Greeter for Polite {
//!     fn greet(&self) -> String {
//!         format!("Hello {}", self.name)
//!     }
//! }
//!
//! # fn main() -> Result<(), WiringError> {
//! // Declare the bindings and their dependencies
//! let registry = Registry::new();
//! registry.register_singleton(Key::<String>::named("name"), (), |()| Ok("world".to_string()))?;
//! registry.register_transient(
//!     Key::<dyn Greeter>::new(),
//!     (Key::<String>::named("name"),),
//!     |(name,)| Ok(Arc::new(Polite { name }) as Arc<dyn Greeter>),
//! )?;
//!
//! // Validate the graph and create a container
//! registry.seal()?;
//! let container = Container::new(&registry)?;
//! let greeter: Arc<dyn Greeter> = container.resolve(&Key::new())?;
//! assert_eq!(greeter.greet(), "Hello world");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! Bindings are identified by a [TypeKey]: the [std::any::TypeId] of the produced type and an
//! optional qualifier. Nothing is discovered at runtime: each binding names the keys it depends on
//! when it is declared, and the typed [Key] wrappers let the compiler check that the factory of a
//! binding receives the instances it declares and produces the type of its key.
//!
//! * The [Registry] collects [Binding]s, at most one per key. Sealing the registry builds the
//!   dependency graph and checks it for missing bindings and cycles before any factory runs.
//! * The [Container] resolves keys from a sealed registry. Each resolution follows an instantiation
//!   order in which every dependency precedes its dependents.
//! * A [Scope::Singleton] binding is built at most once per container, even when several threads
//!   request it concurrently. A [Scope::Transient] binding is built for each resolution.

mod binding;
mod cache;
mod container;
mod error;
mod graph;
mod key;
mod registry;

pub use binding::{downcast, erase, Binding, Dependencies, Instance, Scope};
pub use container::{Container, Lazy};
pub use error::{BoxError, FactoryError, Result, WiringError};
pub use key::{Key, TypeKey};
pub use registry::{Module, Registry, RegistryOptions, Validation};

#[cfg(test)]
mod tests;
