//! Identification of the types produced by the container.
//!
//! A [TypeKey] identifies "a type to be produced", optionally refined by a qualifier so that
//! several bindings can produce the same Rust type under different names.
//! A [Key] is the typed view of a [TypeKey], used by the public API to let the compiler check
//! that factories, dependencies and resolutions agree on the produced types.

use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Untyped identifier of a binding
#[derive(Clone)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<Cow<'static, str>>,
}

impl TypeKey {
    /// Key for the unqualified type `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            qualifier: None,
        }
    }

    /// Key for the type `T` with a qualifier.
    ///
    /// An empty qualifier is the same as no qualifier.
    pub fn named<T: ?Sized + 'static>(qualifier: impl Into<Cow<'static, str>>) -> Self {
        let qualifier = qualifier.into();
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            qualifier: if qualifier.is_empty() {
                None
            } else {
                Some(qualifier)
            },
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the underlying type, only meant for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Check if this key identifies values of type `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

// The type name is derived from the TypeId and is ignored for equality
impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.qualifier == other.qualifier
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.qualifier.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}@{}", self.type_name, q),
            None => f.write_str(self.type_name),
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self)
    }
}

/// Typed key: identifies a binding producing values of type `T`.
///
/// ```
/// # use bindgraph::{Key, TypeKey};
/// let primary = Key::<String>::named("primary");
/// let replica = Key::<String>::named("replica");
/// assert_ne!(primary, replica);
/// assert_eq!(Key::<String>::new().type_key(), &TypeKey::of::<String>());
/// ```
pub struct Key<T: ?Sized> {
    inner: TypeKey,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> Key<T> {
    pub fn new() -> Self {
        Self {
            inner: TypeKey::of::<T>(),
            _marker: PhantomData,
        }
    }

    pub fn named(qualifier: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: TypeKey::named::<T>(qualifier),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Key<T> {
    pub fn type_key(&self) -> &TypeKey {
        &self.inner
    }
}

impl<T: ?Sized + 'static> Default for Key<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: the derived ones would require T: Clone / T: PartialEq
impl<T: ?Sized> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: ?Sized> Eq for Key<T> {}

impl<T: ?Sized> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state)
    }
}

impl<T: ?Sized> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.inner)
    }
}

impl<T: ?Sized> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl<T: ?Sized> From<Key<T>> for TypeKey {
    fn from(key: Key<T>) -> Self {
        key.inner
    }
}

impl<T: ?Sized> From<&Key<T>> for TypeKey {
    fn from(key: &Key<T>) -> Self {
        key.inner.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    trait Greeter {}

    #[test]
    fn same_type_same_key() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<u32>());
        assert_eq!(TypeKey::named::<String>("x").type_id(), TypeId::of::<String>());
    }

    #[test]
    fn qualifier_is_part_of_the_key() {
        assert_ne!(TypeKey::named::<String>("a"), TypeKey::named::<String>("b"));
        assert_ne!(TypeKey::named::<String>("a"), TypeKey::of::<String>());
        assert_eq!(TypeKey::named::<String>(""), TypeKey::of::<String>());
        assert_eq!(
            TypeKey::named::<String>(String::from("db")),
            TypeKey::named::<String>("db")
        );
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(TypeKey::of::<dyn Greeter>(), 1);
        map.insert(TypeKey::named::<dyn Greeter>("loud"), 2);
        assert_eq!(map.get(&TypeKey::of::<dyn Greeter>()), Some(&1));
        assert_eq!(map.get(&TypeKey::named::<dyn Greeter>("loud")), Some(&2));
        assert_eq!(map.get(&TypeKey::of::<u8>()), None);
    }

    #[test]
    fn display() {
        assert_eq!(TypeKey::of::<u32>().to_string(), "u32");
        assert_eq!(TypeKey::named::<u32>("port").to_string(), "u32@port");
        assert_eq!(format!("{:?}", Key::<u32>::named("port")), "Key(u32@port)");
    }

    #[test]
    fn typed_key_wraps_untyped_key() {
        let key = Key::<dyn Greeter>::named("x");
        let raw: TypeKey = key.clone().into();
        assert!(raw.is::<dyn Greeter>());
        assert_eq!(raw.qualifier(), Some("x"));
        assert_eq!(&raw, key.type_key());
    }
}
