use std::sync::{Arc, Mutex};

use super::*;

trait TestTrait: Send + Sync {
    fn cheers(&self) -> &'static str;
}

#[derive(Default)]
struct SecretImpl {}
impl TestTrait for SecretImpl {
    fn cheers(&self) -> &'static str {
        "here is the secret ingredient"
    }
}

trait TestActionable: Send + Sync {
    fn get_helper(&self) -> Arc<dyn TestTrait>;
}

struct ConcreteActionable {
    helper: Arc<dyn TestTrait>,
}

impl ConcreteActionable {
    fn new(helper: Arc<dyn TestTrait>) -> Self {
        Self { helper }
    }
}

impl TestActionable for ConcreteActionable {
    fn get_helper(&self) -> Arc<dyn TestTrait> {
        self.helper.clone()
    }
}

fn test_module(registry: &Registry) -> Result<()> {
    registry.register_singleton(Key::<dyn TestTrait>::new(), (), |()| {
        Ok(Arc::new(SecretImpl::default()) as Arc<dyn TestTrait>)
    })?;
    registry.register_transient(
        Key::<dyn TestActionable>::new(),
        (Key::<dyn TestTrait>::new(),),
        |(helper,)| Ok(Arc::new(ConcreteActionable::new(helper)) as Arc<dyn TestActionable>),
    )
}

// Disable clippy lint on the comparison of fat pointers:
// this is only test code comparing instances of the same concrete type
#[allow(clippy::vtable_address_comparisons)]
#[test]
fn resolve_singleton() -> Result<()> {
    let registry = Registry::new();
    registry.register_module(&test_module)?;
    registry.seal()?;
    let container = Container::new(&registry)?;

    let v1 = container.resolve(&Key::<dyn TestTrait>::new())?;
    let v2 = container.resolve(&Key::<dyn TestTrait>::new())?;
    assert_eq!(v1.cheers(), "here is the secret ingredient");
    assert!(Arc::ptr_eq(&v1, &v2));

    // retrieve two on-demand instances: they are different but share the same helper
    let a1 = container.resolve(&Key::<dyn TestActionable>::new())?;
    let a2 = container.get(&Key::<dyn TestActionable>::new())?;
    assert!(!Arc::ptr_eq(&a1, &a2));
    let (h1, h2) = (a1.get_helper(), a2.get_helper());
    assert!(Arc::ptr_eq(&h1, &h2));

    Ok(())
}

#[test]
fn chained_strings_in_dependency_order() -> Result<()> {
    let order = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new();

    let log = order.clone();
    registry.register_singleton(Key::<String>::named("A"), (), move |()| {
        log.lock().unwrap().push("A");
        Ok("a".to_string())
    })?;
    let log = order.clone();
    registry.register_singleton(
        Key::<String>::named("B"),
        (Key::<String>::named("A"),),
        move |(a,)| {
            log.lock().unwrap().push("B");
            Ok(format!("{}b", a))
        },
    )?;
    let log = order.clone();
    registry.register_singleton(
        Key::<String>::named("C"),
        (Key::<String>::named("B"),),
        move |(b,)| {
            log.lock().unwrap().push("C");
            Ok(format!("{}c", b))
        },
    )?;
    registry.seal()?;

    let container = Container::new(&registry)?;
    assert_eq!(*container.resolve(&Key::<String>::named("C"))?, "abc");
    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
    Ok(())
}

#[test]
fn seal_reports_cycles() {
    struct A;
    struct B;
    let registry = Registry::new();
    registry
        .register_singleton(Key::<A>::new(), (Key::<B>::new(),), |(_b,)| Ok(A))
        .unwrap();
    registry
        .register_transient(Key::<B>::new(), (Key::<A>::new(),), |(_a,)| Ok(B))
        .unwrap();

    match registry.seal() {
        Err(WiringError::CyclicDependency { path }) => {
            assert!(path.contains(&TypeKey::of::<A>()));
            assert!(path.contains(&TypeKey::of::<B>()));
            assert_eq!(path.first(), path.last());
        }
        other => panic!("unexpected result {:?}", other),
    }
    match Container::new(&registry) {
        Err(WiringError::SealFailed(e)) => {
            assert!(matches!(*e, WiringError::CyclicDependency { .. }))
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn seal_reports_unbound_keys() {
    struct Service;
    let registry = Registry::new();
    registry
        .register_singleton(
            Key::<Service>::new(),
            (Key::<u16>::named("port"),),
            |(_port,)| Ok(Service),
        )
        .unwrap();
    match registry.seal() {
        Err(WiringError::UnboundDependency {
            key, requested_by, ..
        }) => {
            assert_eq!(key, TypeKey::named::<u16>("port"));
            assert_eq!(requested_by, Some(TypeKey::of::<Service>()));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn factory_errors_reach_the_caller() {
    #[derive(Debug)]
    struct Unreachable;
    impl std::fmt::Display for Unreachable {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("database unreachable")
        }
    }
    impl std::error::Error for Unreachable {}

    let registry = Registry::new();
    registry
        .register_singleton(Key::<u32>::new(), (), |()| -> Result<u32, BoxError> {
            Err(Box::new(Unreachable))
        })
        .unwrap();
    registry
        .register_transient(Key::<String>::new(), (Key::<u32>::new(),), |(n,)| Ok(n.to_string()))
        .unwrap();
    registry.seal().unwrap();
    let container = Container::new(&registry).unwrap();

    let err = container.resolve(&Key::<String>::new()).map(|_| ()).unwrap_err();
    let WiringError::Factory(failure) = &err else {
        panic!("unexpected error {:?}", err);
    };
    assert_eq!(failure.key(), &TypeKey::of::<u32>());
    assert!(failure.inner().downcast_ref::<Unreachable>().is_some());
    assert_eq!(err.keys(), vec![&TypeKey::of::<u32>()]);
    assert!(!container.is_instantiated(&TypeKey::of::<u32>()));
}
