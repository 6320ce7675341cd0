use std::sync::{Arc, Mutex};

use bindgraph::*;
use proptest::prelude::*;

/// Random acyclic graphs: node `i` may only depend on nodes with a lower index
fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..4))
            .collect::<Vec<_>>()
            .prop_map(|lists| {
                lists
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut deps)| {
                        deps.retain(|&d| d < i);
                        deps.sort_unstable();
                        deps.dedup();
                        deps
                    })
                    .collect()
            })
    })
}

fn key(i: usize) -> TypeKey {
    TypeKey::named::<usize>(format!("node{}", i))
}

fn build(graph: &[Vec<usize>], scope: Scope, order: Arc<Mutex<Vec<usize>>>) -> Registry {
    let registry = Registry::new();
    // Register in reverse so that registration order never matches the dependency order
    for (i, deps) in graph.iter().enumerate().rev() {
        let order = order.clone();
        registry
            .register(Binding::from_raw(
                key(i),
                deps.iter().map(|&d| key(d)).collect(),
                scope,
                move |_| {
                    order.lock().unwrap().push(i);
                    Ok(erase(Arc::new(i)))
                },
            ))
            .unwrap();
    }
    registry.seal().unwrap();
    registry
}

fn reachable(graph: &[Vec<usize>], root: usize) -> Vec<usize> {
    let mut seen = vec![false; graph.len()];
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        if !seen[n] {
            seen[n] = true;
            stack.extend(&graph[n]);
        }
    }
    (0..graph.len()).filter(|&n| seen[n]).collect()
}

proptest! {
    #[test]
    fn dependencies_are_built_before_dependents(graph in dag(), transient in any::<bool>()) {
        let scope = if transient { Scope::Transient } else { Scope::Singleton };
        let order = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new(&build(&graph, scope, order.clone())).unwrap();
        let root = graph.len() - 1;

        let value = container.resolve_key(&key(root)).unwrap();
        prop_assert_eq!(*downcast::<usize>(&key(root), &value).unwrap(), root);

        let order = order.lock().unwrap();
        let mut built = order.clone();
        built.sort_unstable();
        prop_assert_eq!(built, reachable(&graph, root));
        for (pos, &node) in order.iter().enumerate() {
            for dep in &graph[node] {
                let dep_pos = order.iter().position(|n| n == dep);
                prop_assert!(matches!(dep_pos, Some(p) if p < pos));
            }
        }
    }
}
