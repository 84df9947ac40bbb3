//! # Dependency resolution.
//!
//! Turns the registry into a loading order in three passes:
//!
//! ```text
//! bind slots ──► derive edges ──► Kahn sort (min-heap, synthetic root)
//!    │                                   │
//!    └─ DependencyNotFound               └─ DependencyCycle
//! ```
//!
//! ## Rules
//! - Every slot is bound exactly once, before anything starts.
//! - A name target must exist and have the slot's type; a capability target binds to
//!   the first *other* service, in registration order, that answers to it.
//! - A missing required target is an error even for `nowait` slots.
//! - Only `required && !nowait` slots order the start.
//! - Ties are broken by registration order, so the result is deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::core::registry::Registry;
use crate::error::ConfigError;
use crate::services::{ServiceRef, Slot, Target};

/// Binds every slot and returns the services in a valid start order.
pub(crate) fn resolve(registry: &Registry) -> Result<Vec<ServiceRef>, ConfigError> {
    let entries = registry.entries();
    let deps = edges(registry)?;

    // Synthetic root at index `n`, depending on every real service.
    let n = entries.len();
    let root = n;
    let mut pending = vec![0usize; n + 1];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
    for (owner, targets) in deps.iter().enumerate() {
        for &target in targets {
            pending[owner] += 1;
            dependents[target].push(owner);
        }
        pending[root] += 1;
        dependents[owner].push(root);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..=n)
        .filter(|&i| pending[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        if node == root {
            continue;
        }
        order.push(node);
        for &next in &dependents[node] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() < n {
        let remaining: Vec<bool> = (0..n).map(|i| pending[i] > 0).collect();
        let services = find_cycle(&deps, &remaining)
            .into_iter()
            .map(|i| entries[i].name().to_string())
            .collect();
        return Err(ConfigError::DependencyCycle { services });
    }

    Ok(order.into_iter().map(|i| entries[i].clone()).collect())
}

/// Binds slots and returns, per service, the indices it must start after.
fn edges(registry: &Registry) -> Result<Vec<Vec<usize>>, ConfigError> {
    let entries = registry.entries();
    let mut deps = vec![Vec::new(); entries.len()];

    for (owner, handle) in entries.iter().enumerate() {
        for slot in handle.slots() {
            let target = match slot.bound_to() {
                Some(name) => registry.position(name),
                None => bind(registry, owner, slot),
            };
            match target {
                Some(pos) => {
                    if slot.required() && !slot.nowait() {
                        deps[owner].push(pos);
                    }
                }
                None if slot.required() => {
                    return Err(ConfigError::DependencyNotFound {
                        service: handle.name().to_string(),
                        dependency: slot.target().to_string(),
                    });
                }
                None => {
                    tracing::debug!(
                        service = %handle.name(),
                        dependency = %slot.target(),
                        "optional dependency not found"
                    );
                }
            }
        }
    }
    Ok(deps)
}

fn bind(registry: &Registry, owner: usize, slot: &dyn Slot) -> Option<usize> {
    let entries = registry.entries();
    match slot.target() {
        Target::Name(name) => {
            let pos = registry.position(name)?;
            slot.bind(&entries[pos]).then_some(pos)
        }
        Target::Capability(cap) => {
            let mut candidates = entries
                .iter()
                .enumerate()
                .filter(|(i, h)| *i != owner && h.answers_to(cap) && slot.accepts(h));
            let (pos, found) = candidates.next()?;
            if let Some((_, other)) = candidates.next() {
                tracing::warn!(
                    service = %entries[owner].name(),
                    capability = %cap,
                    chosen = %found.name(),
                    skipped = %other.name(),
                    "several services answer to capability, first registered wins"
                );
            }
            slot.bind(found).then_some(pos)
        }
    }
}

/// Walks dependencies among the unsorted nodes until one repeats.
///
/// Every unsorted node still waits on another unsorted node, so the walk closes.
fn find_cycle(deps: &[Vec<usize>], remaining: &[bool]) -> Vec<usize> {
    let Some(mut cur) = remaining.iter().position(|&r| r) else {
        return Vec::new();
    };
    let mut path = Vec::new();
    let mut seen = HashMap::new();
    loop {
        if let Some(&at) = seen.get(&cur) {
            return path.split_off(at);
        }
        seen.insert(cur, path.len());
        path.push(cur);
        match deps[cur].iter().copied().find(|&d| remaining[d]) {
            Some(next) => cur = next,
            None => return (0..remaining.len()).filter(|&i| remaining[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Capability, Dependency, Interfaces, Service, ServiceHandle};
    use std::sync::Arc;

    #[derive(Default)]
    struct Node {
        slots: Vec<Box<dyn Slot>>,
    }

    impl Node {
        fn with(mut self, slot: impl Slot + 'static) -> Self {
            self.slots.push(Box::new(slot));
            self
        }
    }

    impl Service for Node {
        fn slots(&self) -> Vec<&dyn Slot> {
            self.slots.iter().map(|s| s.as_ref()).collect()
        }
    }

    struct Leaf;
    impl Service for Leaf {}

    fn registry(services: Vec<ServiceRef>) -> Registry {
        let mut reg = Registry::new(false);
        for s in services {
            reg.insert(s).unwrap();
        }
        reg
    }

    fn node(name: &str, node: Node) -> ServiceRef {
        Arc::new(ServiceHandle::new(name, node))
    }

    fn names(order: &[ServiceRef]) -> Vec<&str> {
        order.iter().map(|h| h.name()).collect()
    }

    #[test]
    fn independent_services_keep_registration_order() {
        let reg = registry(vec![node("a", Node::default()), node("b", Node::default())]);
        let order = resolve(&reg).unwrap();
        assert_eq!(names(&order), ["a", "b"]);
    }

    #[test]
    fn dependency_starts_first_and_is_bound() {
        let a = node("a", Node::default().with(Dependency::<Node>::named("b")));
        let reg = registry(vec![a.clone(), node("b", Node::default())]);

        let order = resolve(&reg).unwrap();
        assert_eq!(names(&order), ["b", "a"]);

        let a = a.downcast::<Node>().unwrap();
        assert_eq!(a.slots[0].bound_to(), Some("b"));
    }

    #[test]
    fn capability_binds_first_other_match() {
        let a = node(
            "a",
            Node::default()
                .with(Dependency::<Leaf>::new())
                .with(Dependency::<Node>::new().optional()),
        );
        let reg = registry(vec![
            a.clone(),
            Arc::new(ServiceHandle::new("leaf-1", Leaf)),
            Arc::new(ServiceHandle::new("leaf-2", Leaf)),
        ]);

        let order = resolve(&reg).unwrap();
        assert_eq!(names(&order), ["leaf-1", "a", "leaf-2"]);

        let a = a.downcast::<Node>().unwrap();
        assert_eq!(a.slots[0].bound_to(), Some("leaf-1"));
        // the owner never satisfies its own capability slot
        assert_eq!(a.slots[1].bound_to(), None);
    }

    #[test]
    fn nowait_breaks_a_cycle() {
        let reg = registry(vec![
            node("a", Node::default().with(Dependency::<Node>::named("b"))),
            node("b", Node::default().with(Dependency::<Node>::named("a").nowait())),
        ]);
        let order = resolve(&reg).unwrap();
        assert_eq!(names(&order), ["b", "a"]);
    }

    #[test]
    fn mutual_dependency_is_a_cycle() {
        let reg = registry(vec![
            node("a", Node::default().with(Dependency::<Node>::named("b"))),
            node("b", Node::default().with(Dependency::<Node>::named("a"))),
            node("c", Node::default()),
        ]);
        let err = resolve(&reg).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DependencyCycle {
                services: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn missing_required_dependency_fails_even_when_nowait() {
        for slot in [
            Dependency::<Node>::named("missing"),
            Dependency::<Node>::named("missing").nowait(),
        ] {
            let reg = registry(vec![node("a", Node::default().with(slot))]);
            let err = resolve(&reg).unwrap_err();
            assert_eq!(
                err,
                ConfigError::DependencyNotFound {
                    service: "a".into(),
                    dependency: "missing".into()
                }
            );
        }
    }

    #[test]
    fn missing_optional_dependency_is_skipped() {
        let a = node(
            "a",
            Node::default().with(Dependency::<Node>::named("missing").optional()),
        );
        let reg = registry(vec![a]);
        assert_eq!(names(&resolve(&reg).unwrap()), ["a"]);
    }

    #[test]
    fn named_target_of_wrong_type_is_not_found() {
        let reg = registry(vec![
            node("a", Node::default().with(Dependency::<Leaf>::named("b"))),
            node("b", Node::default()),
        ]);
        assert!(matches!(
            resolve(&reg),
            Err(ConfigError::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn every_ordered_edge_points_backwards() {
        let edges = [
            ("top", "left"),
            ("top", "right"),
            ("left", "bottom"),
            ("right", "bottom"),
            ("bottom", "c1"),
            ("c1", "c2"),
            ("c2", "c3"),
        ];
        let mut services = Vec::new();
        for name in ["top", "left", "right", "bottom", "c1", "c2", "c3"] {
            let mut n = Node::default();
            for (_, dep) in edges.iter().filter(|(owner, _)| *owner == name) {
                n = n.with(Dependency::<Node>::named(*dep));
            }
            if name == "c3" {
                // would close a cycle if it ordered the start
                n = n.with(Dependency::<Node>::named("top").nowait());
            }
            services.push(node(name, n));
        }

        let order = resolve(&registry(services)).unwrap();
        let order = names(&order);
        assert_eq!(order, ["c3", "c2", "c1", "bottom", "left", "right", "top"]);

        let at = |name: &str| order.iter().position(|n| *n == name).unwrap();
        for (owner, dep) in edges {
            assert!(at(dep) < at(owner), "{dep} must start before {owner}");
        }
    }

    trait Cache: Send + Sync {
        fn backend(&self) -> &'static str;
    }

    struct RedisCache;
    struct MemoryCache;

    impl Cache for RedisCache {
        fn backend(&self) -> &'static str {
            "redis"
        }
    }

    impl Cache for MemoryCache {
        fn backend(&self) -> &'static str {
            "memory"
        }
    }

    impl Service for RedisCache {
        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::named("cache")]
        }

        fn interfaces(self: Arc<Self>, out: &mut Interfaces) {
            out.add::<dyn Cache>(self);
        }
    }

    impl Service for MemoryCache {
        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::named("cache")]
        }

        fn interfaces(self: Arc<Self>, out: &mut Interfaces) {
            out.add::<dyn Cache>(self);
        }
    }

    struct Users {
        cache: Dependency<dyn Cache>,
    }

    impl Service for Users {
        fn slots(&self) -> Vec<&dyn Slot> {
            vec![&self.cache]
        }
    }

    fn users(name: &str, cache: Dependency<dyn Cache>) -> ServiceRef {
        Arc::new(ServiceHandle::new(name, Users { cache }))
    }

    #[test]
    fn capability_binds_any_type_exposing_the_interface() {
        for (cache, backend) in [
            (Arc::new(ServiceHandle::new("cache", RedisCache)) as ServiceRef, "redis"),
            (Arc::new(ServiceHandle::new("cache", MemoryCache)) as ServiceRef, "memory"),
        ] {
            let owner = users(
                "users",
                Dependency::with_capability(Capability::named("cache")),
            );
            let reg = registry(vec![owner.clone(), cache]);

            let order = resolve(&reg).unwrap();
            assert_eq!(names(&order), ["cache", "users"]);

            let owner = owner.downcast::<Users>().unwrap();
            assert_eq!(owner.cache.require().unwrap().backend(), backend);
        }
    }

    #[test]
    fn interface_slots_bind_by_tag_and_by_name() {
        let by_tag = users("by-tag", Dependency::new());
        let by_name = users("by-name", Dependency::named("redis"));
        let reg = registry(vec![
            by_tag.clone(),
            by_name.clone(),
            Arc::new(ServiceHandle::new("memory", MemoryCache)),
            Arc::new(ServiceHandle::new("redis", RedisCache)),
        ]);

        let order = resolve(&reg).unwrap();
        assert_eq!(names(&order), ["memory", "by-tag", "redis", "by-name"]);

        let by_tag = by_tag.downcast::<Users>().unwrap();
        let by_name = by_name.downcast::<Users>().unwrap();
        assert_eq!(by_tag.cache.name(), Some("memory"));
        assert_eq!(by_tag.cache.require().unwrap().backend(), "memory");
        assert_eq!(by_name.cache.require().unwrap().backend(), "redis");
    }
}
