//! # Property Tests
//!
//! Random dependency graphs driven through a real manager.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use feature_manager::FeatureManager;
    use kernel_bus::{topics, EventBus};
    use kernel_types::{FeatureConfig, FeatureStatus, KernelConfig, KernelError};
    use proptest::prelude::*;

    use crate::fixtures::{journal, EventRecorder, ScriptedFeature};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    /// Edges `(a, b)` with `a > b` become "`f{a}` depends on `f{b}`".
    fn dag(size: usize, seeds: &[(usize, usize)]) -> HashMap<usize, Vec<usize>> {
        let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
        for &(a, b) in seeds {
            let (a, b) = (a % size, b % size);
            if a > b && !edges.get(&a).is_some_and(|d| d.contains(&b)) {
                edges.entry(a).or_default().push(b);
            }
        }
        edges
    }

    fn build(size: usize, edges: &HashMap<usize, Vec<usize>>) -> (Arc<EventBus>, FeatureManager, EventRecorder) {
        let config = (0..size).fold(KernelConfig::new(), |c, i| {
            c.with_feature(format!("f{i}"), FeatureConfig::enabled())
        });
        let bus = Arc::new(EventBus::new());
        let recorder = EventRecorder::attach(&bus, &[topics::FEATURE_INITIALIZED, topics::FEATURE_STATUS_CHANGED]);
        let manager = FeatureManager::new(Arc::clone(&bus), config);
        let log = journal();

        for i in 0..size {
            let deps: Vec<String> = edges
                .get(&i)
                .map(|d| d.iter().map(|j| format!("f{j}")).collect())
                .unwrap_or_default();
            let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
            manager.register_feature(
                ScriptedFeature::new(&format!("f{i}"), &log)
                    .depends_on(&deps)
                    .shared(),
            );
        }
        (bus, manager, recorder)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_acyclic_graphs_initialize_after_dependencies(
            size in 1usize..16,
            seeds in proptest::collection::vec((0usize..16, 0usize..16), 0..40),
        ) {
            let edges = dag(size, &seeds);
            let (_bus, manager, recorder) = build(size, &edges);

            runtime().block_on(manager.initialize_enabled_features()).unwrap();

            let order = recorder.feature_ids(topics::FEATURE_INITIALIZED);
            prop_assert_eq!(order.len(), size);
            let position: HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
            for (node, deps) in &edges {
                for dep in deps {
                    let (node, dep) = (format!("f{node}"), format!("f{dep}"));
                    prop_assert!(position[dep.as_str()] < position[node.as_str()]);
                }
            }
        }

        #[test]
        fn prop_any_back_edge_aborts_with_nothing_initialized(
            size in 2usize..12,
            seeds in proptest::collection::vec((0usize..12, 0usize..12), 0..30),
        ) {
            // A full chain f{n-1} → ... → f0 plus f0 → f{n-1} closes a cycle.
            let mut edges = dag(size, &seeds);
            for i in 1..size {
                let deps = edges.entry(i).or_default();
                if !deps.contains(&(i - 1)) {
                    deps.push(i - 1);
                }
            }
            edges.entry(0).or_default().push(size - 1);

            let (_bus, manager, recorder) = build(size, &edges);
            let err = runtime().block_on(manager.initialize_enabled_features()).unwrap_err();

            prop_assert!(matches!(err, KernelError::CircularDependency { .. }), "unexpected error");
            prop_assert!(recorder.is_empty());
            prop_assert_eq!(manager.features_with_status(FeatureStatus::Disabled).len(), size);
        }
    }
}
