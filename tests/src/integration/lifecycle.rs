//! # Lifecycle Integration Tests
//!
//! Manager lifecycle driven across the bus and real feature implementations:
//! retries, teardown order, unregistering, concurrent callers, features that
//! talk to each other over the bus.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use feature_manager::FeatureManager;
    use kernel_bus::{topics, EventBus, ListenerId};
    use kernel_types::{
        EventPayload, Feature, FeatureConfig, FeatureError, FeatureId, FeatureStatus,
        KernelConfig, KernelError,
    };
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::fixtures::{journal, EventRecorder, ScriptedFeature};

    fn enabled(config: KernelConfig, ids: &[&str]) -> KernelConfig {
        ids.iter()
            .fold(config, |c, id| c.with_feature(*id, FeatureConfig::enabled()))
    }

    fn manager(config: KernelConfig) -> (Arc<EventBus>, Arc<FeatureManager>) {
        let bus = Arc::new(EventBus::new());
        let manager = Arc::new(FeatureManager::new(Arc::clone(&bus), config));
        (bus, manager)
    }

    #[tokio::test]
    async fn test_failed_feature_retries_from_error() {
        let (bus, manager) = manager(KernelConfig::new());
        let recorder = EventRecorder::attach(&bus, &[topics::FEATURE_ERROR]);
        let log = journal();
        let feature = ScriptedFeature::new("flaky", &log).failing_init().shared();
        manager.register_feature(feature.clone());

        let err = manager.initialize_feature("flaky").await.unwrap_err();
        assert!(matches!(err, KernelError::Initialization { .. }));
        assert_eq!(manager.feature_status("flaky"), Some(FeatureStatus::Error));
        assert_eq!(recorder.feature_ids(topics::FEATURE_ERROR), vec!["flaky"]);

        feature.set_fail_init(false);
        manager.initialize_feature("flaky").await.unwrap();
        assert_eq!(manager.feature_status("flaky"), Some(FeatureStatus::Active));
        assert_eq!(feature.init_calls(), 2);
    }

    #[tokio::test]
    async fn test_full_cycle_tears_down_in_reverse_order() {
        let (bus, manager) = manager(enabled(KernelConfig::new(), &["db", "cache", "api"]));
        let recorder = EventRecorder::attach(&bus, &[topics::FEATURE_DEINITIALIZED]);
        let log = journal();
        manager.register_feature(ScriptedFeature::new("api", &log).depends_on(&["cache", "db"]).shared());
        manager.register_feature(ScriptedFeature::new("cache", &log).depends_on(&["db"]).shared());
        manager.register_feature(ScriptedFeature::new("db", &log).shared());

        manager.initialize().await.unwrap();
        manager.deinitialize().await;

        assert_eq!(
            *log.lock(),
            vec!["init:db", "init:cache", "init:api", "deinit:api", "deinit:cache", "deinit:db"]
        );
        assert_eq!(
            recorder.feature_ids(topics::FEATURE_DEINITIALIZED),
            vec!["api", "cache", "db"]
        );
    }

    #[tokio::test]
    async fn test_teardown_failure_does_not_stop_others() {
        let (_bus, manager) = manager(enabled(KernelConfig::new(), &["a", "b"]));
        let log = journal();
        manager.register_feature(ScriptedFeature::new("a", &log).shared());
        manager.register_feature(ScriptedFeature::new("b", &log).depends_on(&["a"]).failing_deinit().shared());

        manager.initialize().await.unwrap();
        manager.deinitialize().await;

        assert_eq!(manager.feature_status("a"), Some(FeatureStatus::Disabled));
        assert_eq!(manager.feature_status("b"), Some(FeatureStatus::Error));
        assert!(manager.last_error("b").unwrap().contains("scripted failure"));
    }

    #[tokio::test]
    async fn test_unregister_active_feature() {
        let (bus, manager) = manager(KernelConfig::new());
        let recorder = EventRecorder::attach(
            &bus,
            &[topics::FEATURE_REGISTERED, topics::FEATURE_UNREGISTERED],
        );
        let log = journal();
        manager.register_feature(ScriptedFeature::new("temp", &log).shared());
        manager.initialize_feature("temp").await.unwrap();

        manager.unregister_feature("temp").await.unwrap();

        assert!(!manager.is_registered("temp"));
        assert_eq!(*log.lock(), vec!["init:temp", "deinit:temp"]);
        assert_eq!(recorder.feature_ids(topics::FEATURE_REGISTERED), vec!["temp"]);
        assert_eq!(recorder.feature_ids(topics::FEATURE_UNREGISTERED), vec!["temp"]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let (_bus, manager) = manager(enabled(KernelConfig::new(), &["dup"]));
        let log = journal();
        let first = ScriptedFeature::new("dup", &log).shared();
        let second = ScriptedFeature::new("dup", &log).shared();

        assert!(manager.register_feature(first.clone()));
        assert!(!manager.register_feature(second.clone()));

        manager.initialize().await.unwrap();
        assert_eq!(first.init_calls(), 1);
        assert_eq!(second.init_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize_runs_batch_once() {
        let (_bus, manager) = manager(enabled(KernelConfig::new(), &["slow"]));
        let log = journal();
        let feature = ScriptedFeature::new("slow", &log)
            .slow_init(Duration::from_millis(50))
            .shared();
        manager.register_feature(feature.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.initialize().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(feature.init_calls(), 1);
        assert!(manager.is_initialized());
        assert_eq!(manager.feature_status("slow"), Some(FeatureStatus::Active));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_caller_sees_transition_in_progress() {
        let (_bus, manager) = manager(KernelConfig::new());
        let log = journal();
        manager.register_feature(
            ScriptedFeature::new("slow", &log)
                .slow_init(Duration::from_millis(200))
                .shared(),
        );

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.initialize_feature("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = manager.initialize_feature("slow").await.unwrap_err();
        assert_eq!(
            err,
            KernelError::TransitionInProgress {
                feature_id: "slow".into(),
                status: FeatureStatus::Initializing,
            }
        );

        first.await.unwrap().unwrap();
        assert_eq!(manager.feature_status("slow"), Some(FeatureStatus::Active));
    }

    #[tokio::test]
    async fn test_runtime_dependency_override() {
        let (_bus, manager) = manager(enabled(KernelConfig::new(), &["a", "b"]));
        let log = journal();
        manager.register_feature(ScriptedFeature::new("a", &log).shared());
        manager.register_feature(ScriptedFeature::new("b", &log).shared());

        manager.update_feature_config("a", FeatureConfig::enabled().with_dependencies(["b"]));
        manager.initialize_enabled_features().await.unwrap();

        assert_eq!(*log.lock(), vec!["init:b", "init:a"]);
        assert_eq!(manager.get_dependents("b"), vec!["a"]);
    }

    #[tokio::test]
    async fn test_strict_mode_toggle_changes_policy() {
        let (_bus, manager) = manager(enabled(KernelConfig::new(), &["orphan"]));
        let log = journal();
        manager.register_feature(ScriptedFeature::new("orphan", &log).depends_on(&["ghost"]).shared());

        manager.initialize_enabled_features().await.unwrap();

        manager.set_strict_mode(true);
        assert!(manager.strict_mode());
        let err = manager.initialize_enabled_features().await.unwrap_err();
        assert!(matches!(err, KernelError::MissingDependency { .. }));
    }

    // =========================================================================
    // FEATURES TALKING OVER THE BUS
    // =========================================================================

    /// Publishes `clock:tick` on every `tick()` while active.
    struct Clock {
        bus: Arc<EventBus>,
    }

    #[async_trait]
    impl Feature for Clock {
        fn id(&self) -> &str {
            "clock"
        }
        fn name(&self) -> &str {
            "Clock"
        }
        async fn initialize(&self) -> Result<(), FeatureError> {
            self.bus
                .emit("clock:tick", EventPayload::new("clock", json!({ "tick": 0 })))
                .map(|_| ())
                .map_err(|e| FeatureError::initialization("clock", e.to_string()))
        }
        async fn deinitialize(&self) -> Result<(), FeatureError> {
            Ok(())
        }
    }

    /// Subscribes to `clock:tick` while active.
    struct Counter {
        bus: Arc<EventBus>,
        ticks: Arc<Mutex<Vec<u64>>>,
        subscription: Mutex<Option<ListenerId>>,
    }

    #[async_trait]
    impl Feature for Counter {
        fn id(&self) -> &str {
            "counter"
        }
        fn name(&self) -> &str {
            "Counter"
        }
        fn dependencies(&self) -> Vec<FeatureId> {
            vec!["clock".into()]
        }
        async fn initialize(&self) -> Result<(), FeatureError> {
            let ticks = Arc::clone(&self.ticks);
            let id = self.bus.on("clock:tick", move |payload| {
                ticks.lock().push(payload.data["tick"].as_u64().unwrap_or_default());
                Ok(())
            });
            *self.subscription.lock() = Some(id);
            Ok(())
        }
        async fn deinitialize(&self) -> Result<(), FeatureError> {
            if let Some(id) = self.subscription.lock().take() {
                self.bus.remove_listener("clock:tick", id);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_features_communicate_over_bus() {
        let (bus, manager) = manager(enabled(KernelConfig::new(), &["clock", "counter"]));
        let ticks = Arc::new(Mutex::new(Vec::new()));
        manager.register_feature(Arc::new(Counter {
            bus: Arc::clone(&bus),
            ticks: Arc::clone(&ticks),
            subscription: Mutex::new(None),
        }));
        manager.register_feature(Arc::new(Clock {
            bus: Arc::clone(&bus),
        }));

        manager.initialize().await.unwrap();
        // The clock's initial tick went out before the counter subscribed.
        assert!(ticks.lock().is_empty());

        bus.emit("clock:tick", EventPayload::new("clock", json!({ "tick": 1 })))
            .unwrap();
        assert_eq!(*ticks.lock(), vec![1]);

        manager.deinitialize().await;
        assert_eq!(bus.listener_count("clock:tick"), 0);
    }
}
