//! # Dispatch Integration Tests
//!
//! Event bus behaviour under real lifecycle traffic from the manager:
//! isolation of misbehaving listeners and middleware, once-listeners across a
//! whole batch, nested emits from inside handlers, metrics in the report.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use feature_manager::{FeatureManager, MANAGER_SOURCE};
    use kernel_bus::{topics, EventBus, METRICS_WINDOW};
    use kernel_types::{EventPayload, FeatureConfig, FeatureStatus, KernelConfig};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::fixtures::{journal, ScriptedFeature};

    fn chain(bus: &Arc<EventBus>) -> FeatureManager {
        let config = ["a", "b", "c"].iter().fold(KernelConfig::new(), |c, id| {
            c.with_feature(*id, FeatureConfig::enabled())
        });
        let manager = FeatureManager::new(Arc::clone(bus), config);
        let log = journal();
        manager.register_feature(ScriptedFeature::new("a", &log).shared());
        manager.register_feature(ScriptedFeature::new("b", &log).depends_on(&["a"]).shared());
        manager.register_feature(ScriptedFeature::new("c", &log).depends_on(&["b"]).shared());
        manager
    }

    #[tokio::test]
    async fn test_misbehaving_listeners_do_not_affect_lifecycle() {
        let bus = Arc::new(EventBus::new());
        bus.add_listener(
            topics::FEATURE_STATUS_CHANGED,
            |_| Err("listener refused".into()),
            10,
            false,
        );
        bus.add_listener(
            topics::FEATURE_INITIALIZED,
            |_| panic!("listener exploded"),
            10,
            false,
        );
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        bus.on(topics::FEATURE_STATUS_CHANGED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let manager = chain(&bus);
        manager.initialize().await.unwrap();

        assert_eq!(manager.get_active_features(), vec!["a", "b", "c"]);
        assert_eq!(delivered.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_once_listener_fires_once_across_batch() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.once(
            topics::FEATURE_INITIALIZED,
            move |payload| {
                sink.lock().push(payload.data["featureId"].clone());
                Ok(())
            },
            0,
        );

        let manager = chain(&bus);
        manager.initialize().await.unwrap();

        assert_eq!(*seen.lock(), vec![json!("a")]);
        assert_eq!(bus.listener_count(topics::FEATURE_INITIALIZED), 0);
    }

    #[tokio::test]
    async fn test_middleware_annotates_lifecycle_events() {
        let bus = Arc::new(EventBus::new());
        bus.add_middleware(|topic, payload| {
            Ok(payload.clone().with_metadata("node", json!(format!("node-1/{topic}"))))
        });
        bus.add_middleware(|_, _| Err("middleware refused".into()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(topics::FEATURE_INITIALIZED, move |payload| {
            sink.lock().push((
                payload.source.clone(),
                payload.metadata_value("node").cloned(),
            ));
            Ok(())
        });

        let manager = chain(&bus);
        manager.initialize().await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        for (source, node) in seen.iter() {
            assert_eq!(source, MANAGER_SOURCE);
            assert_eq!(node, &Some(json!("node-1/FEATURE_INITIALIZED")));
        }
    }

    #[tokio::test]
    async fn test_nested_emit_from_lifecycle_listener_runs_inline() {
        let bus = Arc::new(EventBus::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_order = Arc::clone(&order);
        bus.on("app:ready", move |payload| {
            inner_order
                .lock()
                .push(format!("ready:{}", payload.data["featureId"].as_str().unwrap_or("")));
            Ok(())
        });

        let relay_bus = Arc::clone(&bus);
        let relay_order = Arc::clone(&order);
        bus.on(topics::FEATURE_INITIALIZED, move |payload| {
            let id = payload.data["featureId"].as_str().unwrap_or("").to_string();
            relay_order.lock().push(format!("initialized:{id}"));
            relay_bus.emit("app:ready", EventPayload::new("relay", json!({ "featureId": id })))?;
            Ok(())
        });

        let manager = chain(&bus);
        manager.initialize().await.unwrap();

        assert_eq!(
            *order.lock(),
            vec![
                "initialized:a",
                "ready:a",
                "initialized:b",
                "ready:b",
                "initialized:c",
                "ready:c",
            ]
        );
    }

    #[tokio::test]
    async fn test_listener_observes_status_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let manager = Arc::new(chain(&bus));

        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        let weak = Arc::downgrade(&manager);
        bus.on(topics::FEATURE_INITIALIZED, move |payload| {
            if let (Some(manager), Some(id)) = (weak.upgrade(), payload.data["featureId"].as_str()) {
                sink.lock().push(manager.feature_status(id));
            }
            Ok(())
        });

        manager.initialize().await.unwrap();
        assert_eq!(*observed.lock(), vec![Some(FeatureStatus::Active); 3]);
    }

    #[tokio::test]
    async fn test_report_metrics_window_is_capped() {
        let bus = Arc::new(EventBus::new());
        bus.on("noise", |_| Ok(()));
        for n in 0..(METRICS_WINDOW + 50) {
            bus.emit("noise", EventPayload::new("test", json!({ "n": n })))
                .unwrap();
        }

        let manager = chain(&bus);
        manager.initialize().await.unwrap();

        let report = manager.report();
        assert_eq!(report.event_metrics["noise"].count, METRICS_WINDOW);
        assert_eq!(report.event_metrics[topics::FEATURE_INITIALIZED].count, 3);
        assert!(report.events_emitted >= (METRICS_WINDOW + 50) as u64);
    }
}
