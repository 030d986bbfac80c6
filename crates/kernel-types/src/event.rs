//! # Event Payload
//!
//! The envelope every emission on the event bus travels in.
//!
//! - **Bus-stamped time**: `timestamp` is filled in by the bus at emit time
//!   when the producer left it empty.
//! - **Opaque data**: `data` belongs to the producer and consumers of a topic;
//!   the kernel never reads it.
//! - **Metadata for middleware**: `metadata` is where middleware annotates a
//!   payload (trace ids, flags) without touching `data`.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A single emission on the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Unique id of this emission.
    pub id: Uuid,
    /// Topic the payload was emitted on. Set by the bus.
    pub topic: String,
    /// Milliseconds since the Unix epoch. Stamped by the bus if absent.
    pub timestamp: Option<u64>,
    /// Producer name (a feature id, `feature-manager`, ...).
    pub source: String,
    /// Producer-defined body.
    pub data: serde_json::Value,
    /// Free-form annotations, mostly written by middleware.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EventPayload {
    /// Create a payload from `source` carrying `data`.
    pub fn new(source: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: String::new(),
            timestamp: None,
            source: source.into(),
            data,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Read one metadata entry.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

/// Current Unix time in milliseconds.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
