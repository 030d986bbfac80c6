//! Per-topic dispatch latency window.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Summary of a topic's recent dispatch latencies, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchMetrics {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Bounded rolling window of latency samples. Oldest samples fall out first.
#[derive(Debug, Clone)]
pub(crate) struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, sample_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_ms);
    }

    pub(crate) fn summary(&self) -> DispatchMetrics {
        if self.samples.is_empty() {
            return DispatchMetrics::default();
        }

        let (sum, min, max) = self.samples.iter().fold(
            (0.0_f64, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, min, max), &s| (sum + s, min.min(s), max.max(s)),
        );

        DispatchMetrics {
            avg: sum / self.samples.len() as f64,
            min,
            max,
            count: self.samples.len(),
        }
    }
}
