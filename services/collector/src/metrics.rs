//! Observability counters for the collector service
//!
//! Dropped messages and store-write failures are observable only here and
//! in the logs; downstream consumers just see a gap in the retained series.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Core counters for the ingestion pipeline.
#[derive(Debug, Default)]
pub struct CollectorMetrics {
    // Inbound
    pub messages_received: AtomicU64,
    pub malformed_topics: AtomicU64,
    pub malformed_payloads: AtomicU64,
    pub unknown_detectors: AtomicU64,
    pub kinds_ignored: AtomicU64,

    // Aggregation
    pub intervals_closed: AtomicU64,
    pub stale_flushes: AtomicU64,

    // Persistence
    pub store_retries: AtomicU64,
    pub store_write_failures: AtomicU64,
}

impl CollectorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_topic(&self) {
        self.malformed_topics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_payload(&self) {
        self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_detector(&self) {
        self.unknown_detectors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kind_ignored(&self) {
        self.kinds_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interval_closed(&self) {
        self.intervals_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_flush(&self) {
        self.stale_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_retry(&self) {
        self.store_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Export all counters for exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert(
            "messages_received".to_string(),
            self.messages_received.load(Ordering::Relaxed),
        );
        m.insert(
            "malformed_topics".to_string(),
            self.malformed_topics.load(Ordering::Relaxed),
        );
        m.insert(
            "malformed_payloads".to_string(),
            self.malformed_payloads.load(Ordering::Relaxed),
        );
        m.insert(
            "unknown_detectors".to_string(),
            self.unknown_detectors.load(Ordering::Relaxed),
        );
        m.insert(
            "kinds_ignored".to_string(),
            self.kinds_ignored.load(Ordering::Relaxed),
        );
        m.insert(
            "intervals_closed".to_string(),
            self.intervals_closed.load(Ordering::Relaxed),
        );
        m.insert(
            "stale_flushes".to_string(),
            self.stale_flushes.load(Ordering::Relaxed),
        );
        m.insert(
            "store_retries".to_string(),
            self.store_retries.load(Ordering::Relaxed),
        );
        m.insert(
            "store_write_failures".to_string(),
            self.store_write_failures.load(Ordering::Relaxed),
        );
        m
    }
}
