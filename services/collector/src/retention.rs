//! Retention store writer
//!
//! Owns all writes to the externally persisted per-detector series records.
//! Each append is one read-modify-write cycle against the store: fetch the
//! record, bulk-trim any series that has reached the retention ceiling,
//! append the closed interval's four fields, write the record back. One
//! collector instance owns the writes for every detector it serves, so no
//! concurrent writers race on a record.
//!
//! A failed persist is retried with bounded exponential backoff; by the
//! time `append` is called the engine's accumulator has already advanced,
//! so exhausting the retries loses exactly that one interval's aggregate.

use std::sync::Arc;

use tracing::{debug, warn};

use types::detector::Roster;
use types::errors::StoreError;
use types::reading::AggregatedReading;
use types::series::{DetectorSeries, RetentionPolicy};

use crate::config::RetryPolicy;
use crate::metrics::CollectorMetrics;
use crate::store::KeyValueStore;

/// Appends closed-interval aggregates to bounded per-detector series.
pub struct RetentionWriter<S> {
    store: Arc<S>,
    policy: RetentionPolicy,
    retry: RetryPolicy,
    metrics: Arc<CollectorMetrics>,
}

impl<S: KeyValueStore> RetentionWriter<S> {
    pub fn new(
        store: Arc<S>,
        policy: RetentionPolicy,
        retry: RetryPolicy,
        metrics: Arc<CollectorMetrics>,
    ) -> Self {
        Self {
            store,
            policy,
            retry,
            metrics,
        }
    }

    /// Ensure every registered detector has a store record before the first
    /// message can arrive. Idempotent: existing records are left untouched.
    pub async fn initialize(&self, roster: &Roster) -> Result<(), StoreError> {
        for id in roster.ids() {
            if !self.store.exists(id.as_str()).await? {
                let empty = serialize(id.as_str(), &DetectorSeries::new())?;
                self.store.set(id.as_str(), empty).await?;
                debug!(detector_id = %id, "Initialized empty series record");
            }
        }
        Ok(())
    }

    /// Append one aggregate to the detector's four series.
    ///
    /// An interval with no readings for a kind still appends that kind's `0`
    /// aggregate, keeping the four series index-aligned.
    pub async fn append(&self, reading: &AggregatedReading) -> Result<(), StoreError> {
        let key = reading.detector_id.as_str();

        let mut series = match self.store.get(key).await? {
            Some(raw) => deserialize(key, &raw)?,
            None => DetectorSeries::new(),
        };

        let trimmed = series.trim_if_full(&self.policy);
        if trimmed > 0 {
            debug!(
                detector_id = %reading.detector_id,
                trimmed,
                retained = series.len(),
                "Series trimmed to retention floor"
            );
        }

        series.push(reading);
        self.store.set(key, serialize(key, &series)?).await
    }

    /// `append`, retried with bounded exponential backoff.
    ///
    /// Returns the final error once attempts are exhausted; the caller
    /// decides how to report the dropped aggregate.
    pub async fn append_with_retry(&self, reading: &AggregatedReading) -> Result<(), StoreError> {
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1u32;
        loop {
            match self.append(reading).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.retry.max_attempts => {
                    warn!(
                        detector_id = %reading.detector_id,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Store write failed; backing off"
                    );
                    self.metrics.record_store_retry();
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The retention policy this writer enforces.
    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }
}

fn serialize(key: &str, series: &DetectorSeries) -> Result<String, StoreError> {
    serde_json::to_string(series).map_err(|err| StoreError::Corrupt {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

fn deserialize(key: &str, raw: &str) -> Result<DetectorSeries, StoreError> {
    let series: DetectorSeries = serde_json::from_str(raw).map_err(|err| StoreError::Corrupt {
        key: key.to_string(),
        reason: err.to_string(),
    })?;
    // The store is an external service; a foreign write can produce valid
    // JSON whose four arrays disagree in length. Appending to (or trimming)
    // such a record would entrench the misalignment, so it is corrupt.
    if !series.is_aligned() {
        return Err(StoreError::Corrupt {
            key: key.to_string(),
            reason: "series arrays have unequal lengths".to_string(),
        });
    }
    Ok(series)
}
