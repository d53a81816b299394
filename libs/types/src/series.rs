//! Persisted per-detector series record and retention policy
//!
//! One record is stored per detector key: four parallel arrays holding the
//! history of aggregated readings. Downstream readers (dashboards) index the
//! arrays positionally, so the i-th element of each array must describe the
//! same closed interval. An interval with no readings for a kind still
//! appends a `0` placeholder, never skips; that alignment is the record's
//! core invariant.

use serde::{Deserialize, Serialize};

use crate::reading::AggregatedReading;

/// Bounds on the length of a retained series.
///
/// When a series reaches `max_len`, it is bulk-trimmed down to `trim_to`
/// (oldest entries discarded) before the next append. Trimming in bulk
/// amortizes the full read-modify-write cycle against the store instead of
/// popping one element per append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Flush ceiling: length at which a trim is triggered
    pub max_len: usize,
    /// Post-trim floor: length after a trim (must be < max_len)
    pub trim_to: usize,
}

impl RetentionPolicy {
    /// A usable policy trims to a floor strictly below a nonzero ceiling.
    pub fn is_valid(&self) -> bool {
        self.max_len > 0 && self.trim_to < self.max_len
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_len: 6000,
            trim_to: 5760,
        }
    }
}

/// The per-detector store record: four index-aligned series.
///
/// Field names are the wire names downstream consumers expect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectorSeries {
    #[serde(rename = "vehicle-speed")]
    pub speed: Vec<i64>,
    #[serde(rename = "vehicle-count")]
    pub count: Vec<i64>,
    #[serde(rename = "vehicle-gap-time")]
    pub gap_time: Vec<i64>,
    #[serde(rename = "time")]
    pub time: Vec<String>,
}

impl DetectorSeries {
    /// An empty record (created at detector registration).
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retained intervals.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether any intervals are retained.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Check the index-alignment invariant across all four series.
    pub fn is_aligned(&self) -> bool {
        let n = self.time.len();
        self.speed.len() == n && self.count.len() == n && self.gap_time.len() == n
    }

    /// Append one closed interval's aggregate to all four series.
    pub fn push(&mut self, reading: &AggregatedReading) {
        self.speed.push(reading.speed);
        self.count.push(reading.count);
        self.gap_time.push(reading.gap_time);
        self.time.push(reading.time.clone());
    }

    /// Trim to the retention floor if the series has reached the ceiling.
    ///
    /// Returns the number of intervals discarded (0 if no trim fired).
    pub fn trim_if_full(&mut self, policy: &RetentionPolicy) -> usize {
        // An inverted policy (floor at or above the current length) must not
        // underflow into a giant drain; it just trims nothing.
        if self.len() < policy.max_len || policy.trim_to >= self.len() {
            return 0;
        }
        let excess = self.len() - policy.trim_to;
        self.speed.drain(..excess);
        self.count.drain(..excess);
        self.gap_time.drain(..excess);
        self.time.drain(..excess);
        excess
    }
}
