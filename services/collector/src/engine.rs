//! Aggregation engine: the per-detector interval state machine
//!
//! The engine is the single owner of all interval accumulators and the only
//! code path that emits aggregated readings. One instance is constructed at
//! startup from the detector roster and driven serially by the ingestion
//! loop, with no locks or shared mutable state.
//!
//! Interval boundaries are detected reactively: a message whose timestamp
//! differs from the detector's open interval closes that interval. There is
//! no wall-clock watchdog by default, so a detector that stops publishing
//! leaves its last interval open indefinitely. `flush_stale` exists as an
//! opt-in escape hatch for that case.
//!
//! The engine does not deduplicate by message identity: replaying an
//! identical message inside an open interval buffers its value twice.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use types::detector::{DetectorId, Roster};
use types::errors::CollectError;
use types::reading::{AggregatedReading, LaneReading};

use crate::accumulator::IntervalAccumulator;

/// Per-detector aggregation state machine.
pub struct AggregationEngine {
    /// One accumulator per registered detector, created at construction.
    accumulators: HashMap<DetectorId, IntervalAccumulator>,
    /// Total lane values buffered.
    readings_buffered: u64,
    /// Total intervals closed (reactively or by flush).
    intervals_closed: u64,
}

impl AggregationEngine {
    /// Build an engine with one accumulator per roster entry.
    ///
    /// The detector set is fixed for the engine's lifetime; messages for
    /// unregistered detectors are rejected, never lazily admitted.
    pub fn new(roster: &Roster) -> Self {
        let accumulators = roster
            .ids()
            .map(|id| (id.clone(), IntervalAccumulator::new()))
            .collect::<HashMap<_, _>>();

        info!(detectors = accumulators.len(), "AggregationEngine initialized");

        Self {
            accumulators,
            readings_buffered: 0,
            intervals_closed: 0,
        }
    }

    /// Feed one decoded lane reading through the state machine.
    ///
    /// Returns the closed interval's aggregate when the reading's timestamp
    /// differs from the detector's open interval; otherwise the value is
    /// buffered and nothing is emitted. The very first reading for a
    /// detector only opens its interval.
    pub fn observe(
        &mut self,
        reading: &LaneReading,
    ) -> Result<Option<AggregatedReading>, CollectError> {
        let acc = self.accumulators.get_mut(&reading.detector_id).ok_or_else(|| {
            CollectError::UnknownDetector {
                detector_id: reading.detector_id.to_string(),
            }
        })?;

        // A differing timestamp closes the open interval; the aggregate is
        // stamped with the old timestamp, not the message's.
        let boundary = acc
            .open_timestamp()
            .is_some_and(|open| open != reading.timestamp);
        let closed = if boundary {
            acc.close(&reading.detector_id)
        } else {
            None
        };

        if !acc.is_open() {
            acc.open(reading.timestamp.clone());
        }
        acc.push(reading.kind, reading.value);
        self.readings_buffered += 1;

        if let Some(ref aggregate) = closed {
            self.intervals_closed += 1;
            debug!(
                detector_id = %aggregate.detector_id,
                time = %aggregate.time,
                speed = aggregate.speed,
                count = aggregate.count,
                gap_time = aggregate.gap_time,
                "Interval closed"
            );
        }

        Ok(closed)
    }

    /// Force-close one detector's open interval, if any.
    pub fn flush_open(&mut self, detector_id: &DetectorId) -> Option<AggregatedReading> {
        let acc = self.accumulators.get_mut(detector_id)?;
        let closed = acc.close(detector_id);
        if closed.is_some() {
            self.intervals_closed += 1;
        }
        closed
    }

    /// Force-close every interval idle longer than `max_idle`.
    ///
    /// Opt-in (driven by the grace-period tick when configured). After a
    /// stale flush the detector has no open interval, so a late lane report
    /// carrying the flushed timestamp opens a fresh interval under that same
    /// timestamp and can produce a second aggregate for it.
    pub fn flush_stale(&mut self, max_idle: Duration) -> Vec<AggregatedReading> {
        let stale: Vec<DetectorId> = self
            .accumulators
            .iter()
            .filter(|(_, acc)| {
                acc.is_open() && acc.idle_for().map(|idle| idle >= max_idle).unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut flushed = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some(aggregate) = self.flush_open(&id) {
                debug!(detector_id = %aggregate.detector_id, time = %aggregate.time, "Stale interval flushed");
                flushed.push(aggregate);
            }
        }
        flushed
    }

    /// Timestamp of the detector's open interval, if one is open.
    pub fn open_interval(&self, detector_id: &DetectorId) -> Option<&str> {
        self.accumulators
            .get(detector_id)
            .and_then(|acc| acc.open_timestamp())
    }

    /// Total lane values buffered since construction.
    pub fn readings_buffered(&self) -> u64 {
        self.readings_buffered
    }

    /// Total intervals closed since construction.
    pub fn intervals_closed(&self) -> u64 {
        self.intervals_closed
    }
}
