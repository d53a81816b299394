//! Per-detector interval accumulator
//!
//! Buffers the raw lane-level values received for the currently open
//! measurement interval of one detector. All buffered values belong to the
//! single `open_timestamp`; the accumulator holds at most one open interval
//! at a time.
//!
//! Aggregation rules on close:
//! - speed and gap time: arithmetic mean of the values `> 0`, truncated
//!   toward zero to an integer (sensors emit `0` or negative as a
//!   "no detection" sentinel); empty filtered set aggregates to `0`
//! - gap time is additionally scaled by `0.1` before truncation (raw unit
//!   is tenths of a second)
//! - count: plain sum of all buffered values, zeros included

use std::time::Duration;

use tokio::time::Instant;
use types::detector::DetectorId;
use types::reading::{AggregatedReading, ReadingKind};

/// Raw gap-time unit is tenths of a second.
const GAP_TIME_SCALE: f64 = 0.1;

/// Buffers for one detector's open measurement interval.
#[derive(Debug, Default)]
pub struct IntervalAccumulator {
    /// Timestamp identifying the open interval; None before the first message.
    open_timestamp: Option<String>,
    speeds: Vec<f64>,
    counts: Vec<f64>,
    gap_times: Vec<f64>,
    /// Arrival time of the most recent buffered value (drives stale flush).
    last_update: Option<Instant>,
}

impl IntervalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the open interval, if one is open.
    pub fn open_timestamp(&self) -> Option<&str> {
        self.open_timestamp.as_deref()
    }

    /// Whether an interval is currently open.
    pub fn is_open(&self) -> bool {
        self.open_timestamp.is_some()
    }

    /// Open a new interval. Buffers must already be empty (fresh accumulator
    /// or just closed).
    pub fn open(&mut self, timestamp: String) {
        debug_assert!(self.speeds.is_empty() && self.counts.is_empty() && self.gap_times.is_empty());
        self.open_timestamp = Some(timestamp);
    }

    /// Buffer one lane-level value for the open interval.
    pub fn push(&mut self, kind: ReadingKind, value: f64) {
        match kind {
            ReadingKind::Speed => self.speeds.push(value),
            ReadingKind::Count => self.counts.push(value),
            ReadingKind::GapTime => self.gap_times.push(value),
        }
        self.last_update = Some(Instant::now());
    }

    /// Number of values buffered across all kinds.
    pub fn buffered(&self) -> usize {
        self.speeds.len() + self.counts.len() + self.gap_times.len()
    }

    /// How long the accumulator has been idle since its last buffered value.
    pub fn idle_for(&self) -> Option<Duration> {
        self.last_update.map(|at| at.elapsed())
    }

    /// Close the open interval: compute the aggregate stamped with the
    /// interval's own timestamp, and clear all buffers.
    ///
    /// Returns None if no interval is open.
    pub fn close(&mut self, detector_id: &DetectorId) -> Option<AggregatedReading> {
        let time = self.open_timestamp.take()?;
        let reading = AggregatedReading {
            detector_id: detector_id.clone(),
            time,
            speed: filtered_mean_trunc(&self.speeds, 1.0),
            count: self.counts.iter().sum::<f64>() as i64,
            gap_time: filtered_mean_trunc(&self.gap_times, GAP_TIME_SCALE),
        };
        self.speeds.clear();
        self.counts.clear();
        self.gap_times.clear();
        self.last_update = None;
        Some(reading)
    }
}

/// Mean of the strictly positive values, scaled, truncated toward zero.
/// An empty filtered set yields 0.
fn filtered_mean_trunc(values: &[f64], scale: f64) -> i64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.iter().filter(|v| **v > 0.0) {
        sum += v;
        n += 1;
    }
    if n == 0 {
        return 0;
    }
    (sum / n as f64 * scale) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det() -> DetectorId {
        DetectorId::new("773")
    }

    #[test]
    fn test_close_before_open_is_none() {
        let mut acc = IntervalAccumulator::new();
        assert!(!acc.is_open());
        assert!(acc.close(&det()).is_none());
    }

    #[test]
    fn test_speed_zero_filtered_mean() {
        let mut acc = IntervalAccumulator::new();
        acc.open("T0".to_string());
        acc.push(ReadingKind::Speed, 30.0);
        acc.push(ReadingKind::Speed, 42.0);
        acc.push(ReadingKind::Speed, 0.0); // no-detection sentinel
        let reading = acc.close(&det()).unwrap();
        assert_eq!(reading.speed, 36); // (30 + 42) / 2
        assert_eq!(reading.time, "T0");
    }

    #[test]
    fn test_all_nonpositive_speed_aggregates_to_zero() {
        let mut acc = IntervalAccumulator::new();
        acc.open("T0".to_string());
        acc.push(ReadingKind::Speed, 0.0);
        acc.push(ReadingKind::Speed, -1.0);
        let reading = acc.close(&det()).unwrap();
        assert_eq!(reading.speed, 0);
    }

    #[test]
    fn test_count_sums_including_zeros() {
        let mut acc = IntervalAccumulator::new();
        acc.open("T0".to_string());
        acc.push(ReadingKind::Count, 2.0);
        acc.push(ReadingKind::Count, 0.0);
        acc.push(ReadingKind::Count, 1.0);
        let reading = acc.close(&det()).unwrap();
        assert_eq!(reading.count, 3);
    }

    #[test]
    fn test_gap_time_scaled_to_seconds() {
        let mut acc = IntervalAccumulator::new();
        acc.open("T0".to_string());
        acc.push(ReadingKind::GapTime, 55.0); // tenths of a second
        acc.push(ReadingKind::GapTime, 0.0);
        let reading = acc.close(&det()).unwrap();
        assert_eq!(reading.gap_time, 5); // 55 * 0.1 = 5.5, truncated
    }

    #[test]
    fn test_empty_kind_aggregates_to_zero() {
        let mut acc = IntervalAccumulator::new();
        acc.open("T0".to_string());
        acc.push(ReadingKind::Speed, 50.0);
        let reading = acc.close(&det()).unwrap();
        assert_eq!(reading.speed, 50);
        assert_eq!(reading.count, 0);
        assert_eq!(reading.gap_time, 0);
    }

    #[test]
    fn test_mean_truncates_toward_zero() {
        let mut acc = IntervalAccumulator::new();
        acc.open("T0".to_string());
        acc.push(ReadingKind::Speed, 30.0);
        acc.push(ReadingKind::Speed, 41.0);
        let reading = acc.close(&det()).unwrap();
        assert_eq!(reading.speed, 35); // 35.5 truncated
    }

    #[test]
    fn test_close_clears_buffers_for_reuse() {
        let mut acc = IntervalAccumulator::new();
        acc.open("T0".to_string());
        acc.push(ReadingKind::Speed, 99.0);
        acc.close(&det()).unwrap();

        acc.open("T1".to_string());
        acc.push(ReadingKind::Speed, 10.0);
        let reading = acc.close(&det()).unwrap();
        assert_eq!(reading.speed, 10);
        assert_eq!(reading.time, "T1");
    }

    #[test]
    fn test_idle_tracking() {
        let mut acc = IntervalAccumulator::new();
        assert!(acc.idle_for().is_none());
        acc.open("T0".to_string());
        acc.push(ReadingKind::Count, 1.0);
        assert!(acc.idle_for().is_some());
        acc.close(&det()).unwrap();
        assert!(acc.idle_for().is_none());
    }
}
