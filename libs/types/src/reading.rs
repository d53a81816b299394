//! Reading kinds, inbound payloads, and aggregated readings
//!
//! Detectors publish one message per lane per kind per measurement interval.
//! The collector folds those lane-level values into a single
//! `AggregatedReading` per detector per interval.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detector::DetectorId;

/// The measured quantity carried by a lane-level message.
///
/// Raw units: km/h for speed, plain vehicle count, tenths of a second for
/// gap time. The kind token is the trailing segment of the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadingKind {
    Speed,
    Count,
    GapTime,
}

impl ReadingKind {
    /// The topic/record token for this kind.
    pub fn token(&self) -> &'static str {
        match self {
            ReadingKind::Speed => "vehicle-speed",
            ReadingKind::Count => "vehicle-count",
            ReadingKind::GapTime => "vehicle-gap-time",
        }
    }

    /// Parse a topic token into a kind. Returns None for any other token
    /// (auxiliary fields published on the same topic tree are not measured).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "vehicle-speed" => Some(ReadingKind::Speed),
            "vehicle-count" => Some(ReadingKind::Count),
            "vehicle-gap-time" => Some(ReadingKind::GapTime),
            _ => None,
        }
    }

    /// All measured kinds.
    pub fn all() -> &'static [ReadingKind] {
        &[ReadingKind::Speed, ReadingKind::Count, ReadingKind::GapTime]
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Structured payload of one inbound sensor message.
///
/// Only `Value` and `CreateUtc` are interpreted by the collector; the
/// remaining fields are broker metadata passed through untouched.
/// `CreateUtc` is an ISO-8601 timestamp string with no offset (UTC implied)
/// and identifies the measurement interval the value belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "CreateUtc")]
    pub create_utc: String,
    #[serde(rename = "Desc", default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(rename = "Unit", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "Format", default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "ExpiryUtc", default, skip_serializing_if = "Option::is_none")]
    pub expiry_utc: Option<String>,
}

/// A fully decoded lane-level reading, ready for aggregation.
///
/// Produced by the ingestion loop from a routing key plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneReading {
    pub detector_id: DetectorId,
    pub kind: ReadingKind,
    pub value: f64,
    /// Interval-identifying timestamp (the payload's `CreateUtc`)
    pub timestamp: String,
}

/// The consolidated output of one closed measurement interval.
///
/// `speed` and `gap_time` are zero-filtered lane averages truncated toward
/// zero; `count` is the lane sum. Emitted at most once per
/// (detector, interval) and immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedReading {
    pub detector_id: DetectorId,
    /// Timestamp of the closed interval (not of the message that closed it)
    pub time: String,
    /// Lane-average speed in km/h
    pub speed: i64,
    /// Lane-sum vehicle count
    pub count: i64,
    /// Lane-average gap time in seconds (raw values are tenths of a second)
    pub gap_time: i64,
}
