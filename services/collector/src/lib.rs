//! Traffic Telemetry Collector
//!
//! Consumes lane-level detector messages from a pub/sub topic tree and
//! produces one aggregated reading per detector per measurement interval,
//! persisted as bounded per-detector series in a keyed store:
//! - Topic decoding (detector ID + reading kind from the routing key)
//! - Per-detector interval accumulation with reactive boundary detection
//! - Lane aggregation (zero-filtered averages, lane-summed counts)
//! - Bounded-retention series persistence with bulk trimming
//!
//! # Architecture
//!
//! ```text
//! Broker messages (one per lane per kind)
//!        │
//!    ┌───▼────┐
//!    │ Topic  │  ← (detector_id, kind) from the routing key
//!    │ Codec  │
//!    └───┬────┘
//!        │
//!    ┌───▼────┐
//!    │ Engine │  ← one accumulator per detector, closes intervals
//!    └───┬────┘     on timestamp change
//!        │ AggregatedReading
//!    ┌───▼────────┐
//!    │ Retention  │  ← read-modify-write of the per-detector
//!    │ Writer     │     series record, bulk trim at the ceiling
//!    └───┬────────┘
//!        │
//!   Key-value store
//! ```

pub mod accumulator;
pub mod config;
pub mod engine;
pub mod ingestion;
pub mod metrics;
pub mod retention;
pub mod store;
pub mod topic;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
