//! Detector traffic simulator
//!
//! Generates the lane-level message streams real detectors publish: one
//! message per lane per kind per measurement interval, on correctly shaped
//! routing keys, with the broker's payload schema. Seeded RNG makes every
//! run reproducible, so pipeline tests can assert exact aggregates.
//!
//! # Modules
//! - `generator`: Roster-driven message generation, one interval at a time

pub mod generator;

/// Crate version constant
pub const VERSION: &str = "0.1.0";
