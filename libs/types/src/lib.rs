//! Types library for the traffic telemetry collector
//!
//! This library provides the core type definitions shared between the
//! collector service and the simulation tooling: detector identity and
//! roster, reading kinds and payloads, the persisted series record, and
//! the error taxonomy.
//!
//! # Modules
//! - `detector`: Detector identity and roster (DetectorId, DetectorInfo, Roster)
//! - `reading`: Reading kinds, inbound payloads, aggregated readings
//! - `series`: Persisted per-detector series record and retention policy
//! - `errors`: Error taxonomy

// Public modules
pub mod detector;
pub mod errors;
pub mod reading;
pub mod series;

// Library version constant
pub const LIB_VERSION: &str = "0.1.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::detector::*;
    pub use crate::errors::*;
    pub use crate::reading::*;
    pub use crate::series::*;
}
