//! Detector identity and roster types
//!
//! A detector is a physical roadside sensor (thermal or radar) identified by
//! a stable numeric ID embedded in its publish topics. The set of detectors
//! the collector serves is fixed at startup from an externally loaded roster.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a physical detector
///
/// Parsed from the `det-<id>-<lane>` segment of a routing key. The same
/// detector ID covers every lane of the installation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectorId(String);

impl DetectorId {
    /// Create a new DetectorId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DetectorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A single roster entry describing one registered detector.
///
/// `topics` holds the topic-group prefixes the detector publishes under;
/// the collector subscribes to each with a trailing `#` wildcard so that
/// all lane/kind messages arrive on one loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorInfo {
    /// Detector identifier
    pub id: DetectorId,
    /// Topic-group prefixes (slash-terminated) this detector publishes under
    pub topics: Vec<String>,
    /// Optional display metadata (not interpreted by the collector)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The fixed set of detectors served by one collector instance.
///
/// Enumerated once at startup; no dynamic add/remove mid-run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    detectors: Vec<DetectorInfo>,
}

impl Roster {
    /// Build a roster from a list of entries.
    pub fn new(detectors: Vec<DetectorInfo>) -> Self {
        Self { detectors }
    }

    /// All registered detector IDs.
    pub fn ids(&self) -> impl Iterator<Item = &DetectorId> {
        self.detectors.iter().map(|d| &d.id)
    }

    /// Whether the given detector is registered.
    pub fn contains(&self, id: &DetectorId) -> bool {
        self.detectors.iter().any(|d| &d.id == id)
    }

    /// Look up a roster entry by detector ID.
    pub fn get(&self, id: &DetectorId) -> Option<&DetectorInfo> {
        self.detectors.iter().find(|d| &d.id == id)
    }

    /// Iterate over roster entries.
    pub fn iter(&self) -> impl Iterator<Item = &DetectorInfo> {
        self.detectors.iter()
    }

    /// Number of registered detectors.
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}
