//! Topic codec for the detector routing-key namespace
//!
//! Routing keys are fixed-depth slash-separated paths. Segment index 10
//! (0-based) carries the detector identity as `det-<numeric-id>-<lane>`;
//! the final segment is the reading-kind token, e.g.
//!
//! ```text
//! cgmu/data/v1/ca/qc/mtl/roads/rtss/sensors/thermal/det-773-2/vehicle-speed
//! ```
//!
//! Decoding is pure: no state, no side effects.

use types::detector::{DetectorId, Roster};
use types::errors::TopicError;

/// 0-based index of the `det-<id>-<lane>` segment.
pub const DETECTOR_SEGMENT_INDEX: usize = 10;

/// Minimum segment count: the detector segment plus a trailing kind segment.
pub const MIN_SEGMENTS: usize = DETECTOR_SEGMENT_INDEX + 2;

/// Decode a routing key into the detector ID and the raw kind token.
///
/// The kind token is returned unvalidated; callers decide whether it names
/// a measured kind (`ReadingKind::from_token`) or an auxiliary field to be
/// ignored.
pub fn decode(topic: &str) -> Result<(DetectorId, &str), TopicError> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(TopicError::TooFewSegments {
            expected: MIN_SEGMENTS,
            actual: segments.len(),
        });
    }

    let raw_id = segments[DETECTOR_SEGMENT_INDEX];
    // `det-<id>-<lane>`: the detector ID sits between the first two hyphens.
    let mut parts = raw_id.splitn(3, '-');
    parts.next();
    let id = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TopicError::MissingIdSeparator {
            segment: raw_id.to_string(),
        })?;

    let kind_token = segments[segments.len() - 1];
    Ok((DetectorId::new(id), kind_token))
}

/// Turn a topic-group prefix into a `#`-suffixed subscription filter.
pub fn wildcard_filter(prefix: &str) -> String {
    format!("{prefix}#")
}

/// Build the subscription filter list for every registered detector, so all
/// lane/kind messages for the roster arrive on one loop.
pub fn subscription_filters(roster: &Roster) -> Vec<String> {
    roster
        .iter()
        .flat_map(|info| info.topics.iter())
        .map(|prefix| wildcard_filter(prefix))
        .collect()
}
