//! Error types for the telemetry collector
//!
//! Per-message errors (malformed topic or payload, unregistered detector)
//! are recovered locally inside the ingestion loop: the message is dropped
//! and logged, and the subscription keeps running. Store errors are retried
//! with bounded backoff before the aggregate is dropped.

use thiserror::Error;

/// Top-level collector error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectError {
    #[error("Malformed topic: {0}")]
    MalformedTopic(#[from] TopicError),

    #[error("Unknown detector: {detector_id}")]
    UnknownDetector { detector_id: String },

    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Topic-decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("Too few segments: expected at least {expected}, got {actual}")]
    TooFewSegments { expected: usize, actual: usize },

    #[error("Detector segment lacks id separator: {segment}")]
    MissingIdSeparator { segment: String },
}

/// Persistence-layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Corrupt record for key {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_error_display() {
        let err = TopicError::TooFewSegments {
            expected: 12,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Too few segments: expected at least 12, got 4"
        );
    }

    #[test]
    fn test_collect_error_from_topic_error() {
        let topic_err = TopicError::MissingIdSeparator {
            segment: "det773".to_string(),
        };
        let err: CollectError = topic_err.into();
        assert!(matches!(err, CollectError::MalformedTopic(_)));
    }

    #[test]
    fn test_collect_error_from_store_error() {
        let store_err = StoreError::Unavailable {
            message: "connection refused".to_string(),
        };
        let err: CollectError = store_err.into();
        assert!(err.to_string().contains("connection refused"));
    }
}
