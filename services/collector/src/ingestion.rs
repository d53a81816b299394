//! Ingestion loop: from inbound broker messages to persisted aggregates
//!
//! Messages arrive serially over a single-consumer channel and are processed
//! one at a time: decode the routing key, decode the payload, feed the
//! aggregation engine, and persist any closed interval synchronously before
//! the next message. Serial delivery is what makes the per-detector state
//! machine correct without locks.
//!
//! Every per-message error is recovered here: the message is dropped, a
//! warning is logged, a counter is bumped, and the loop keeps running. Only
//! a store failure during startup initialization is fatal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use types::detector::Roster;
use types::errors::StoreError;
use types::reading::{AggregatedReading, LaneReading, ReadingKind, SensorPayload};

use crate::config::CollectorConfig;
use crate::engine::AggregationEngine;
use crate::metrics::CollectorMetrics;
use crate::retention::RetentionWriter;
use crate::store::KeyValueStore;
use crate::topic;

/// One raw message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Routing key the message was published under.
    pub topic: String,
    /// Raw payload bytes (JSON).
    pub payload: Vec<u8>,
}

/// Serial delivery seam between the broker bridge and the loop.
///
/// The broker-connection bootstrap itself lives outside this crate; it only
/// needs to push `InboundMessage`s into a `ChannelSource` sender.
#[async_trait]
pub trait MessageSource: Send {
    /// Next message, or None once the source is exhausted.
    async fn recv(&mut self) -> Option<InboundMessage>;
}

/// Message source backed by a bounded tokio mpsc channel.
pub struct ChannelSource {
    receiver: mpsc::Receiver<InboundMessage>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<InboundMessage>) -> Self {
        Self { receiver }
    }

    /// Create a bounded channel pair: the sender side belongs to the broker
    /// bridge, the source side to the ingestion loop.
    pub fn channel(capacity: usize) -> (mpsc::Sender<InboundMessage>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(receiver))
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> Option<InboundMessage> {
        self.receiver.recv().await
    }
}

/// The collector's ingestion pipeline.
pub struct IngestionLoop<S> {
    roster: Roster,
    engine: AggregationEngine,
    writer: RetentionWriter<S>,
    metrics: Arc<CollectorMetrics>,
    stale_flush_after: Option<Duration>,
}

impl<S: KeyValueStore> IngestionLoop<S> {
    pub fn new(
        roster: Roster,
        store: Arc<S>,
        config: &CollectorConfig,
        metrics: Arc<CollectorMetrics>,
    ) -> Self {
        let engine = AggregationEngine::new(&roster);
        let writer = RetentionWriter::new(
            store,
            config.retention,
            config.store_retry,
            metrics.clone(),
        );
        Self {
            roster,
            engine,
            writer,
            metrics,
            stale_flush_after: config.stale_flush_after,
        }
    }

    /// The `#`-wildcard subscription filters covering the roster.
    pub fn subscription_filters(&self) -> Vec<String> {
        topic::subscription_filters(&self.roster)
    }

    /// Run until the source is exhausted.
    ///
    /// Initializes a store record for every registered detector first, so
    /// no message can arrive ahead of its record.
    pub async fn run<M: MessageSource>(mut self, mut source: M) -> Result<(), StoreError> {
        self.writer.initialize(&self.roster).await?;
        info!(
            detectors = self.roster.len(),
            stale_flush = self.stale_flush_after.is_some(),
            "Ingestion loop started"
        );

        match self.stale_flush_after {
            Some(grace) => {
                let mut tick = tokio::time::interval_at(
                    tokio::time::Instant::now() + grace,
                    grace,
                );
                loop {
                    tokio::select! {
                        msg = source.recv() => match msg {
                            Some(msg) => self.handle_message(msg).await,
                            None => break,
                        },
                        _ = tick.tick() => self.run_stale_flush(grace).await,
                    }
                }
            }
            None => {
                while let Some(msg) = source.recv().await {
                    self.handle_message(msg).await;
                }
            }
        }

        info!(metrics = ?self.metrics.export(), "Message source closed; ingestion loop stopped");
        Ok(())
    }

    async fn handle_message(&mut self, msg: InboundMessage) {
        self.metrics.record_message();

        let (detector_id, kind_token) = match topic::decode(&msg.topic) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(topic = %msg.topic, error = %err, "Dropping message with malformed topic");
                self.metrics.record_malformed_topic();
                return;
            }
        };

        let kind = match ReadingKind::from_token(kind_token) {
            Some(kind) => kind,
            None => {
                // Auxiliary field on the same topic tree, not a measured kind.
                debug!(topic = %msg.topic, kind = kind_token, "Ignoring non-measured kind");
                self.metrics.record_kind_ignored();
                return;
            }
        };

        let payload: SensorPayload = match serde_json::from_slice(&msg.payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(topic = %msg.topic, error = %err, "Dropping message with malformed payload");
                self.metrics.record_malformed_payload();
                return;
            }
        };

        let reading = LaneReading {
            detector_id,
            kind,
            value: payload.value,
            timestamp: payload.create_utc,
        };

        match self.engine.observe(&reading) {
            Ok(Some(aggregate)) => {
                self.metrics.record_interval_closed();
                self.persist(aggregate).await;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    detector_id = %reading.detector_id,
                    error = %err,
                    "Dropping message for unregistered detector"
                );
                self.metrics.record_unknown_detector();
            }
        }
    }

    async fn persist(&mut self, aggregate: AggregatedReading) {
        if let Err(err) = self.writer.append_with_retry(&aggregate).await {
            error!(
                detector_id = %aggregate.detector_id,
                time = %aggregate.time,
                error = %err,
                "Aggregate dropped after store retries exhausted"
            );
            self.metrics.record_store_failure();
        }
    }

    async fn run_stale_flush(&mut self, grace: Duration) {
        for aggregate in self.engine.flush_stale(grace) {
            self.metrics.record_stale_flush();
            self.metrics.record_interval_closed();
            self.persist(aggregate).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::detector::{DetectorId, DetectorInfo};
    use types::series::DetectorSeries;

    use crate::store::MemoryStore;

    const TOPIC_PREFIX: &str = "cgmu/data/v1/ca/qc/mtl/roads/rtss/sensors/thermal";

    fn roster() -> Roster {
        Roster::new(vec![DetectorInfo {
            id: DetectorId::new("773"),
            topics: vec![format!("{TOPIC_PREFIX}/")],
            description: None,
        }])
    }

    fn message(det: &str, lane: u8, kind: &str, value: f64, timestamp: &str) -> InboundMessage {
        InboundMessage {
            topic: format!("{TOPIC_PREFIX}/det-{det}-{lane}/{kind}"),
            payload: format!(r#"{{"Value": {value}, "CreateUtc": "{timestamp}"}}"#).into_bytes(),
        }
    }

    async fn stored_series(store: &MemoryStore, key: &str) -> DetectorSeries {
        serde_json::from_str(&store.get(key).await.unwrap().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_run_initializes_roster_records() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(CollectorMetrics::new());
        let pipeline = IngestionLoop::new(
            roster(),
            store.clone(),
            &CollectorConfig::default(),
            metrics,
        );
        let (sender, source) = ChannelSource::channel(8);
        drop(sender);

        pipeline.run(source).await.unwrap();
        assert!(store.exists("773").await.unwrap());
        assert!(stored_series(&store, "773").await.is_empty());
    }

    #[tokio::test]
    async fn test_messages_flow_to_store() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(CollectorMetrics::new());
        let pipeline = IngestionLoop::new(
            roster(),
            store.clone(),
            &CollectorConfig::default(),
            metrics.clone(),
        );
        let (sender, source) = ChannelSource::channel(16);

        sender.send(message("773", 1, "vehicle-speed", 30.0, "T0")).await.unwrap();
        sender.send(message("773", 2, "vehicle-speed", 42.0, "T0")).await.unwrap();
        sender.send(message("773", 1, "vehicle-speed", 50.0, "T1")).await.unwrap();
        drop(sender);

        pipeline.run(source).await.unwrap();

        let series = stored_series(&store, "773").await;
        assert_eq!(series.len(), 1);
        assert_eq!(series.speed, vec![36]);
        assert_eq!(series.time, vec!["T0"]);
        assert_eq!(metrics.export()["intervals_closed"], 1);
    }

    #[tokio::test]
    async fn test_bad_messages_dropped_loop_continues() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(CollectorMetrics::new());
        let pipeline = IngestionLoop::new(
            roster(),
            store.clone(),
            &CollectorConfig::default(),
            metrics.clone(),
        );
        let (sender, source) = ChannelSource::channel(16);

        // Malformed topic
        sender
            .send(InboundMessage {
                topic: "too/short".to_string(),
                payload: b"{}".to_vec(),
            })
            .await
            .unwrap();
        // Unregistered detector
        sender.send(message("999", 1, "vehicle-count", 1.0, "T0")).await.unwrap();
        // Malformed payload
        sender
            .send(InboundMessage {
                topic: format!("{TOPIC_PREFIX}/det-773-1/vehicle-count"),
                payload: b"not json".to_vec(),
            })
            .await
            .unwrap();
        // Non-measured kind: silently ignored
        sender.send(message("773", 1, "occupancy", 9.0, "T0")).await.unwrap();
        // A valid sequence still aggregates
        sender.send(message("773", 1, "vehicle-count", 2.0, "T0")).await.unwrap();
        sender.send(message("773", 1, "vehicle-count", 5.0, "T1")).await.unwrap();
        drop(sender);

        pipeline.run(source).await.unwrap();

        let exported = metrics.export();
        assert_eq!(exported["malformed_topics"], 1);
        assert_eq!(exported["unknown_detectors"], 1);
        assert_eq!(exported["malformed_payloads"], 1);
        assert_eq!(exported["kinds_ignored"], 1);

        let series = stored_series(&store, "773").await;
        assert_eq!(series.count, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_flush_persists_idle_interval() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(CollectorMetrics::new());
        let config = CollectorConfig {
            stale_flush_after: Some(Duration::from_secs(60)),
            ..CollectorConfig::default()
        };
        let pipeline = IngestionLoop::new(roster(), store.clone(), &config, metrics.clone());
        let (sender, source) = ChannelSource::channel(16);

        let handle = tokio::spawn(pipeline.run(source));

        sender.send(message("773", 1, "vehicle-speed", 30.0, "T0")).await.unwrap();
        // Let the loop consume the message, then step past the grace period.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        drop(sender);

        handle.await.unwrap().unwrap();

        let series = stored_series(&store, "773").await;
        assert_eq!(series.time, vec!["T0"]);
        assert_eq!(metrics.export()["stale_flushes"], 1);
    }

    #[tokio::test]
    async fn test_subscription_filters_cover_roster() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionLoop::new(
            roster(),
            store,
            &CollectorConfig::default(),
            Arc::new(CollectorMetrics::new()),
        );
        assert_eq!(
            pipeline.subscription_filters(),
            vec![format!("{TOPIC_PREFIX}/#")]
        );
    }
}
