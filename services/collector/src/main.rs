//! Collector service entry point
//!
//! Wires the ingestion pipeline: roster → engine → retention writer →
//! store, fed by the inbound message channel. The broker bridge (connect,
//! subscribe, reconnect policy) lives outside this binary; it owns the
//! channel's sender half and pushes every received message into it. For a
//! standalone run without a bridge, a small synthetic feed is published so
//! the pipeline can be exercised end to end.

use std::sync::Arc;

use collector::config::CollectorConfig;
use collector::ingestion::{ChannelSource, InboundMessage, IngestionLoop};
use collector::metrics::CollectorMetrics;
use collector::store::MemoryStore;
use tokio::sync::mpsc;
use types::detector::{DetectorId, DetectorInfo, Roster};
use types::reading::SensorPayload;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!(version = collector::SERVICE_VERSION, "Starting telemetry collector");

    let config = CollectorConfig::from_env();
    let roster = load_roster()?;
    tracing::info!(detectors = roster.len(), "Roster loaded");

    let store = Arc::new(MemoryStore::new());
    let metrics = Arc::new(CollectorMetrics::new());
    let (sender, source) = ChannelSource::channel(config.channel_capacity);

    let pipeline = IngestionLoop::new(roster.clone(), store.clone(), &config, metrics.clone());
    tracing::info!(filters = ?pipeline.subscription_filters(), "Subscription filters");

    // Stand-in for the broker bridge: publishes a short synthetic feed and
    // closes the channel, ending the run.
    let feeder = tokio::spawn(publish_demo_feed(sender, roster));

    pipeline.run(source).await?;
    feeder.await?;

    tracing::info!(metrics = ?metrics.export(), records = store.len(), "Collector run complete");
    Ok(())
}

/// Load the detector roster from `ROSTER_PATH` (a JSON table produced by
/// external tooling), or fall back to a built-in demo roster.
fn load_roster() -> Result<Roster, anyhow::Error> {
    match std::env::var("ROSTER_PATH") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let roster = serde_json::from_str(&raw)?;
            Ok(roster)
        }
        Err(_) => Ok(demo_roster()),
    }
}

fn demo_roster() -> Roster {
    Roster::new(vec![DetectorInfo {
        id: DetectorId::new("773"),
        topics: vec!["cgmu/data/v1/ca/qc/mtl/roads/rtss/sensors/thermal/".to_string()],
        description: Some("demo detector".to_string()),
    }])
}

/// Publish two intervals of two-lane readings for the demo roster.
async fn publish_demo_feed(sender: mpsc::Sender<InboundMessage>, roster: Roster) {
    let timestamps = ["2023-05-01T14:36:00", "2023-05-01T14:37:00"];
    for (i, timestamp) in timestamps.iter().enumerate() {
        for info in roster.iter() {
            let prefix = match info.topics.first() {
                Some(prefix) => prefix,
                None => continue,
            };
            for lane in 1..=2u8 {
                let readings = [
                    ("vehicle-speed", 30.0 + (i * 10 + lane as usize) as f64),
                    ("vehicle-count", lane as f64),
                    ("vehicle-gap-time", 55.0),
                ];
                for (kind, value) in readings {
                    let payload = SensorPayload {
                        value,
                        create_utc: timestamp.to_string(),
                        desc: None,
                        unit: None,
                        status: Some("Good".to_string()),
                        format: Some("ODNF1".to_string()),
                        expiry_utc: None,
                    };
                    let msg = InboundMessage {
                        topic: format!("{}det-{}-{}/{}", prefix, info.id, lane, kind),
                        payload: serde_json::to_vec(&payload).unwrap_or_default(),
                    };
                    if sender.send(msg).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
    // Dropping the sender closes the channel and ends the run.
}
