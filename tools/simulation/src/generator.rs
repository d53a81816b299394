//! Roster-driven detector message generation
//!
//! Each `next_interval` call produces the full fan-out for one measurement
//! interval: every detector × lane × kind, all stamped with the same
//! `CreateUtc`, then advances the simulated clock by one step. Lane values
//! are drawn from per-kind ranges with a configurable probability of the
//! `0` "no detection" sentinel.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use types::detector::{DetectorId, DetectorInfo, Roster};
use types::reading::{ReadingKind, SensorPayload};

/// Topic tree the simulated detectors publish under. The detector segment
/// (`det-<id>-<lane>`) lands at index 10, as the codec expects.
pub const DEFAULT_TOPIC_ROOT: &str = "cgmu/data/v1/ca/qc/mtl/roads/rtss/sensors/thermal";

/// ISO-8601 with no offset (UTC implied), the broker's timestamp shape.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Value range for one reading kind.
#[derive(Debug, Clone, Copy)]
pub struct KindProfile {
    pub min: f64,
    pub max: f64,
    /// Probability that a lane reports the `0` no-detection sentinel.
    pub zero_probability: f64,
}

impl KindProfile {
    fn sample(&self, rng: &mut ChaCha8Rng) -> f64 {
        if self.zero_probability > 0.0 && rng.gen_bool(self.zero_probability) {
            return 0.0;
        }
        rng.gen_range(self.min..=self.max).round()
    }
}

/// One simulated detector installation.
#[derive(Debug, Clone)]
pub struct SimDetector {
    pub id: DetectorId,
    pub lanes: u8,
}

impl SimDetector {
    pub fn new(id: impl Into<String>, lanes: u8) -> Self {
        Self {
            id: DetectorId::new(id),
            lanes,
        }
    }
}

/// Simulator parameters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    /// Timestamp of the first interval.
    pub start: NaiveDateTime,
    /// Interval length (one message fan-out per step).
    pub step: Duration,
    pub speed: KindProfile,
    pub count: KindProfile,
    pub gap_time: KindProfile,
}

impl SimConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            start: NaiveDate::from_ymd_opt(2023, 5, 1)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            step: Duration::minutes(1),
            speed: KindProfile {
                min: 20.0,
                max: 100.0,
                zero_probability: 0.1,
            },
            count: KindProfile {
                min: 0.0,
                max: 40.0,
                zero_probability: 0.0,
            },
            gap_time: KindProfile {
                min: 15.0,
                max: 180.0,
                zero_probability: 0.2,
            },
        }
    }
}

/// One generated message, ready to hand to a publisher or a test channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMessage {
    pub topic: String,
    pub payload: String,
}

/// Deterministic lane-reading generator for a fixed set of detectors.
pub struct TrafficSimulator {
    config: SimConfig,
    detectors: Vec<SimDetector>,
    rng: ChaCha8Rng,
    clock: NaiveDateTime,
}

impl TrafficSimulator {
    pub fn new(config: SimConfig, detectors: Vec<SimDetector>) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let clock = config.start;
        Self {
            config,
            detectors,
            rng,
            clock,
        }
    }

    /// The roster matching the simulated detectors, for wiring a collector.
    pub fn roster(&self) -> Roster {
        Roster::new(
            self.detectors
                .iter()
                .map(|det| DetectorInfo {
                    id: det.id.clone(),
                    topics: vec![format!("{DEFAULT_TOPIC_ROOT}/")],
                    description: Some(format!("simulated, {} lanes", det.lanes)),
                })
                .collect(),
        )
    }

    /// Timestamp the next generated interval will carry.
    pub fn next_timestamp(&self) -> String {
        self.clock.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Generate one interval's messages for every detector, lane, and kind,
    /// then advance the clock.
    pub fn next_interval(&mut self) -> Vec<SimMessage> {
        let create_utc = self.next_timestamp();
        let expiry_utc = (self.clock + self.config.step)
            .format(TIMESTAMP_FORMAT)
            .to_string();

        let mut messages = Vec::new();
        for det in &self.detectors {
            for lane in 1..=det.lanes {
                for kind in ReadingKind::all() {
                    let profile = match kind {
                        ReadingKind::Speed => self.config.speed,
                        ReadingKind::Count => self.config.count,
                        ReadingKind::GapTime => self.config.gap_time,
                    };
                    let payload = SensorPayload {
                        value: profile.sample(&mut self.rng),
                        create_utc: create_utc.clone(),
                        desc: Some(kind_desc(*kind).to_string()),
                        unit: Some(kind_unit(*kind).to_string()),
                        status: Some("Good".to_string()),
                        format: Some("ODNF1".to_string()),
                        expiry_utc: Some(expiry_utc.clone()),
                    };
                    messages.push(SimMessage {
                        topic: format!(
                            "{DEFAULT_TOPIC_ROOT}/det-{}-{}/{}",
                            det.id,
                            lane,
                            kind.token()
                        ),
                        payload: serde_json::to_string(&payload)
                            .unwrap_or_else(|_| String::from("{}")),
                    });
                }
            }
        }

        self.clock += self.config.step;
        messages
    }
}

fn kind_desc(kind: ReadingKind) -> &'static str {
    match kind {
        ReadingKind::Speed => "Average-vehicle-speed-for-vehicles",
        ReadingKind::Count => "Number-of-vehicles-during-the-integration-interval",
        ReadingKind::GapTime => "Vehicle-average-gap-time",
    }
}

fn kind_unit(kind: ReadingKind) -> &'static str {
    match kind {
        ReadingKind::Speed => "Km/h",
        ReadingKind::Count => "",
        ReadingKind::GapTime => "1/10sec",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator(seed: u64) -> TrafficSimulator {
        TrafficSimulator::new(
            SimConfig::with_seed(seed),
            vec![SimDetector::new("773", 2), SimDetector::new("901", 3)],
        )
    }

    #[test]
    fn test_interval_fan_out() {
        let mut sim = simulator(7);
        let messages = sim.next_interval();
        // (2 + 3 lanes) × 3 kinds
        assert_eq!(messages.len(), 15);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let mut a = simulator(42);
        let mut b = simulator(42);
        for _ in 0..5 {
            assert_eq!(a.next_interval(), b.next_interval());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = simulator(1);
        let mut b = simulator(2);
        assert_ne!(a.next_interval(), b.next_interval());
    }

    #[test]
    fn test_payload_matches_broker_schema() {
        let mut sim = simulator(7);
        for msg in sim.next_interval() {
            let payload: SensorPayload = serde_json::from_str(&msg.payload).unwrap();
            assert_eq!(payload.create_utc, "2023-05-01T14:00:00");
            assert_eq!(payload.status.as_deref(), Some("Good"));
            assert_eq!(payload.format.as_deref(), Some("ODNF1"));
            assert!(payload.value >= 0.0);
        }
    }

    #[test]
    fn test_clock_advances_per_interval() {
        let mut sim = simulator(7);
        assert_eq!(sim.next_timestamp(), "2023-05-01T14:00:00");
        sim.next_interval();
        assert_eq!(sim.next_timestamp(), "2023-05-01T14:01:00");
        sim.next_interval();
        assert_eq!(sim.next_timestamp(), "2023-05-01T14:02:00");
    }

    #[test]
    fn test_values_within_profile_bounds() {
        let mut sim = TrafficSimulator::new(
            SimConfig {
                speed: KindProfile {
                    min: 30.0,
                    max: 50.0,
                    zero_probability: 0.0,
                },
                ..SimConfig::with_seed(3)
            },
            vec![SimDetector::new("773", 1)],
        );
        for _ in 0..20 {
            for msg in sim.next_interval() {
                if msg.topic.ends_with("vehicle-speed") {
                    let payload: SensorPayload = serde_json::from_str(&msg.payload).unwrap();
                    assert!((30.0..=50.0).contains(&payload.value));
                }
            }
        }
    }
}
