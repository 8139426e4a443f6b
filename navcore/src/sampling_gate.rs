use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::Coordinate;

/// A normalized GPS fix, ready for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub speed_mps: Option<f64>,
    pub heading_degrees: Option<f64>,
    pub altitude_meters: Option<f64>,
    pub timestamp_ms: i64,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, timestamp_ms: i64) -> Self {
        Self {
            coordinate,
            accuracy_meters: None,
            speed_mps: None,
            heading_degrees: None,
            altitude_meters: None,
            timestamp_ms,
        }
    }

    pub fn with_accuracy(mut self, accuracy_meters: f64) -> Self {
        self.accuracy_meters = Some(accuracy_meters);
        self
    }

    pub fn with_motion(mut self, speed_mps: f64, heading_degrees: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self.heading_degrees = Some(heading_degrees);
        self
    }
}

/// Position payload in the shape of the browser Geolocation API
/// (`{coords: {...}, timestamp}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    pub coords: RawCoords,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoords {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub altitude_accuracy: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
}

/// Largest timestamp magnitude a fix may carry, in epoch milliseconds
/// (100 million days either side of 1970).
pub const MAX_TIMESTAMP_MS: i64 = 8_640_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    Milliseconds,
    Seconds,
}

impl TimestampUnit {
    pub fn to_millis(&self, value: f64) -> i64 {
        match self {
            TimestampUnit::Milliseconds => value.round() as i64,
            TimestampUnit::Seconds => (value * 1000.0).round() as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingGateConfig {
    /// Fixes with a reported accuracy worse than this are dropped
    pub min_accuracy_meters: f64,
    /// Drop fixes that carry no accuracy at all
    pub require_accuracy: bool,
    /// Maximum fix age against the caller's clock (only checked by `accept_at`)
    pub max_sample_age_ms: Option<i64>,
    pub timestamp_unit: TimestampUnit,
}

impl Default for SamplingGateConfig {
    fn default() -> Self {
        Self {
            min_accuracy_meters: 50.0,
            require_accuracy: true,
            max_sample_age_ms: None,
            timestamp_unit: TimestampUnit::Milliseconds,
        }
    }
}

/// Why a raw fix did not make it through the gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropReason {
    InvalidCoordinate,
    InvalidTimestamp,
    MissingAccuracy,
    Inaccurate { accuracy_meters: f64 },
    OutOfOrder { timestamp_ms: i64, last_accepted_ms: i64 },
    Stale { age_ms: i64 },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::InvalidCoordinate => write!(f, "invalid coordinate"),
            DropReason::InvalidTimestamp => write!(f, "invalid timestamp"),
            DropReason::MissingAccuracy => write!(f, "no accuracy reported"),
            DropReason::Inaccurate { accuracy_meters } => {
                write!(f, "accuracy {:.1} m too poor", accuracy_meters)
            }
            DropReason::OutOfOrder { timestamp_ms, last_accepted_ms } => write!(
                f,
                "timestamp {} older than last accepted {}",
                timestamp_ms, last_accepted_ms
            ),
            DropReason::Stale { age_ms } => write!(f, "fix is {} ms old", age_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub accepted: u64,
    pub invalid: u64,
    pub missing_accuracy: u64,
    pub inaccurate: u64,
    pub stale: u64,
}

impl GateStats {
    pub fn dropped(&self) -> u64 {
        self.invalid + self.missing_accuracy + self.inaccurate + self.stale
    }
}

/// Filters raw provider fixes before they reach the tracker.
pub struct SamplingGate {
    config: SamplingGateConfig,
    last_accepted_ms: Option<i64>,
    stats: GateStats,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl SamplingGate {
    pub fn new(config: SamplingGateConfig) -> Self {
        Self {
            config,
            last_accepted_ms: None,
            stats: GateStats::default(),
        }
    }

    pub fn config(&self) -> &SamplingGateConfig {
        &self.config
    }

    pub fn stats(&self) -> GateStats {
        self.stats
    }

    /// Forget the last accepted timestamp (e.g. when a new route starts).
    pub fn reset(&mut self) {
        self.last_accepted_ms = None;
    }

    /// Map a raw fix to a sample, or `None` when it should be discarded.
    pub fn accept(&mut self, raw: &RawPosition) -> Option<PositionSample> {
        self.evaluate(raw, None).ok()
    }

    /// Like `accept`, additionally dropping fixes older than
    /// `max_sample_age_ms` relative to `now_ms`.
    pub fn accept_at(&mut self, raw: &RawPosition, now_ms: i64) -> Option<PositionSample> {
        self.evaluate(raw, Some(now_ms)).ok()
    }

    /// `accept_at` against the wall clock.
    pub fn accept_now(&mut self, raw: &RawPosition) -> Option<PositionSample> {
        self.accept_at(raw, chrono::Utc::now().timestamp_millis())
    }

    pub fn evaluate(
        &mut self,
        raw: &RawPosition,
        now_ms: Option<i64>,
    ) -> Result<PositionSample, DropReason> {
        let result = self.check(raw, now_ms);
        match result {
            Ok(ref sample) => {
                self.stats.accepted += 1;
                self.last_accepted_ms = Some(sample.timestamp_ms);
            }
            Err(reason) => {
                match reason {
                    DropReason::InvalidCoordinate | DropReason::InvalidTimestamp => {
                        self.stats.invalid += 1
                    }
                    DropReason::MissingAccuracy => self.stats.missing_accuracy += 1,
                    DropReason::Inaccurate { .. } => self.stats.inaccurate += 1,
                    DropReason::OutOfOrder { .. } | DropReason::Stale { .. } => {
                        self.stats.stale += 1
                    }
                }
                debug!("Dropping position fix: {}", reason);
            }
        }
        result
    }

    fn check(&self, raw: &RawPosition, now_ms: Option<i64>) -> Result<PositionSample, DropReason> {
        let coordinate = Coordinate::new(raw.coords.longitude, raw.coords.latitude);
        if !coordinate.is_valid() {
            return Err(DropReason::InvalidCoordinate);
        }
        // the float to int conversion saturates, so anything huge lands outside the range
        let timestamp_ms = self.config.timestamp_unit.to_millis(raw.timestamp);
        if !raw.timestamp.is_finite()
            || !(-MAX_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&timestamp_ms)
        {
            return Err(DropReason::InvalidTimestamp);
        }

        let accuracy = finite(raw.coords.accuracy).filter(|a| *a >= 0.0);
        match accuracy {
            None if self.config.require_accuracy => return Err(DropReason::MissingAccuracy),
            Some(accuracy_meters) if accuracy_meters > self.config.min_accuracy_meters => {
                return Err(DropReason::Inaccurate { accuracy_meters });
            }
            _ => {}
        }

        if let Some(last_accepted_ms) = self.last_accepted_ms {
            if timestamp_ms < last_accepted_ms {
                return Err(DropReason::OutOfOrder { timestamp_ms, last_accepted_ms });
            }
        }
        if let (Some(now), Some(max_age)) = (now_ms, self.config.max_sample_age_ms) {
            let age_ms = now.saturating_sub(timestamp_ms);
            if age_ms > max_age {
                return Err(DropReason::Stale { age_ms });
            }
        }

        Ok(PositionSample {
            coordinate,
            accuracy_meters: accuracy,
            speed_mps: finite(raw.coords.speed).filter(|s| *s >= 0.0),
            heading_degrees: finite(raw.coords.heading),
            altitude_meters: finite(raw.coords.altitude),
            timestamp_ms,
        })
    }
}

impl Default for SamplingGate {
    fn default() -> Self {
        Self::new(SamplingGateConfig::default())
    }
}
