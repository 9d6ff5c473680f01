//! Trip aggregation - reduces one session's ordered samples to a summary
//!
//! Battery start/end are order-dependent (first/last sample, not min/max) and
//! `battery_used` is deliberately unclamped: a mid-trip charge makes it
//! negative. The derived scores (`battery_per_km`, `efficiency_score`,
//! `aggressiveness`) are heuristic labels, not calibrated physical
//! quantities.

use super::schema::{Channel, ColumnMapping};
use super::normalizer::TelemetrySample;
use serde::{Deserialize, Serialize};

/// Guard against division blow-up on near-zero trips
const DISTANCE_EPSILON_KM: f64 = 0.1;

/// One row per ingested file: the trip-level summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripSummary {
    pub filename: String,
    pub distance_km: f64,
    pub duration_min: i64,
    pub battery_start: i64,
    pub battery_end: i64,
    /// start - end; negative when charging occurred mid-trip
    pub battery_used: i64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub battery_per_km: f64,
    /// Heuristic 0-10, higher is better
    pub efficiency_score: f64,
    /// Heuristic 0-10 from speed variance
    pub aggressiveness: f64,
    pub records_count: usize,
}

/// How the resolved distance column should be interpreted
///
/// The single decision point for the dual distance semantics. The choice is
/// made from the column name alone, not from data shape, so a misnamed
/// column misclassifies - callers were warned in the schema resolver docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceSemantics {
    /// Running odometer: trip distance is max - min
    Cumulative,
    /// Per-sample/segment value: trip distance is the max
    Instantaneous,
}

impl DistanceSemantics {
    pub fn classify(source_column: &str) -> Self {
        if source_column.to_lowercase().contains("total") {
            DistanceSemantics::Cumulative
        } else {
            DistanceSemantics::Instantaneous
        }
    }
}

fn channel_values(samples: &[TelemetrySample], channel: Channel) -> Vec<f64> {
    samples
        .iter()
        .filter_map(|s| s.numeric.get(&channel).copied())
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Sample (n-1) standard deviation; a single sample has no spread
fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Summarize one session's ordered samples.
///
/// Never fails: an empty sequence yields an all-default summary, and an
/// uncomputable duration falls back to the row count as a minutes proxy
/// (reported via the `degraded_duration` flag - it is a count, not a time).
pub fn summarize(
    samples: &[TelemetrySample],
    mapping: &ColumnMapping,
    filename: &str,
) -> (TripSummary, bool) {
    if samples.is_empty() {
        return (
            TripSummary {
                filename: filename.to_string(),
                ..Default::default()
            },
            false,
        );
    }

    let mut degraded_duration = false;
    let elapsed = samples[samples.len() - 1].timestamp - samples[0].timestamp;
    let duration_min = if elapsed.num_seconds() >= 0 {
        elapsed.num_minutes()
    } else {
        // Out-of-order timestamps - substitute the row count as a proxy
        degraded_duration = true;
        samples.len() as i64
    };

    let distance_values = channel_values(samples, Channel::Distance);
    let distance_km = match mapping.get(Channel::Distance) {
        Some(col) if !distance_values.is_empty() => {
            let max = distance_values.iter().cloned().fold(f64::MIN, f64::max);
            let meters = match DistanceSemantics::classify(&col.name) {
                DistanceSemantics::Cumulative => {
                    let min = distance_values.iter().cloned().fold(f64::MAX, f64::min);
                    max - min
                }
                DistanceSemantics::Instantaneous => max,
            };
            round2((meters / 1000.0).max(0.0))
        }
        _ => 0.0,
    };

    let battery_values = channel_values(samples, Channel::Battery);
    let battery_start = battery_values.first().map(|v| v.round() as i64).unwrap_or(0);
    let battery_end = battery_values.last().map(|v| v.round() as i64).unwrap_or(0);
    let battery_used = battery_start - battery_end;

    let speed_values = channel_values(samples, Channel::Speed);
    let max_speed = round1(speed_values.iter().cloned().fold(0.0, f64::max));
    // Negative sensor readings (reverse, glitches) must not drive the
    // reported averages below zero
    let avg_speed = if speed_values.is_empty() {
        0.0
    } else {
        round1((speed_values.iter().sum::<f64>() / speed_values.len() as f64).max(0.0))
    };

    let battery_per_km = battery_used as f64 / distance_km.max(DISTANCE_EPSILON_KM);
    let efficiency_score = (10.0 - (battery_per_km - 3.0) * 2.0).clamp(0.0, 10.0);
    let aggressiveness = (sample_stddev(&speed_values) / 3.0).clamp(0.0, 10.0);

    (
        TripSummary {
            filename: filename.to_string(),
            distance_km,
            duration_min,
            battery_start,
            battery_end,
            battery_used,
            max_speed,
            avg_speed,
            battery_per_km,
            efficiency_score,
            aggressiveness,
            records_count: samples.len(),
        },
        degraded_duration,
    )
}
