//! Trip-completion event fan-out
//!
//! Dispatches the finished trip summary to the notification webhook and the
//! analyzer service. Strictly best-effort: by the time an event is emitted
//! the batch is already committed, and no failure here may roll it back or
//! surface as an ingestion error - failures are logged and dropped.

use crate::ingest_core::aggregator::TripSummary;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const ANALYZER_TIMEOUT: Duration = Duration::from_secs(5);

/// Trips under this distance are flagged so downstream can skip them
/// without re-deriving the threshold
const SHORT_TRIP_KM: f64 = 0.5;

/// JSON trip-completion record sent to collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripEvent {
    pub filename: String,
    /// Ingestion completion time, ISO-8601
    pub timestamp: String,
    pub records_count: usize,
    pub distance_km: f64,
    pub duration_min: i64,
    pub battery_start: i64,
    pub battery_end: i64,
    pub battery_used: i64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub short_trip: bool,
}

impl TripEvent {
    pub fn from_summary(summary: &TripSummary, completed_at: DateTime<Utc>) -> Self {
        Self {
            filename: summary.filename.clone(),
            timestamp: completed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            records_count: summary.records_count,
            distance_km: summary.distance_km,
            duration_min: summary.duration_min,
            battery_start: summary.battery_start,
            battery_end: summary.battery_end,
            battery_used: summary.battery_used,
            max_speed: summary.max_speed,
            avg_speed: summary.avg_speed,
            short_trip: summary.distance_km < SHORT_TRIP_KM,
        }
    }
}

/// Fire-and-forget dispatcher for trip-completion events
pub struct EventEmitter {
    client: reqwest::Client,
    webhook_url: Option<String>,
    analyzer_url: Option<String>,
}

impl EventEmitter {
    pub fn new(webhook_url: Option<String>, analyzer_url: Option<String>) -> Self {
        // Client construction cannot fail with these options; timeouts are
        // applied per-request since the two endpoints get different bounds
        let client = reqwest::Client::new();
        Self {
            client,
            webhook_url,
            analyzer_url,
        }
    }

    /// Dispatch one event to every configured collaborator.
    ///
    /// Never returns an error - delivery problems are logged only.
    pub async fn emit(&self, event: &TripEvent) {
        if let Some(url) = &self.webhook_url {
            self.post(url, event, WEBHOOK_TIMEOUT, "webhook").await;
        } else {
            log::debug!("Webhook URL not configured, skipping notification");
        }

        if let Some(url) = &self.analyzer_url {
            self.post(url, event, ANALYZER_TIMEOUT, "analyzer").await;
        }
    }

    async fn post(&self, url: &str, event: &TripEvent, timeout: Duration, target: &str) {
        let result = self
            .client
            .post(url)
            .timeout(timeout)
            .json(event)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                log::info!("✅ Trip event for {} delivered to {}", event.filename, target);
            }
            Ok(response) => {
                log::warn!(
                    "⚠️  {} rejected trip event for {}: HTTP {}",
                    target,
                    event.filename,
                    response.status()
                );
            }
            Err(e) => {
                log::warn!("⚠️  Could not reach {}: {}", target, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary() -> TripSummary {
        TripSummary {
            filename: "ride.csv".to_string(),
            distance_km: 12.5,
            duration_min: 45,
            battery_start: 87,
            battery_end: 34,
            battery_used: 53,
            max_speed: 28.0,
            avg_speed: 18.2,
            battery_per_km: 4.24,
            efficiency_score: 7.5,
            aggressiveness: 4.1,
            records_count: 1800,
        }
    }

    #[test]
    fn test_event_payload_shape() {
        let completed = Utc.with_ymd_and_hms(2025, 1, 27, 18, 30, 0).unwrap();
        let event = TripEvent::from_summary(&summary(), completed);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["filename"], "ride.csv");
        assert_eq!(json["timestamp"], "2025-01-27T18:30:00Z");
        assert_eq!(json["records_count"], 1800);
        assert_eq!(json["distance_km"], 12.5);
        assert_eq!(json["duration_min"], 45);
        assert_eq!(json["battery_start"], 87);
        assert_eq!(json["battery_end"], 34);
        assert_eq!(json["battery_used"], 53);
        assert_eq!(json["max_speed"], 28.0);
        assert_eq!(json["avg_speed"], 18.2);
        assert_eq!(json["short_trip"], false);
    }

    #[test]
    fn test_short_trip_flag() {
        let mut short = summary();
        short.distance_km = 0.2;

        let event = TripEvent::from_summary(&short, Utc::now());
        assert!(event.short_trip);
    }

    #[tokio::test]
    async fn test_emit_with_nothing_configured_is_silent() {
        let emitter = EventEmitter::new(None, None);
        let event = TripEvent::from_summary(&summary(), Utc::now());

        // Must not panic or error with no collaborators configured
        emitter.emit(&event).await;
    }

    #[tokio::test]
    async fn test_emit_swallows_unreachable_endpoint() {
        let emitter = EventEmitter::new(Some("http://127.0.0.1:1/webhook".to_string()), None);
        let event = TripEvent::from_summary(&summary(), Utc::now());

        // Connection refused must be absorbed, not propagated
        emitter.emit(&event).await;
    }
}
