//! Time-series store writer over SQLite
//!
//! One `telemetry` table keyed by `(timestamp_ms, session_id)` holds the raw
//! samples; `trip_summaries` holds one upserted row per ingested file.
//!
//! Durability contract:
//! - schema init is idempotent (`IF NOT EXISTS` in the engine itself, not an
//!   application flag) and safe under concurrent process startup
//! - a sample batch is written inside one transaction - it commits whole or
//!   not at all
//! - duplicate `(timestamp_ms, session_id)` pairs are ignored, so
//!   re-ingesting an identical file never fails and never duplicates rows
//! - channels with no destination column are dropped for the batch by
//!   intersecting the file's resolved channels against `PRAGMA table_info`

use crate::error::IngestError;
use crate::ingest_core::aggregator::TripSummary;
use crate::ingest_core::normalizer::TelemetrySample;
use crate::ingest_core::schema::{Channel, ColumnMapping};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS telemetry (
    timestamp_ms INTEGER NOT NULL,
    session_id   TEXT    NOT NULL,
    speed        REAL    NOT NULL DEFAULT 0,
    battery      REAL    NOT NULL DEFAULT 0,
    distance     REAL    NOT NULL DEFAULT 0,
    voltage      REAL    NOT NULL DEFAULT 0,
    current      REAL    NOT NULL DEFAULT 0,
    power        REAL    NOT NULL DEFAULT 0,
    temperature  REAL    NOT NULL DEFAULT 0,
    gps_lat      REAL    NOT NULL DEFAULT 0,
    gps_lon      REAL    NOT NULL DEFAULT 0,
    mode         TEXT    NOT NULL DEFAULT '',
    alert        TEXT    NOT NULL DEFAULT '',
    PRIMARY KEY (timestamp_ms, session_id)
);

CREATE INDEX IF NOT EXISTS idx_telemetry_timestamp ON telemetry (timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_telemetry_session ON telemetry (session_id);

CREATE TABLE IF NOT EXISTS trip_summaries (
    filename         TEXT    PRIMARY KEY,
    distance_km      REAL    NOT NULL,
    duration_min     INTEGER NOT NULL,
    battery_start    INTEGER NOT NULL,
    battery_end      INTEGER NOT NULL,
    battery_used     INTEGER NOT NULL,
    max_speed        REAL    NOT NULL,
    avg_speed        REAL    NOT NULL,
    battery_per_km   REAL    NOT NULL,
    efficiency_score REAL    NOT NULL,
    aggressiveness   REAL    NOT NULL,
    records_count    INTEGER NOT NULL,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL
);
"#;

/// Create the destination tables if absent.
///
/// Idempotent and race-safe: the `IF NOT EXISTS` guard lives in the store
/// engine, so multiple process instances can run this concurrently at
/// startup without corrupting the schema. The process must not accept
/// uploads until this has succeeded.
pub fn init_schema(conn: &Connection) -> Result<(), IngestError> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| IngestError::SchemaInit(format!("enabling WAL: {}", e)))?;

    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| IngestError::SchemaInit(e.to_string()))?;

    log::info!("✅ Destination schema ready (telemetry, trip_summaries)");
    Ok(())
}

/// Aggregate counts over the whole store, for the operational surface
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub total_trips: i64,
    pub total_records: i64,
    pub first_record_ms: Option<i64>,
    pub last_record_ms: Option<i64>,
}

/// Trait for persisting one session's batch plus its summary
#[async_trait]
pub trait TelemetryDbWriter: Send + Sync {
    /// Write the whole batch for one session atomically.
    ///
    /// Returns the number of rows actually inserted (duplicates are ignored,
    /// not errors). Any other failure aborts the entire batch.
    async fn write_batch(
        &self,
        samples: &[TelemetrySample],
        mapping: &ColumnMapping,
    ) -> Result<usize, IngestError>;

    /// Upsert the trip summary (keyed by filename, created_at preserved)
    async fn write_summary(&self, summary: &TripSummary) -> Result<(), IngestError>;
}

/// SQLite implementation of `TelemetryDbWriter`
pub struct SqliteTelemetryWriter {
    conn: Arc<Mutex<Connection>>,
    /// Destination columns discovered once at construction
    telemetry_columns: Vec<String>,
}

impl SqliteTelemetryWriter {
    /// Open a writer over an existing database. `init_schema` must have run.
    pub fn new(db_path: &str, busy_timeout_ms: u64) -> Result<Self, IngestError> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))?;

        let telemetry_columns = destination_columns(&conn, "telemetry")?;
        if telemetry_columns.is_empty() {
            return Err(IngestError::SchemaInit(
                "telemetry table has no columns - did init_schema run?".to_string(),
            ));
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            telemetry_columns,
        })
    }

    /// Channels from the mapping that actually exist in the destination.
    ///
    /// Channels without a destination column are silently dropped for the
    /// batch - best effort, not an error.
    fn insertable_channels(&self, mapping: &ColumnMapping) -> Vec<Channel> {
        let mut channels: Vec<Channel> =
            mapping.numeric_channels().map(|(ch, _)| ch).collect();
        for text in [Channel::Mode, Channel::Alert] {
            if mapping.is_resolved(text) {
                channels.push(text);
            }
        }
        channels
            .into_iter()
            .filter(|ch| self.telemetry_columns.iter().any(|c| c == ch.as_str()))
            .collect()
    }

    /// Whole-store statistics for the health/status surface
    pub fn store_stats(&self) -> Result<StoreStats, IngestError> {
        let conn = self.conn.lock().unwrap();
        let stats = conn.query_row(
            "SELECT COUNT(DISTINCT session_id), COUNT(*), MIN(timestamp_ms), MAX(timestamp_ms)
             FROM telemetry",
            [],
            |row| {
                Ok(StoreStats {
                    total_trips: row.get(0)?,
                    total_records: row.get(1)?,
                    first_record_ms: row.get(2)?,
                    last_record_ms: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Load a stored summary back (testing and the status surface)
    pub fn load_summary(&self, filename: &str) -> Result<Option<TripSummary>, IngestError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT filename, distance_km, duration_min, battery_start, battery_end,
                    battery_used, max_speed, avg_speed, battery_per_km,
                    efficiency_score, aggressiveness, records_count
             FROM trip_summaries WHERE filename = ?",
        )?;

        let mut rows = stmt.query_map([filename], |row| {
            Ok(TripSummary {
                filename: row.get(0)?,
                distance_km: row.get(1)?,
                duration_min: row.get(2)?,
                battery_start: row.get(3)?,
                battery_end: row.get(4)?,
                battery_used: row.get(5)?,
                max_speed: row.get(6)?,
                avg_speed: row.get(7)?,
                battery_per_km: row.get(8)?,
                efficiency_score: row.get(9)?,
                aggressiveness: row.get(10)?,
                records_count: row.get::<_, i64>(11)? as usize,
            })
        })?;

        match rows.next() {
            Some(summary) => Ok(Some(summary?)),
            None => Ok(None),
        }
    }
}

fn destination_columns(conn: &Connection, table: &str) -> Result<Vec<String>, IngestError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

#[async_trait]
impl TelemetryDbWriter for SqliteTelemetryWriter {
    async fn write_batch(
        &self,
        samples: &[TelemetrySample],
        mapping: &ColumnMapping,
    ) -> Result<usize, IngestError> {
        if samples.is_empty() {
            return Ok(0);
        }

        let channels = self.insertable_channels(mapping);

        let mut column_names = vec!["timestamp_ms".to_string(), "session_id".to_string()];
        column_names.extend(channels.iter().map(|ch| ch.as_str().to_string()));
        let placeholders: Vec<String> =
            (1..=column_names.len()).map(|i| format!("?{}", i)).collect();

        let sql = format!(
            "INSERT OR IGNORE INTO telemetry ({}) VALUES ({})",
            column_names.join(", "),
            placeholders.join(", ")
        );

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(IngestError::Store)?;
        let mut inserted = 0usize;

        {
            let mut stmt = tx.prepare(&sql)?;
            for sample in samples {
                let mut values: Vec<Value> = Vec::with_capacity(column_names.len());
                values.push(Value::Integer(sample.timestamp.timestamp_millis()));
                values.push(Value::Text(sample.session_id.clone()));
                for channel in &channels {
                    values.push(match channel {
                        Channel::Mode => Value::Text(sample.mode.clone()),
                        Channel::Alert => Value::Text(sample.alert.clone()),
                        numeric => Value::Real(
                            sample.numeric.get(numeric).copied().unwrap_or(0.0),
                        ),
                    });
                }
                inserted += stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }

        tx.commit().map_err(IngestError::Store)?;
        Ok(inserted)
    }

    async fn write_summary(&self, summary: &TripSummary) -> Result<(), IngestError> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO trip_summaries (
                filename, distance_km, duration_min,
                battery_start, battery_end, battery_used,
                max_speed, avg_speed,
                battery_per_km, efficiency_score, aggressiveness,
                records_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            ON CONFLICT(filename) DO UPDATE SET
                distance_km = excluded.distance_km,
                duration_min = excluded.duration_min,
                battery_start = excluded.battery_start,
                battery_end = excluded.battery_end,
                battery_used = excluded.battery_used,
                max_speed = excluded.max_speed,
                avg_speed = excluded.avg_speed,
                battery_per_km = excluded.battery_per_km,
                efficiency_score = excluded.efficiency_score,
                aggressiveness = excluded.aggressiveness,
                records_count = excluded.records_count,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![
                summary.filename,
                summary.distance_km,
                summary.duration_min,
                summary.battery_start,
                summary.battery_end,
                summary.battery_used,
                summary.max_speed,
                summary.avg_speed,
                summary.battery_per_km,
                summary.efficiency_score,
                summary.aggressiveness,
                summary.records_count as i64,
                now,
            ],
        )?;

        Ok(())
    }
}
