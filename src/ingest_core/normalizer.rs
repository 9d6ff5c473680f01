//! Row normalization from raw CSV cells to typed telemetry samples
//!
//! Availability over accuracy: a malformed numeric cell becomes 0.0 (never an
//! error, never a null), and a file where no timestamp parses at all is given
//! a synthetic one-sample-per-second sequence starting at ingestion time so
//! the pipeline never aborts purely on timestamp format. Only rows whose
//! timestamp cannot be derived even via fallback are skipped, and those are
//! counted rather than aborting the batch.

use super::schema::{Channel, ColumnMapping};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::StringRecord;
use std::collections::BTreeMap;

/// Accepted timestamp formats, attempted in order. First success wins.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// One timestamped observation, normalized and typed
///
/// Invariant: every numeric value is a finite number - parse failures,
/// missing cells, NaN and infinities have all been coerced to 0.0 by the
/// time a sample exists.
#[derive(Debug, Clone)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    /// Originating file identifier; groups samples into a trip
    pub session_id: String,
    /// Resolved numeric channels only - unresolved channels are absent
    pub numeric: BTreeMap<Channel, f64>,
    pub mode: String,
    pub alert: String,
}

/// Result of normalizing one file's rows
#[derive(Debug)]
pub struct NormalizedBatch {
    pub samples: Vec<TelemetrySample>,
    pub rows_total: usize,
    pub rows_skipped: usize,
    /// True when no row had a parseable timestamp and the synthetic
    /// one-second-spaced sequence was substituted for the whole file
    pub synthetic_timestamps: bool,
}

/// Parse one textual timestamp against the accepted formats
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Coerce one cell to a finite float; anything unparsable becomes 0.0.
///
/// This makes a malformed cell indistinguishable from a genuinely-zero
/// reading - a deliberate precision tradeoff carried over from the source
/// data contract.
fn coerce_numeric(cell: Option<&str>) -> f64 {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Normalize one file's raw rows into telemetry samples.
///
/// `ingested_at` anchors the synthetic timestamp sequence when no row in the
/// file has a parseable time cell.
pub fn normalize_rows(
    rows: &[StringRecord],
    mapping: &ColumnMapping,
    session_id: &str,
    ingested_at: DateTime<Utc>,
) -> NormalizedBatch {
    let time_index = mapping.get(Channel::Time).map(|col| col.index);

    // First pass: parse every row, keeping the timestamp optional so the
    // whole-file synthetic fallback can be decided afterwards.
    let mut parsed: Vec<(Option<DateTime<Utc>>, TelemetrySample)> = Vec::with_capacity(rows.len());

    for row in rows {
        let timestamp = time_index
            .and_then(|idx| row.get(idx))
            .and_then(parse_timestamp);

        let mut numeric = BTreeMap::new();
        for (channel, col) in mapping.numeric_channels() {
            numeric.insert(channel, coerce_numeric(row.get(col.index)));
        }

        let text_cell = |channel: Channel| {
            mapping
                .get(channel)
                .and_then(|col| row.get(col.index))
                .unwrap_or("")
                .to_string()
        };

        parsed.push((
            timestamp,
            TelemetrySample {
                timestamp: ingested_at, // placeholder until assigned below
                session_id: session_id.to_string(),
                numeric,
                mode: text_cell(Channel::Mode),
                alert: text_cell(Channel::Alert),
            },
        ));
    }

    let rows_total = parsed.len();
    let any_parsed = parsed.iter().any(|(ts, _)| ts.is_some());

    let mut samples = Vec::with_capacity(rows_total);
    let mut rows_skipped = 0usize;
    let synthetic_timestamps = !any_parsed && rows_total > 0;

    if synthetic_timestamps {
        log::warn!(
            "⚠️  {}: no parseable timestamps, substituting synthetic 1s-spaced sequence",
            session_id
        );
        for (i, (_, mut sample)) in parsed.into_iter().enumerate() {
            sample.timestamp = ingested_at + chrono::Duration::seconds(i as i64);
            samples.push(sample);
        }
    } else {
        for (timestamp, mut sample) in parsed {
            match timestamp {
                Some(ts) => {
                    sample.timestamp = ts;
                    samples.push(sample);
                }
                None => rows_skipped += 1,
            }
        }
    }

    NormalizedBatch {
        samples,
        rows_total,
        rows_skipped,
        synthetic_timestamps,
    }
}
