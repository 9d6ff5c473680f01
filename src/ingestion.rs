//! One-file ingestion orchestration
//!
//! Executes resolve → normalize → aggregate → write → emit as a single
//! logical unit of work. Internally strictly sequential; the runtime may run
//! many of these concurrently, one task per uploaded file.
//!
//! Soft failures (unmatched columns, malformed rows, degraded aggregates)
//! end up as counters and flags on the report. Only a failed store write or
//! an unreadable file propagates as an error - the batch is atomic, so a
//! failure means no partial rows are guaranteed persisted.

use crate::emitter::{EventEmitter, TripEvent};
use crate::error::IngestError;
use crate::ingest_core::aggregator::{summarize, TripSummary};
use crate::ingest_core::normalizer::normalize_rows;
use crate::ingest_core::reader::read_csv;
use crate::ingest_core::schema::ColumnMapping;
use crate::store::TelemetryDbWriter;
use serde::Serialize;
use std::path::Path;

/// Result of one successful file ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub filename: String,
    pub rows_total: usize,
    pub rows_inserted: usize,
    pub rows_skipped: usize,
    /// Timing is synthetic - true durations were lost
    pub synthetic_timestamps: bool,
    /// Time/speed columns were picked positionally - stats are advisory
    pub fallback_schema: bool,
    /// duration_min is a row count, not a time value
    pub degraded_duration: bool,
    pub summary: TripSummary,
}

/// Ingest one completed CSV upload.
///
/// The emitter step runs after the batch has committed and cannot fail the
/// ingestion; pass `None` to skip event dispatch entirely.
pub async fn run_ingestion(
    path: &Path,
    writer: &dyn TelemetryDbWriter,
    emitter: Option<&EventEmitter>,
) -> Result<IngestReport, IngestError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    log::info!("🚀 Ingesting {}", filename);

    let raw = read_csv(path)?;
    let mapping = ColumnMapping::resolve(&raw.headers);
    if mapping.fallback_used {
        log::warn!("⚠️  {}: schema fallback active, trip stats are advisory", filename);
    }

    let ingested_at = chrono::Utc::now();
    let batch = normalize_rows(&raw.rows, &mapping, &filename, ingested_at);

    let (summary, degraded_duration) = summarize(&batch.samples, &mapping, &filename);

    match writer.write_batch(&batch.samples, &mapping).await {
        Ok(stored) => {
            log::debug!("Stored {} new rows for {}", stored, filename);
        }
        Err(e) => {
            log::error!(
                "❌ Batch write failed for {} ({} rows attempted): {}",
                filename,
                batch.samples.len(),
                e
            );
            return Err(e);
        }
    }
    writer.write_summary(&summary).await?;

    let report = IngestReport {
        filename: filename.clone(),
        rows_total: raw.rows.len() + raw.malformed,
        rows_inserted: batch.samples.len(),
        rows_skipped: batch.rows_skipped + raw.malformed,
        synthetic_timestamps: batch.synthetic_timestamps,
        fallback_schema: mapping.fallback_used,
        degraded_duration,
        summary,
    };

    if let Some(emitter) = emitter {
        let event = TripEvent::from_summary(&report.summary, chrono::Utc::now());
        emitter.emit(&event).await;
    }

    log::info!(
        "✅ {} ingested: {} rows ({} skipped), {:.2} km in {} min",
        filename,
        report.rows_inserted,
        report.rows_skipped,
        report.summary.distance_km,
        report.summary.duration_min
    );

    Ok(report)
}
