//! WheelFlow - WheelLog telemetry ingestion and trip summarization
//!
//! Ingests telemetry CSV files produced by personal-EV tracking apps,
//! normalizes their inconsistent schemas into typed samples, computes a
//! per-trip summary, persists both into a time-keyed SQLite store, and
//! hands the finished summary to downstream notification collaborators.
//!
//! # Pipeline
//!
//! ```text
//! CSV file → ingest_core (resolve → normalize → aggregate)
//!     ↓
//! store (atomic batch insert, duplicate-tolerant, summary upsert)
//!     ↓
//! emitter (best-effort webhook/analyzer fan-out)
//! ```
//!
//! One file is one unit of work; files may be ingested concurrently but a
//! single file's pipeline is strictly sequential.

pub mod config;
pub mod emitter;
pub mod error;
pub mod ingest_core;
pub mod ingestion;
pub mod store;

pub use config::PipelineConfig;
pub use emitter::{EventEmitter, TripEvent};
pub use error::IngestError;
pub use ingest_core::{ColumnMapping, TelemetrySample, TripSummary};
pub use ingestion::{run_ingestion, IngestReport};
pub use store::{init_schema, SqliteTelemetryWriter, TelemetryDbWriter};
