//! Ingest Core - CSV schema inference, normalization and trip aggregation
//!
//! The pure in-memory stages of the pipeline. No suspension points here:
//! everything between reading the file and writing the batch is plain
//! computation.
//!
//! # Architecture
//!
//! ```text
//! CSV file → reader (headers + raw rows)
//!     ↓
//! ColumnMapping (synonym match, positional fallback)
//!     ↓
//! normalizer (per-row: timestamps, float coercion, skip accounting)
//!     ↓
//! aggregator (whole trip: distance, duration, battery, speed, scores)
//! ```

pub mod aggregator;
pub mod normalizer;
pub mod reader;
pub mod schema;

pub use aggregator::{summarize, DistanceSemantics, TripSummary};
pub use normalizer::{normalize_rows, parse_timestamp, NormalizedBatch, TelemetrySample};
pub use reader::{read_csv, RawFile};
pub use schema::{Channel, ColumnMapping, ColumnRef};
