//! Error taxonomy for the ingestion pipeline
//!
//! Soft failures (unresolved columns, malformed rows, degraded aggregates)
//! never surface here - they are absorbed into counters and flags on the
//! ingest report. This enum covers the hard failures only: I/O, CSV reader
//! breakage, store writes, and schema initialization.

#[derive(Debug)]
pub enum IngestError {
    /// File could not be opened or read
    Io(std::io::Error),
    /// CSV reader could not make sense of the file at all
    Csv(csv::Error),
    /// Batch transaction failed - the whole file is reported as failed,
    /// no partial rows are guaranteed persisted
    Store(rusqlite::Error),
    /// Destination table/partitioning could not be established at startup
    SchemaInit(String),
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err)
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Csv(err)
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Store(err)
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Io(e) => write!(f, "IO error: {}", e),
            IngestError::Csv(e) => write!(f, "CSV error: {}", e),
            IngestError::Store(e) => write!(f, "Store write failed: {}", e),
            IngestError::SchemaInit(msg) => write!(f, "Schema initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for IngestError {}
