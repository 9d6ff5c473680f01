//! CSV file reading for ingestion
//!
//! Reads one completed upload into headers + raw rows. Structurally broken
//! records (bad quoting, encoding damage) are dropped and counted rather than
//! aborting the file; cell-level problems are the normalizer's job.

use crate::error::IngestError;
use csv::StringRecord;
use std::path::Path;

/// One CSV file as read from disk, before normalization
#[derive(Debug)]
pub struct RawFile {
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
    /// Records the CSV reader could not decode at all (dropped, counted as skipped)
    pub malformed: usize,
}

/// Read a CSV file into headers and raw rows.
///
/// Ragged rows (wrong field count) are tolerated - the normalizer treats
/// missing cells as absent values.
pub fn read_csv(path: &Path) -> Result<RawFile, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    let mut malformed = 0usize;

    for record in reader.records() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                malformed += 1;
                log::debug!("Dropped unreadable CSV record: {}", e);
            }
        }
    }

    if malformed > 0 {
        log::warn!(
            "⚠️  {}: dropped {} unreadable records ({} kept)",
            path.display(),
            malformed,
            rows.len()
        );
    }

    Ok(RawFile {
        headers,
        rows,
        malformed,
    })
}
