//! Persistence layer - SQLite-backed time-series store

pub mod db;

pub use db::{init_schema, SqliteTelemetryWriter, StoreStats, TelemetryDbWriter};
