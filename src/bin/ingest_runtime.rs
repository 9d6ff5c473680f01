//! Ingestion runtime
//!
//! Initializes the destination schema (fatal on failure - no uploads are
//! accepted until the store is ready), then ingests every CSV path given on
//! the command line, or every .csv in the upload directory when no paths are
//! given. One tokio task per file; a single file is sequential internally.
//!
//! Usage:
//!   cargo run --release --bin ingest_runtime [ride1.csv ride2.csv ...]
//!
//! Environment variables:
//!   WHEELFLOW_DB_PATH  - SQLite database path (default: ./wheellog.db)
//!   UPLOAD_DIR         - directory scanned when no args given (default: ./uploads)
//!   N8N_WEBHOOK_URL    - trip-completion webhook (optional)
//!   AI_ANALYZER_URL    - trip analyzer endpoint (optional)
//!   DB_BUSY_TIMEOUT_MS - SQLite busy timeout (default: 5000)

use dotenv::dotenv;
use log::{error, info};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use wheelflow::config::PipelineConfig;
use wheelflow::emitter::EventEmitter;
use wheelflow::ingestion::run_ingestion;
use wheelflow::store::{init_schema, SqliteTelemetryWriter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 WheelFlow ingestion runtime");

    let config = PipelineConfig::from_env();
    config.validate()?;

    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Upload dir: {}", config.upload_dir);
    info!("   ├─ Webhook: {}", config.webhook_url.as_deref().unwrap_or("disabled"));
    info!("   └─ Analyzer: {}", config.analyzer_url.as_deref().unwrap_or("disabled"));

    // Schema init is fatal: do not accept work until the store is ready
    info!("🔧 Initializing destination schema...");
    let conn = Connection::open(&config.db_path)?;
    if let Err(e) = init_schema(&conn) {
        error!("❌ {}", e);
        return Err(e.into());
    }
    drop(conn);

    let writer = Arc::new(SqliteTelemetryWriter::new(
        &config.db_path,
        config.busy_timeout_ms,
    )?);
    let emitter = Arc::new(EventEmitter::new(
        config.webhook_url.clone(),
        config.analyzer_url.clone(),
    ));

    let files = collect_files(&config)?;
    if files.is_empty() {
        info!("No CSV files to ingest, exiting");
        return Ok(());
    }
    info!("📊 {} file(s) queued", files.len());

    // One task per upload; files interleave arbitrarily at the store level
    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let writer = writer.clone();
        let emitter = emitter.clone();
        handles.push(tokio::spawn(async move {
            run_ingestion(&path, writer.as_ref(), Some(emitter.as_ref())).await
        }));
    }

    let mut failures = 0usize;
    for handle in handles {
        match handle.await? {
            Ok(report) => {
                info!(
                    "   ├─ {}: {}/{} rows inserted",
                    report.filename, report.rows_inserted, report.rows_total
                );
            }
            Err(e) => {
                failures += 1;
                error!("   ├─ ingestion failed: {}", e);
            }
        }
    }

    let stats = writer.store_stats()?;
    info!(
        "✅ Done: {} trips, {} records in store ({} failure(s))",
        stats.total_trips, stats.total_records, failures
    );

    if failures > 0 {
        return Err(format!("{} file(s) failed to ingest", failures).into());
    }
    Ok(())
}

fn collect_files(config: &PipelineConfig) -> Result<Vec<PathBuf>, std::io::Error> {
    let args: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if !args.is_empty() {
        return Ok(args);
    }

    let mut files = Vec::new();
    let dir = std::path::Path::new(&config.upload_dir);
    if !dir.exists() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
