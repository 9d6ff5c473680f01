//! End-to-end ingestion tests: CSV file → normalized samples → SQLite
//!
//! Each test builds a real CSV on disk, runs the full pipeline into a
//! tempfile-backed database, and asserts on both the report and the stored
//! rows. These cover the file-level contracts: graceful degradation,
//! idempotent re-ingest, and atomic batch failure.

use rusqlite::Connection;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use wheelflow::ingestion::run_ingestion;
use wheelflow::store::{init_schema, SqliteTelemetryWriter};
use wheelflow::IngestError;

fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn create_writer() -> (NamedTempFile, SqliteTelemetryWriter) {
    let temp = NamedTempFile::new().unwrap();
    let db_path = temp.path().to_str().unwrap().to_string();

    let conn = Connection::open(&db_path).unwrap();
    init_schema(&conn).unwrap();
    drop(conn);

    (temp, SqliteTelemetryWriter::new(&db_path, 5_000).unwrap())
}

fn count_rows(db: &NamedTempFile, session: &str) -> i64 {
    let conn = Connection::open(db.path()).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM telemetry WHERE session_id = ?",
        [session],
        |row| row.get(0),
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_pipeline_happy_path() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "timestamp,speed,battery,totaldistance\n\
         2024-01-05 10:00:00,10.0,90,1000\n\
         2024-01-05 10:05:00,25.0,90,1500\n\
         2024-01-05 10:10:00,15.0,40,4500\n",
    );
    let (db, writer) = create_writer();

    let report = run_ingestion(&path, &writer, None).await.unwrap();

    assert_eq!(report.rows_total, 3);
    assert_eq!(report.rows_inserted, 3);
    assert_eq!(report.rows_skipped, 0);
    assert!(!report.synthetic_timestamps);
    assert!(!report.fallback_schema);
    assert!(!report.degraded_duration);

    // Cumulative odometer: (4500 - 1000) / 1000
    assert_eq!(report.summary.distance_km, 3.5);
    assert_eq!(report.summary.duration_min, 10);
    assert_eq!(report.summary.battery_start, 90);
    assert_eq!(report.summary.battery_end, 40);
    assert_eq!(report.summary.battery_used, 50);
    assert_eq!(report.summary.max_speed, 25.0);
    assert!(report.summary.max_speed >= report.summary.avg_speed);
    assert!(report.summary.avg_speed >= 0.0);

    assert_eq!(count_rows(&db, "ride.csv"), 3);

    // Summary persisted alongside the samples
    let stored = writer.load_summary("ride.csv").unwrap().unwrap();
    assert_eq!(stored.distance_km, 3.5);
    assert_eq!(stored.records_count, 3);
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "timestamp,speed,battery\n\
         2024-01-05 10:00:00,10.0,90\n\
         2024-01-05 10:00:01,12.0,89\n",
    );
    let (db, writer) = create_writer();

    run_ingestion(&path, &writer, None).await.unwrap();
    run_ingestion(&path, &writer, None).await.unwrap();

    // No duplicate (timestamp, session_id) pairs after re-ingest
    assert_eq!(count_rows(&db, "ride.csv"), 2);
}

#[tokio::test]
async fn test_malformed_numeric_cells_coerce_not_skip() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "timestamp,speed,battery\n\
         2024-01-05 10:00:00,garbage,90\n\
         2024-01-05 10:00:01,12.0,??\n",
    );
    let (db, writer) = create_writer();

    let report = run_ingestion(&path, &writer, None).await.unwrap();

    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.rows_skipped, 0);
    assert_eq!(count_rows(&db, "ride.csv"), 2);

    let conn = Connection::open(db.path()).unwrap();
    let speed: f64 = conn
        .query_row(
            "SELECT speed FROM telemetry WHERE session_id = 'ride.csv' ORDER BY timestamp_ms LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(speed, 0.0);
}

#[tokio::test]
async fn test_unparsable_timestamps_go_synthetic() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "timestamp,speed\n\
         yesterday,10.0\n\
         later,12.0\n\
         even later,14.0\n",
    );
    let (db, writer) = create_writer();

    let report = run_ingestion(&path, &writer, None).await.unwrap();

    assert!(report.synthetic_timestamps);
    assert_eq!(report.rows_inserted, report.rows_total);
    assert_eq!(report.rows_skipped, 0);
    assert_eq!(count_rows(&db, "ride.csv"), 3);

    // Synthetic sequence is strictly one second apart
    let conn = Connection::open(db.path()).unwrap();
    let mut stmt = conn
        .prepare("SELECT timestamp_ms FROM telemetry WHERE session_id = 'ride.csv' ORDER BY timestamp_ms")
        .unwrap();
    let timestamps: Vec<i64> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(timestamps.len(), 3);
    assert_eq!(timestamps[1] - timestamps[0], 1_000);
    assert_eq!(timestamps[2] - timestamps[1], 1_000);
}

#[tokio::test]
async fn test_partial_timestamp_corruption_skips_only_bad_rows() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "timestamp,speed\n\
         2024-01-05 10:00:00,10.0\n\
         corrupted,11.0\n\
         2024-01-05 10:00:02,12.0\n",
    );
    let (db, writer) = create_writer();

    let report = run_ingestion(&path, &writer, None).await.unwrap();

    assert_eq!(report.rows_total, 3);
    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.rows_skipped, 1);
    assert!(!report.synthetic_timestamps);
    assert_eq!(count_rows(&db, "ride.csv"), 2);
}

#[tokio::test]
async fn test_unrecognized_headers_fall_back_positionally() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "c1,c2\n\
         2024-01-05 10:00:00,18.5\n\
         2024-01-05 10:01:00,21.0\n",
    );
    let (db, writer) = create_writer();

    let report = run_ingestion(&path, &writer, None).await.unwrap();

    // First column became time, second became speed - advisory stats
    assert!(report.fallback_schema);
    assert_eq!(report.summary.max_speed, 21.0);
    assert_eq!(report.summary.duration_min, 1);
    assert_eq!(count_rows(&db, "ride.csv"), 2);
}

#[tokio::test]
async fn test_empty_file_yields_default_summary() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "empty.csv", "timestamp,speed,battery\n");
    let (db, writer) = create_writer();

    let report = run_ingestion(&path, &writer, None).await.unwrap();

    assert_eq!(report.rows_total, 0);
    assert_eq!(report.rows_inserted, 0);
    assert_eq!(report.summary.distance_km, 0.0);
    assert_eq!(report.summary.duration_min, 0);
    assert_eq!(report.summary.battery_used, 0);
    assert_eq!(count_rows(&db, "empty.csv"), 0);
}

#[tokio::test]
async fn test_undecodable_records_counted_as_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ride.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"timestamp,speed\n2024-01-05 10:00:00,10.0\n\xff\xfe,11.0\n2024-01-05 10:00:02,12.0\n")
        .unwrap();
    drop(file);
    let (db, writer) = create_writer();

    let report = run_ingestion(&path, &writer, None).await.unwrap();

    // The unreadable record is accounted for, not silently vanished
    assert_eq!(report.rows_total, 3);
    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(count_rows(&db, "ride.csv"), 2);
}

#[tokio::test]
async fn test_store_failure_propagates_with_nothing_persisted() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "timestamp,speed,battery\n\
         2024-01-05 10:00:00,10.0,90\n\
         2024-01-05 10:00:01,12.0,89\n",
    );
    let (db, writer) = create_writer();

    // Destination vanishes after the writer is up; the batch must fail as a
    // whole and no summary may be written for the session
    let conn = Connection::open(db.path()).unwrap();
    conn.execute("DROP TABLE telemetry", []).unwrap();
    drop(conn);

    let result = run_ingestion(&path, &writer, None).await;
    assert!(matches!(result, Err(IngestError::Store(_))));

    let conn = Connection::open(db.path()).unwrap();
    let summaries: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM trip_summaries WHERE filename = 'ride.csv'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(summaries, 0);
}

#[tokio::test]
async fn test_missing_file_reports_failure_not_fabricated_success() {
    let (_db, writer) = create_writer();

    let result = run_ingestion(std::path::Path::new("/nonexistent/ride.csv"), &writer, None).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_concurrent_ingestion_of_two_files() {
    let dir = TempDir::new().unwrap();
    let path_a = write_csv(
        &dir,
        "ride_a.csv",
        "timestamp,speed,battery\n\
         2024-01-05 10:00:00,10.0,90\n\
         2024-01-05 10:00:01,11.0,89\n",
    );
    let path_b = write_csv(
        &dir,
        "ride_b.csv",
        "timestamp,speed,battery\n\
         2024-01-05 10:00:00,20.0,70\n\
         2024-01-05 10:00:01,21.0,69\n",
    );
    let (db, writer) = create_writer();
    let writer = std::sync::Arc::new(writer);

    let w_a = writer.clone();
    let w_b = writer.clone();
    let task_a = tokio::spawn(async move { run_ingestion(&path_a, w_a.as_ref(), None).await });
    let task_b = tokio::spawn(async move { run_ingestion(&path_b, w_b.as_ref(), None).await });

    let report_a = task_a.await.unwrap().unwrap();
    let report_b = task_b.await.unwrap().unwrap();

    assert_eq!(report_a.rows_inserted, 2);
    assert_eq!(report_b.rows_inserted, 2);
    // Same timestamps in different sessions must not collide
    assert_eq!(count_rows(&db, "ride_a.csv"), 2);
    assert_eq!(count_rows(&db, "ride_b.csv"), 2);
}

#[tokio::test]
async fn test_event_emission_failure_does_not_fail_ingestion() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ride.csv",
        "timestamp,speed,battery\n\
         2024-01-05 10:00:00,10.0,90\n",
    );
    let (db, writer) = create_writer();

    // Unreachable collaborator: persistence must still succeed
    let emitter = wheelflow::EventEmitter::new(Some("http://127.0.0.1:1/webhook".to_string()), None);
    let report = run_ingestion(&path, &writer, Some(&emitter)).await.unwrap();

    assert_eq!(report.rows_inserted, 1);
    assert_eq!(count_rows(&db, "ride.csv"), 1);
}
