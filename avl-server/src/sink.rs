//! Record sink — durable persistence behind an async trait.
//!
//! Sessions only see the `RecordSink` trait; the concrete backend here
//! is SQLite (WAL mode, single `records` table). Each saved batch
//! acquires its own connection and releases it on every exit path, so
//! any number of sessions can save concurrently without coordinating.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::Serialize;

use avl_core::PositionRecord;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("sink task failed: {0}")]
    Task(String),
}

/// Durable persistence for validated position records.
///
/// Implementations must be safe for concurrent independent use; the
/// server never serializes access itself.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist an ordered batch. Failure loses the batch; the caller
    /// logs and moves on, it never retries.
    async fn save_records(&self, records: &[PositionRecord]) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// SQLite backend
// ---------------------------------------------------------------------------

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    imei TEXT NOT NULL,
    lon REAL NOT NULL,
    lat REAL NOT NULL,
    alt REAL,
    course REAL,
    speed INTEGER,
    satellites INTEGER,
    gpstime INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    protocol TEXT NOT NULL,
    valid INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_imei ON records(imei);
CREATE INDEX IF NOT EXISTS idx_records_gpstime ON records(gpstime);
"#;

/// SQLite-backed sink. Holds only the database path; connections are
/// opened per batch.
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    /// Create the database and schema up front so a bad path fails at
    /// startup, not on the first batch.
    pub fn open(path: &str) -> Result<Self, SinkError> {
        if let Some(parent) = Path::new(path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(SqliteSink {
            path: PathBuf::from(path),
        })
    }

    fn insert_batch(conn: &mut Connection, records: &[PositionRecord]) -> Result<(), SinkError> {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records
                 (imei, lon, lat, alt, course, speed, satellites, gpstime, timestamp, protocol, valid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for rec in records {
                stmt.execute(params![
                    rec.imei,
                    rec.location.lon(),
                    rec.location.lat(),
                    rec.altitude,
                    rec.course,
                    rec.speed,
                    rec.satellites,
                    rec.gpstime,
                    rec.timestamp,
                    rec.protocol.as_str(),
                    rec.valid as i32,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Summary for the `stats` subcommand.
    pub fn stats(&self) -> Result<SinkStats, SinkError> {
        let conn = Connection::open(&self.path)?;
        let records: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
        let devices: i64 =
            conn.query_row("SELECT COUNT(DISTINCT imei) FROM records", [], |r| r.get(0))?;
        let valid: i64 =
            conn.query_row("SELECT COUNT(*) FROM records WHERE valid = 1", [], |r| {
                r.get(0)
            })?;
        let last_gpstime: Option<i64> =
            conn.query_row("SELECT MAX(gpstime) FROM records", [], |r| r.get(0))?;

        Ok(SinkStats {
            records,
            devices,
            valid,
            last_gpstime,
        })
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn save_records(&self, records: &[PositionRecord]) -> Result<(), SinkError> {
        let path = self.path.clone();
        let batch = records.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            Self::insert_batch(&mut conn, &batch)
        })
        .await
        .map_err(|e| SinkError::Task(e.to_string()))?
    }
}

#[derive(Debug, Serialize)]
pub struct SinkStats {
    pub records: i64,
    pub devices: i64,
    pub valid: i64,
    pub last_gpstime: Option<i64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;
    use avl_core::{GeoPoint, Protocol};

    fn sample_record(imei: &str, gpstime: i64) -> PositionRecord {
        PositionRecord {
            imei: imei.into(),
            location: GeoPoint::new(20.45, 44.8),
            altitude: 123.4,
            course: 90.0,
            speed: 57,
            satellites: 7,
            sensors: Vec::new(),
            gpstime,
            timestamp: gpstime + 1,
            protocol: Protocol::Ruptela,
            valid: true,
        }
    }

    #[tokio::test]
    async fn test_sqlite_save_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let sink = SqliteSink::open(path.to_str().unwrap()).unwrap();

        sink.save_records(&[sample_record("000000000000001", 100)])
            .await
            .unwrap();
        sink.save_records(&[
            sample_record("000000000000001", 200),
            sample_record("000000000000002", 300),
        ])
        .await
        .unwrap();

        let stats = sink.stats().unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.devices, 2);
        assert_eq!(stats.valid, 3);
        assert_eq!(stats.last_gpstime, Some(300));
    }

    #[tokio::test]
    async fn test_empty_database_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let sink = SqliteSink::open(path.to_str().unwrap()).unwrap();

        let stats = sink.stats().unwrap();
        assert_eq!(stats.records, 0);
        assert_eq!(stats.last_gpstime, None);
    }

    #[tokio::test]
    async fn test_concurrent_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let sink = std::sync::Arc::new(SqliteSink::open(path.to_str().unwrap()).unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.save_records(&[sample_record("000000000000009", i)])
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(sink.stats().unwrap().records, 8);
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/records.db");
        assert!(SqliteSink::open(path.to_str().unwrap()).is_ok());
        assert!(path.exists());
    }
}
