//! ==============================================================================
//! store.rs - append-only sensor log on sqlite
//! ==============================================================================
//!
//! purpose:
//!     owns the `sensor_data` table: idempotent schema creation, single-row
//!     insert, and the most-recent-rows scan the query service builds on.
//!
//! connection model:
//!     there is no long-lived connection. every operation opens the file,
//!     does its work and drops the connection, so the writer process and any
//!     number of reader processes only ever contend on sqlite's own locks.
//!     busy/locked errors come back as StoreError::ConnectionFailed and are
//!     NOT retried here; the caller retries on its next cycle.
//!
//! no update or delete is exposed.
//!
//! ==============================================================================

use crate::domain::{Reading, ReadingPayload, StoredReading};
use crate::error::StoreError;

use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type RowId = i64;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sensor_data (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        sensorId  TEXT NOT NULL,
        type      TEXT,
        value     REAL NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp
        ON sensor_data (timestamp DESC);
";

/// handle to the log file; cloning is free, nothing is held open
#[derive(Clone, Debug)]
pub struct LogStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl LogStore {
    pub fn new<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Self {
        Self { path: path.as_ref().to_path_buf(), busy_timeout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// open a read-write connection, creating the file if needed
    fn open_rw(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    /// open an existing file without creating it; a missing file is a missing schema
    fn open_existing(&self) -> Result<Connection, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::SchemaMissing);
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    /// create the table and index if absent
    ///
    /// idempotent DDL, so concurrent callers from different processes are fine.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.open_rw()?;
        // WAL lets readers scan while the writer appends
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(CREATE_SCHEMA)?;
        tracing::debug!(path = %self.path.display(), "sensor_data schema verified");
        Ok(())
    }

    /// insert one reading and return its row id
    ///
    /// absent fields are bound as NULL; the table's NOT NULL constraints
    /// reject them with StoreError::ConstraintViolation.
    pub fn append(&self, payload: &ReadingPayload) -> Result<RowId, StoreError> {
        let conn = self.open_rw()?;
        conn.execute(
            "INSERT INTO sensor_data (sensorId, type, value, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![payload.sensor_id, payload.kind, payload.value, payload.timestamp],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// the `limit` rows with the greatest timestamps, newest first
    ///
    /// ties on timestamp fall back to insertion order. rows that do not
    /// convert (e.g. a TEXT `value` left by another writer) are skipped with a
    /// warning, so the caller still gets the rest of the window.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredReading>, StoreError> {
        let conn = self.open_existing()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, sensorId, type, value, timestamp
             FROM sensor_data
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(StoredReading {
                id: row.get(0)?,
                reading: Reading {
                    sensor_id: row.get(1)?,
                    kind: row.get(2)?,
                    value: row.get(3)?,
                    timestamp: row.get(4)?,
                },
            })
        })?;
        let rows = rows
            .filter_map(|row| match row {
                Ok(stored) => Some(stored),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "skipping unreadable sensor_data row: {}", e);
                    None
                }
            })
            .collect();
        Ok(rows)
    }

    /// total number of rows in the log
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.open_existing()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM sensor_data", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }
}
