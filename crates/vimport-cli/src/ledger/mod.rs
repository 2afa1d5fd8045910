//! Durable ledger of discovered files
//!
//! One SQLite row per distinct file content, keyed by content key. The ledger
//! runs in autocommit mode with `synchronous = FULL`, so every [`Ledger::put`]
//! is its own committed and fsynced transaction by the time it returns. A
//! crash between two uploads therefore never loses the first one's state.
//!
//! Single writer only; [`crate::instance::InstanceGuard`] keeps a second
//! import from opening the same ledger.

pub mod schema;

use crate::error::{CliError, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::debug;
use vimport_common::{FileRecord, Location, ShardAssignment};

const SELECT_COLUMNS: &str = r#"
    SELECT key, filename, camera_name, capture_timestamp, given_name,
           duration_seconds, size_bytes, discovered_on, uploaded_on, confirmed_on,
           job_id, shard_id, upload_url, latitude, longitude
    FROM file_records
"#;

/// Aggregate view used by `import-video status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: u64,
    pub uploaded: u64,
    pub pending: u64,
    pub pending_assigned: u64,
    pub pending_bytes: u64,
}

pub struct Ledger {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Open (or create) the ledger at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            CliError::ledger(format!("Failed to open ledger '{}': {}", path.display(), e))
        })?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        schema::init_schema(&conn)?;

        debug!(path = %path.display(), "Opened ledger");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing ledger for reporting, without write access
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            CliError::ledger(format!("Failed to open ledger '{}': {}", path.display(), e))
        })?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory ledger, lost on drop
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up a record by content key
    pub fn get(&self, key: &str) -> Result<Option<FileRecord>> {
        let sql = format!("{} WHERE key = ?1", SELECT_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![key], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Insert or update the record stored under `key`.
    ///
    /// `discovered_on` is kept from the first insert; later writes cannot
    /// change it.
    pub fn put(&self, key: &str, record: &FileRecord) -> Result<()> {
        if key != record.key {
            return Err(CliError::ledger(format!(
                "record key '{}' does not match ledger key '{}'",
                record.key, key
            )));
        }
        record.validate()?;

        let size = i64::try_from(record.size_bytes)
            .map_err(|_| CliError::ledger(format!("file size out of range for {}", key)))?;
        let assignment = record.assignment.as_ref();

        self.conn.execute(
            r#"
            INSERT INTO file_records (
                key, filename, camera_name, capture_timestamp, given_name,
                duration_seconds, size_bytes, discovered_on, uploaded_on, confirmed_on,
                job_id, shard_id, upload_url, latitude, longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(key) DO UPDATE SET
                filename = excluded.filename,
                camera_name = excluded.camera_name,
                capture_timestamp = excluded.capture_timestamp,
                given_name = excluded.given_name,
                duration_seconds = excluded.duration_seconds,
                size_bytes = excluded.size_bytes,
                uploaded_on = excluded.uploaded_on,
                confirmed_on = excluded.confirmed_on,
                job_id = excluded.job_id,
                shard_id = excluded.shard_id,
                upload_url = excluded.upload_url,
                latitude = excluded.latitude,
                longitude = excluded.longitude
            "#,
            params![
                key,
                record.filename.to_string_lossy().to_string(),
                record.camera_name,
                record.capture_timestamp,
                record.given_name,
                record.duration_seconds,
                size,
                record.discovered_on,
                record.uploaded_on,
                record.confirmed_on,
                assignment.map(|a| a.job_id.as_str()),
                assignment.map(|a| a.shard_id.as_str()),
                assignment.map(|a| a.upload_url.as_str()),
                record.location.lat,
                record.location.lng,
            ],
        )?;

        Ok(())
    }

    /// Every record, ordered by filename
    pub fn all(&self) -> Result<Vec<FileRecord>> {
        let sql = format!("{} ORDER BY filename ASC, key ASC", SELECT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Every record assigned to the given job shard
    pub fn records_for_shard(&self, job_id: &str, shard_id: &str) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "{} WHERE job_id = ?1 AND shard_id = ?2 ORDER BY filename ASC",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![job_id, shard_id], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let stats = self.conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(uploaded_on IS NOT NULL), 0),
                COALESCE(SUM(uploaded_on IS NULL), 0),
                COALESCE(SUM(uploaded_on IS NULL AND job_id IS NOT NULL), 0),
                COALESCE(SUM(CASE WHEN uploaded_on IS NULL THEN size_bytes ELSE 0 END), 0)
            FROM file_records
            "#,
            [],
            |row| {
                Ok(LedgerStats {
                    total: row.get::<_, i64>(0)?.max(0) as u64,
                    uploaded: row.get::<_, i64>(1)?.max(0) as u64,
                    pending: row.get::<_, i64>(2)?.max(0) as u64,
                    pending_assigned: row.get::<_, i64>(3)?.max(0) as u64,
                    pending_bytes: row.get::<_, i64>(4)?.max(0) as u64,
                })
            },
        )?;
        Ok(stats)
    }

    /// Release the database handle
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| CliError::LedgerDb(e))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let job_id: Option<String> = row.get(10)?;
    let shard_id: Option<String> = row.get(11)?;
    let upload_url: Option<String> = row.get(12)?;
    let assignment = match (job_id, shard_id, upload_url) {
        (Some(job_id), Some(shard_id), Some(upload_url)) => {
            Some(ShardAssignment::new(job_id, shard_id, upload_url))
        },
        _ => None,
    };

    Ok(FileRecord {
        key: row.get(0)?,
        filename: PathBuf::from(row.get::<_, String>(1)?),
        camera_name: row.get(2)?,
        capture_timestamp: row.get(3)?,
        given_name: row.get(4)?,
        duration_seconds: row.get(5)?,
        size_bytes: row.get::<_, i64>(6)?.max(0) as u64,
        discovered_on: row.get(7)?,
        uploaded_on: row.get(8)?,
        confirmed_on: row.get(9)?,
        assignment,
        location: Location::new(row.get(13)?, row.get(14)?),
    })
}
