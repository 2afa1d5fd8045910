//! SQLite schema for the upload ledger

use crate::error::Result;
use rusqlite::Connection;

/// Bumped whenever the table layout changes
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize ledger schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS file_records (
            key TEXT PRIMARY KEY NOT NULL,
            filename TEXT NOT NULL,
            camera_name TEXT NOT NULL CHECK (length(trim(camera_name)) > 0),
            capture_timestamp TEXT NOT NULL,
            given_name TEXT NOT NULL,
            duration_seconds REAL NOT NULL DEFAULT 0,
            size_bytes INTEGER NOT NULL,

            -- Lifecycle
            discovered_on TEXT NOT NULL,
            uploaded_on TEXT,
            confirmed_on TEXT,

            -- Job/shard assignment, all three or none
            job_id TEXT,
            shard_id TEXT,
            upload_url TEXT,

            latitude REAL,
            longitude REAL,

            CHECK (
                (job_id IS NULL AND shard_id IS NULL AND upload_url IS NULL)
                OR (job_id IS NOT NULL AND shard_id IS NOT NULL AND upload_url IS NOT NULL)
            )
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_shard ON file_records(job_id, shard_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_filename ON file_records(filename)",
        [],
    )?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(())
}
