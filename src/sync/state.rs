use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

/// Get a sync state value by key.
pub fn get_sync_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let result = conn
        .query_row(
            "SELECT value FROM sync_state WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(result)
}

/// Set a sync state value (upsert).
pub fn set_sync_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_state (key, value, updated_at)
         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Record the start of a sync run. Returns the run ID.
pub fn start_sync_run(conn: &Connection, source: &str, mode: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO sync_runs (source, mode, started_at, status)
         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'), 'running')",
        rusqlite::params![source, mode],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Final counts of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub found: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// Complete a sync run with final counts.
pub fn complete_sync_run(conn: &Connection, run_id: i64, counts: &RunCounts, status: &str) -> Result<()> {
    conn.execute(
        "UPDATE sync_runs SET
            completed_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now'),
            products_found = ?2,
            inserted = ?3,
            updated = ?4,
            deleted = ?5,
            errors = ?6,
            status = ?7
         WHERE id = ?1",
        rusqlite::params![
            run_id,
            counts.found,
            counts.inserted,
            counts.updated,
            counts.deleted,
            counts.errors,
            status
        ],
    )?;
    Ok(())
}

/// Status of the most recent run for `source`, if any.
pub fn last_run_status(conn: &Connection, source: &str) -> Result<Option<String>> {
    let result = conn
        .query_row(
            "SELECT status FROM sync_runs WHERE source = ?1 ORDER BY id DESC LIMIT 1",
            [source],
            |row| row.get(0),
        )
        .optional()?;
    Ok(result)
}
