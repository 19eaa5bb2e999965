use anyhow::Result;
use rusqlite::Connection;

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Version tracking
        CREATE TABLE IF NOT EXISTS fireshow_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Local mirror of the hosted catalog
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT,
            manufacturer TEXT,
            category TEXT NOT NULL DEFAULT '',
            effect TEXT,
            price REAL NOT NULL DEFAULT 0,
            duration_seconds REAL,
            active INTEGER NOT NULL DEFAULT 1,
            description TEXT NOT NULL DEFAULT '',
            image_url TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Leads from the quote form
        CREATE TABLE IF NOT EXISTS quote_requests (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            event_date TEXT NOT NULL,
            event_type TEXT NOT NULL DEFAULT 'other',
            location TEXT NOT NULL DEFAULT '',
            guest_count INTEGER,
            budget REAL,
            interest TEXT,
            message TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'new',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Staff directory used for role checks
        CREATE TABLE IF NOT EXISTS staff (
            email TEXT PRIMARY KEY COLLATE NOCASE,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Backend sync bookkeeping
        CREATE TABLE IF NOT EXISTS sync_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS sync_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            mode TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            products_found INTEGER NOT NULL DEFAULT 0,
            inserted INTEGER NOT NULL DEFAULT 0,
            updated INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'running'
        );

        -- Indexes for common filters
        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_products_created ON products(created_at);
        CREATE INDEX IF NOT EXISTS idx_quotes_created ON quote_requests(created_at);
        ",
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO fireshow_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
