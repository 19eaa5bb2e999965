use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Run all pending migrations. The v1 tables come from schema.rs; changes
/// after v1 are numbered migrations applied once each.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Ensure migrations tracking table exists
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS fireshow_migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;

    run_migration(conn, 1, "index_quote_status", |c| {
        c.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_quotes_status ON quote_requests(status, created_at);",
        )?;
        Ok(())
    })?;

    Ok(())
}

fn run_migration<F>(conn: &Connection, id: i64, name: &str, f: F) -> Result<()>
where
    F: FnOnce(&Connection) -> Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM fireshow_migrations WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if already_applied {
        return Ok(());
    }

    f(conn)?;

    conn.execute(
        "INSERT INTO fireshow_migrations (id, name) VALUES (?1, ?2)",
        rusqlite::params![id, name],
    )?;

    info!("Applied migration {id}: {name}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::create_schema(&conn).unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM fireshow_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(applied, 1);
    }
}
