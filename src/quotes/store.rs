use anyhow::{bail, Result};
use rusqlite::{OptionalExtension, Row};
use tracing::info;

use super::QuoteStatus;
use crate::db::models::{NewQuoteRequest, QuoteRequest};
use crate::db::Database;

const QUOTE_COLUMNS: &str = "id, name, email, phone, event_date, event_type, location, guest_count, budget, interest, message, status, created_at, updated_at";

impl Database {
    /// Store a validated quote request with status `new`.
    pub fn insert_quote(&self, q: &NewQuoteRequest) -> Result<()> {
        self.conn.execute(
            "INSERT INTO quote_requests (id, name, email, phone, event_date, event_type, location, guest_count, budget, interest, message, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                q.id,
                q.name,
                q.email,
                q.phone,
                q.event_date,
                q.event_type,
                q.location,
                q.guest_count,
                q.budget,
                q.interest,
                q.message,
                QuoteStatus::New,
            ],
        )?;
        info!("Quote request {} from {}", q.id, q.email);
        Ok(())
    }

    pub fn get_quote(&self, id: &str) -> Result<Option<QuoteRequest>> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quote_requests WHERE id = ?1");
        let result = self
            .conn
            .query_row(&sql, [id], quote_from_row)
            .optional()?;
        Ok(result)
    }

    /// Quote requests, newest first, optionally only those in `status`.
    pub fn list_quotes(&self, status: Option<QuoteStatus>, limit: usize) -> Result<Vec<QuoteRequest>> {
        let mut quotes = Vec::new();
        match status {
            Some(s) => {
                let sql = format!(
                    "SELECT {QUOTE_COLUMNS} FROM quote_requests WHERE status = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params![s, limit as i64], quote_from_row)?;
                for row in rows {
                    quotes.push(row?);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {QUOTE_COLUMNS} FROM quote_requests
                     ORDER BY created_at DESC, rowid DESC LIMIT ?1"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([limit as i64], quote_from_row)?;
                for row in rows {
                    quotes.push(row?);
                }
            }
        }
        Ok(quotes)
    }

    /// Move a request to `next`, enforcing the status lifecycle.
    pub fn update_quote_status(&self, id: &str, next: QuoteStatus) -> Result<QuoteRequest> {
        let Some(current) = self.get_quote(id)? else {
            bail!("Quote request not found: {id}");
        };
        if !current.status.can_move_to(next) {
            bail!(
                "Cannot move quote request {id} from {} to {next}",
                current.status
            );
        }
        self.conn.execute(
            "UPDATE quote_requests SET status = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
             WHERE id = ?1",
            rusqlite::params![id, next],
        )?;
        info!("Quote request {id}: {} -> {next}", current.status);
        match self.get_quote(id)? {
            Some(q) => Ok(q),
            None => bail!("Quote request vanished during update: {id}"),
        }
    }
}

fn quote_from_row(row: &Row<'_>) -> rusqlite::Result<QuoteRequest> {
    Ok(QuoteRequest {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        event_date: row.get(4)?,
        event_type: row.get(5)?,
        location: row.get(6)?,
        guest_count: row.get(7)?,
        budget: row.get(8)?,
        interest: row.get(9)?,
        message: row.get(10)?,
        status: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
