pub mod migrations;
pub mod models;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::session::Role;
use models::*;

pub struct Database {
    pub conn: Connection,
    pub path: PathBuf,
}

const PRODUCT_COLUMNS: &str = "id, name, code, manufacturer, category, effect, price, duration_seconds, active, description, image_url, created_at, updated_at";

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Performance pragmas
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        Self::init(conn, path.to_path_buf())
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        schema::create_schema(&conn)?;
        migrations::run_migrations(&conn)?;

        info!("Opened database: {}", path.display());

        Ok(Database { conn, path })
    }

    /// Default database path: ~/.fireshow/fireshow.db
    pub fn default_db_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".fireshow").join("fireshow.db"))
    }

    /// Insert or update a product. Returns true when the id was new.
    pub fn upsert_product(&self, p: &NewProduct) -> Result<bool> {
        let existed = self.product_exists(&p.id)?;
        self.conn.execute(
            "INSERT INTO products (id, name, code, manufacturer, category, effect, price, duration_seconds, active, description, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                name = ?2, code = ?3, manufacturer = ?4, category = ?5, effect = ?6,
                price = ?7, duration_seconds = ?8, active = ?9, description = ?10, image_url = ?11,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
            rusqlite::params![
                p.id,
                p.name,
                p.code,
                p.manufacturer,
                p.category,
                p.effect,
                p.price,
                p.duration_seconds,
                p.active,
                p.description,
                p.image_url,
            ],
        )?;
        Ok(!existed)
    }

    /// Get a single product by ID.
    pub fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let result = self
            .conn
            .query_row(&sql, [id], product_from_row)
            .optional()?;
        Ok(result)
    }

    /// All products, newest first.
    pub fn list_products(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, rowid DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], product_from_row)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// Delete a product.
    pub fn delete_product(&self, id: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM products WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Flip the active flag. Returns false for an unknown id.
    pub fn set_product_active(&self, id: &str, active: bool) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE products SET active = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now') WHERE id = ?1",
            rusqlite::params![id, active],
        )?;
        Ok(updated > 0)
    }

    /// Check if a product exists.
    pub fn product_exists(&self, id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products WHERE id = ?1",
            [id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Add a staff member or change their role.
    pub fn upsert_staff(&self, email: &str, role: Role) -> Result<()> {
        self.conn.execute(
            "INSERT INTO staff (email, role) VALUES (?1, ?2)
             ON CONFLICT(email) DO UPDATE SET role = ?2",
            rusqlite::params![email.trim(), role],
        )?;
        info!("Staff {email} is now {role}");
        Ok(())
    }

    pub fn remove_staff(&self, email: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM staff WHERE email = ?1", [email.trim()])?;
        Ok(deleted > 0)
    }

    /// Look up a staff member (email compared case-insensitively).
    pub fn get_staff(&self, email: &str) -> Result<Option<StaffMember>> {
        let result = self
            .conn
            .query_row(
                "SELECT email, role, created_at FROM staff WHERE email = ?1",
                [email.trim()],
                |row| {
                    Ok(StaffMember {
                        email: row.get(0)?,
                        role: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_staff(&self) -> Result<Vec<StaffMember>> {
        let mut stmt = self
            .conn
            .prepare("SELECT email, role, created_at FROM staff ORDER BY email")?;
        let rows = stmt.query_map([], |row| {
            Ok(StaffMember {
                email: row.get(0)?,
                role: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        let mut staff = Vec::new();
        for row in rows {
            staff.push(row?);
        }
        Ok(staff)
    }

    pub fn staff_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM staff", [], |r| r.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<DbStats> {
        let products: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
        let active_products: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products WHERE active = 1", [], |r| r.get(0))?;
        let quote_requests: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM quote_requests", [], |r| r.get(0))?;
        let open_quote_requests: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quote_requests WHERE status NOT IN ('confirmed', 'cancelled')",
            [],
            |r| r.get(0),
        )?;
        let staff = self.staff_count()?;

        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) FROM products GROUP BY lower(category) ORDER BY lower(category)",
        )?;
        let category_rows = stmt.query_map([], |row| {
            Ok(CategoryCount {
                category: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        let mut categories = Vec::new();
        for row in category_rows {
            categories.push(row?);
        }

        let db_size_bytes = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(DbStats {
            products,
            active_products,
            quote_requests,
            open_quote_requests,
            staff,
            categories,
            db_size_bytes,
        })
    }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        manufacturer: row.get(3)?,
        category: row.get(4)?,
        effect: row.get(5)?,
        price: row.get(6)?,
        duration_seconds: row.get(7)?,
        active: row.get(8)?,
        description: row.get(9)?,
        image_url: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
