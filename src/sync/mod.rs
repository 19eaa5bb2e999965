pub mod rest;
pub mod state;

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

use crate::catalog::live::{diff_snapshots, ChangeEvent};
use crate::config::BackendConfig;
use crate::db::models::NewProduct;
use crate::db::Database;

/// Trait that all product sources implement.
pub trait ProductSource {
    /// Source name (used as label in sync_runs and the cursor key).
    fn name(&self) -> &str;

    /// Full current product list, newest first.
    fn fetch_snapshot(&self) -> Result<Vec<NewProduct>>;
}

pub struct SyncOptions {
    pub dry_run: bool,
}

/// Result of a sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub source: String,
    pub remote_total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub duration_secs: f64,
}

impl SyncReport {
    pub fn changes(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// Mirror the source's snapshot into the local products table.
pub fn run_sync(source: &dyn ProductSource, db: &Database, opts: &SyncOptions) -> Result<SyncReport> {
    let start = Instant::now();
    let name = source.name().to_string();

    eprintln!("Fetching products from {}...", name);
    let remote = source.fetch_snapshot()?;
    let local: Vec<NewProduct> = db.list_products()?.iter().map(NewProduct::from).collect();
    let changes = diff_snapshots(&local, &remote);

    let mut report = SyncReport {
        source: name.clone(),
        remote_total: remote.len(),
        inserted: 0,
        updated: 0,
        deleted: 0,
        failed: 0,
        dry_run: opts.dry_run,
        duration_secs: 0.0,
    };

    eprintln!(
        "  Remote: {} products, local: {}, {} changes",
        remote.len(),
        local.len(),
        changes.len()
    );

    if opts.dry_run {
        for change in &changes {
            eprintln!("  [dry-run] Would {} {}", change.kind(), change.key());
            match change {
                ChangeEvent::Insert(_) => report.inserted += 1,
                ChangeEvent::Update(_) => report.updated += 1,
                ChangeEvent::Delete(_) => report.deleted += 1,
            }
        }
        report.duration_secs = start.elapsed().as_secs_f64();
        return Ok(report);
    }

    let run_id = state::start_sync_run(&db.conn, &name, "snapshot")?;

    // Oldest first, so local rowids keep the remote's newest-first order.
    for change in changes.into_iter().rev() {
        let kind = change.kind();
        let key = change.key().to_string();
        let outcome = match change {
            ChangeEvent::Insert(p) | ChangeEvent::Update(p) => db.upsert_product(&p).map(|_| ()),
            ChangeEvent::Delete(id) => db.delete_product(&id).map(|_| ()),
        };
        match outcome {
            Ok(()) => match kind {
                "insert" => report.inserted += 1,
                "update" => report.updated += 1,
                _ => report.deleted += 1,
            },
            Err(e) => {
                report.failed += 1;
                warn!("Failed to {kind} product {key}: {e:#}");
            }
        }
    }

    let status = if report.failed > 0 && report.changes() == 0 {
        "failed"
    } else {
        "completed"
    };
    state::complete_sync_run(
        &db.conn,
        run_id,
        &state::RunCounts {
            found: report.remote_total,
            inserted: report.inserted,
            updated: report.updated,
            deleted: report.deleted,
            errors: report.failed,
        },
        status,
    )?;

    let key = format!("{}.last_sync_at", name);
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    state::set_sync_state(&db.conn, &key, &now)?;

    report.duration_secs = start.elapsed().as_secs_f64();
    info!(
        "Sync {}: {} inserted, {} updated, {} deleted, {} failed ({:.1}s)",
        name, report.inserted, report.updated, report.deleted, report.failed, report.duration_secs
    );
    Ok(report)
}

/// When `source` last completed a sync, if ever.
pub fn last_sync_at(db: &Database, source: &str) -> Result<Option<String>> {
    state::get_sync_state(&db.conn, &format!("{}.last_sync_at", source))
}

/// Build the backend source from config + resolved API key.
pub fn build_source(config: Option<&BackendConfig>, api_key: String) -> Result<Box<dyn ProductSource>> {
    let Some(url) = config.and_then(|c| c.url.as_deref()).filter(|u| !u.is_empty()) else {
        bail!("No backend url configured. Set [backend] url in ~/.fireshow/config.toml");
    };
    let table = config.map(|c| c.products_table()).unwrap_or(crate::config::DEFAULT_PRODUCTS_TABLE);
    Ok(Box::new(rest::RestProductSource::new(api_key, url, table)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<NewProduct>);

    impl ProductSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_snapshot(&self) -> Result<Vec<NewProduct>> {
            Ok(self.0.clone())
        }
    }

    fn product(id: &str, price: f64) -> NewProduct {
        NewProduct {
            id: id.to_string(),
            name: format!("Product {id}"),
            code: None,
            manufacturer: None,
            category: "Cakes".to_string(),
            effect: None,
            price,
            duration_seconds: None,
            active: true,
            description: String::new(),
            image_url: None,
        }
    }

    #[test]
    fn sync_inserts_updates_and_deletes() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_product(&product("keep", 10.0)).unwrap();
        db.upsert_product(&product("change", 10.0)).unwrap();
        db.upsert_product(&product("gone", 10.0)).unwrap();

        let source = FixedSource(vec![product("new", 5.0), product("change", 12.0), product("keep", 10.0)]);
        let report = run_sync(&source, &db, &SyncOptions { dry_run: false }).unwrap();

        assert_eq!((report.inserted, report.updated, report.deleted), (1, 1, 1));
        assert_eq!(report.failed, 0);
        assert!(db.get_product("gone").unwrap().is_none());
        assert_eq!(db.get_product("change").unwrap().unwrap().price, 12.0);
        assert!(last_sync_at(&db, "fixed").unwrap().is_some());
        assert_eq!(
            state::last_run_status(&db.conn, "fixed").unwrap().as_deref(),
            Some("completed")
        );

        let again = run_sync(&source, &db, &SyncOptions { dry_run: false }).unwrap();
        assert_eq!(again.changes(), 0);
    }

    #[test]
    fn dry_run_leaves_database_alone() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_product(&product("old", 1.0)).unwrap();
        let source = FixedSource(vec![product("a", 1.0)]);
        let report = run_sync(&source, &db, &SyncOptions { dry_run: true }).unwrap();

        assert_eq!((report.inserted, report.deleted), (1, 1));
        assert!(db.get_product("old").unwrap().is_some());
        assert!(last_sync_at(&db, "fixed").unwrap().is_none());
    }

    #[test]
    fn build_source_needs_url() {
        assert!(build_source(None, "k".into()).is_err());
        let bc = BackendConfig {
            url: Some("https://x.example.co".into()),
            ..BackendConfig::default()
        };
        assert_eq!(build_source(Some(&bc), "k".into()).unwrap().name(), "backend");
    }
}
