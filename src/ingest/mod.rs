pub mod product;

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

use crate::db::models::NewProduct;
use crate::db::Database;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    pub fn detect_from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yaml" | "yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Counts from an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }

    fn add(&mut self, other: ImportReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
    }
}

/// Import one or more paths (files, directories or glob patterns).
pub fn import_paths(
    db: &Database,
    paths: &[String],
    format_override: Option<Format>,
    dry_run: bool,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for path_str in paths {
        let path = Path::new(path_str);
        if path.is_dir() {
            report.add(import_directory(db, path, format_override, dry_run)?);
        } else if path.is_file() {
            report.add(import_file(db, path, format_override, dry_run)?);
        } else {
            // Try glob pattern
            let matches: Vec<_> = glob::glob(path_str)
                .with_context(|| format!("Invalid path or glob pattern: {path_str}"))?
                .filter_map(|r| r.ok())
                .collect();

            if matches.is_empty() {
                bail!("No files found matching: {path_str}");
            }

            for entry in matches {
                if entry.is_file() {
                    report.add(import_file(db, &entry, format_override, dry_run)?);
                }
            }
        }
    }

    Ok(report)
}

fn import_directory(
    db: &Database,
    dir: &Path,
    format_override: Option<Format>,
    dry_run: bool,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            report.add(import_directory(db, &path, format_override, dry_run)?);
        } else if path.is_file() {
            // Only process known extensions unless format is overridden
            if format_override.is_some() || Format::detect_from_extension(&path).is_some() {
                report.add(import_file(db, &path, format_override, dry_run)?);
            }
        }
    }

    Ok(report)
}

fn import_file(
    db: &Database,
    path: &Path,
    format_override: Option<Format>,
    dry_run: bool,
) -> Result<ImportReport> {
    let format = format_override
        .or_else(|| Format::detect_from_extension(path))
        .with_context(|| format!("Cannot determine format for: {}", path.display()))?;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read: {}", path.display()))?;

    let products = parse_content(&content, format)
        .with_context(|| format!("Failed to import: {}", path.display()))?;

    let report = store_products(db, &products, dry_run)?;
    info!(
        "Imported {} ({} new, {} updated)",
        path.display(),
        report.inserted,
        report.updated
    );
    Ok(report)
}

pub fn parse_content(content: &str, format: Format) -> Result<Vec<NewProduct>> {
    match format {
        Format::Json => product::parse_json(content),
        Format::Yaml => product::parse_yaml(content),
    }
}

/// Upsert `products`, or only count what would happen when `dry_run`.
pub fn store_products(db: &Database, products: &[NewProduct], dry_run: bool) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    for p in products {
        if dry_run {
            let exists = db.product_exists(&p.id)?;
            println!(
                "  [dry-run] Would {}: {} ({})",
                if exists { "update" } else { "add" },
                p.name,
                p.category
            );
            if exists {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
            continue;
        }
        if db.upsert_product(p)? {
            report.inserted += 1;
        } else {
            report.updated += 1;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection() {
        assert_eq!(Format::detect_from_extension(Path::new("a.yml")), Some(Format::Yaml));
        assert_eq!(Format::detect_from_extension(Path::new("a.json")), Some(Format::Json));
        assert_eq!(Format::detect_from_extension(Path::new("a.csv")), None);
        assert_eq!(Format::parse("YAML"), Some(Format::Yaml));
    }

    #[test]
    fn store_counts_new_and_updated() {
        let db = Database::open_in_memory().unwrap();
        let products =
            parse_content(r#"[{"id": "a", "name": "One"}, {"id": "b", "name": "Two"}]"#, Format::Json)
                .unwrap();

        let dry = store_products(&db, &products, true).unwrap();
        assert_eq!(dry, ImportReport { inserted: 2, updated: 0 });
        assert!(db.list_products().unwrap().is_empty());

        store_products(&db, &products[..1], false).unwrap();
        let report = store_products(&db, &products, false).unwrap();
        assert_eq!(report, ImportReport { inserted: 1, updated: 1 });
        assert_eq!(report.total(), 2);
    }
}
