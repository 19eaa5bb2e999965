use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::db::models::NewProduct;

/// Product record as found in import files and backend rows.
///
/// Accepts a few spellings used by spreadsheets exported from the old site
/// (`sku`, `brand`, `duration`, `is_active`).
#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    pub id: Option<serde_json::Value>,
    pub name: Option<String>,
    #[serde(alias = "sku")]
    pub code: Option<String>,
    #[serde(alias = "brand")]
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub effect: Option<String>,
    pub price: Option<f64>,
    #[serde(alias = "duration")]
    pub duration_seconds: Option<f64>,
    #[serde(alias = "is_active")]
    pub active: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Accepted file shapes: `{ "products": [...] }`, a bare list, or one object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProductFile {
    Wrapped { products: Vec<RawProduct> },
    Many(Vec<RawProduct>),
    One(RawProduct),
}

impl ProductFile {
    pub fn into_products(self) -> Vec<RawProduct> {
        match self {
            ProductFile::Wrapped { products } | ProductFile::Many(products) => products,
            ProductFile::One(p) => vec![p],
        }
    }
}

impl RawProduct {
    /// Normalise into a storable product. A missing id gets a fresh UUID.
    pub fn into_new_product(self) -> Result<NewProduct> {
        let name = non_empty(self.name).context("Product is missing a name")?;
        let id = match self.id {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {
                uuid::Uuid::new_v4().to_string()
            }
            Some(other) => bail!("Unsupported id for product {name}: {other}"),
        };
        let price = self.price.unwrap_or(0.0);
        if price < 0.0 {
            bail!("Product {name} has a negative price: {price}");
        }

        Ok(NewProduct {
            id,
            name,
            code: non_empty(self.code),
            manufacturer: non_empty(self.manufacturer),
            category: non_empty(self.category).unwrap_or_else(|| "uncategorized".to_string()),
            effect: non_empty(self.effect),
            price,
            duration_seconds: self.duration_seconds.filter(|d| *d >= 0.0),
            active: self.active.unwrap_or(true),
            description: self.description.unwrap_or_default().trim().to_string(),
            image_url: non_empty(self.image_url),
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a JSON document into products.
pub fn parse_json(content: &str) -> Result<Vec<NewProduct>> {
    let file: ProductFile =
        serde_json::from_str(content).context("Failed to parse JSON product file")?;
    collect(file)
}

/// Parse a YAML document into products.
pub fn parse_yaml(content: &str) -> Result<Vec<NewProduct>> {
    let file: ProductFile =
        serde_yaml::from_str(content).context("Failed to parse YAML product file")?;
    collect(file)
}

fn collect(file: ProductFile) -> Result<Vec<NewProduct>> {
    file.into_products()
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            p.into_new_product()
                .with_context(|| format!("Invalid product at position {}", i + 1))
        })
        .collect()
}
