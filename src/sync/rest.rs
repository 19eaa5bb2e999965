use anyhow::{bail, Context, Result};

use crate::db::models::NewProduct;
use crate::ingest::product::RawProduct;
use crate::sync::ProductSource;

const PAGE_SIZE: usize = 500;

/// Products table exposed through the hosted backend's REST gateway.
pub struct RestProductSource {
    api_key: String,
    base_url: String,
    table: String,
    client: reqwest::blocking::Client,
}

impl RestProductSource {
    pub fn new(api_key: String, base_url: &str, table: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("Backend url must start with http:// or https://: {base_url}");
        }
        Ok(Self {
            api_key,
            base_url,
            table: table.to_string(),
            client: reqwest::blocking::Client::new(),
        })
    }

    fn page_url(&self, offset: usize) -> String {
        format!(
            "{}/rest/v1/{}?select=*&order=created_at.desc&limit={}&offset={}",
            self.base_url, self.table, PAGE_SIZE, offset
        )
    }

    fn get_page(&self, offset: usize) -> Result<Vec<RawProduct>> {
        let url = self.page_url(offset);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send()
            .with_context(|| format!("Failed to GET {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            bail!("Backend returned {} for {}: {}", status, self.table, text);
        }

        resp.json().context("Failed to parse backend product rows")
    }
}

impl ProductSource for RestProductSource {
    fn name(&self) -> &str {
        "backend"
    }

    fn fetch_snapshot(&self) -> Result<Vec<NewProduct>> {
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let rows = self.get_page(offset)?;
            let n = rows.len();
            for (i, row) in rows.into_iter().enumerate() {
                let product = row
                    .into_new_product()
                    .with_context(|| format!("Invalid backend row {}", offset + i + 1))?;
                all.push(product);
            }
            if n < PAGE_SIZE {
                break;
            }
            offset += n;
        }
        Ok(all)
    }
}
