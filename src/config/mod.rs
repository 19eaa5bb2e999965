use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::debounce::DEFAULT_DEBOUNCE;

pub const API_KEY_ENV: &str = "FIRESHOW_API_KEY";
pub const DEFAULT_PRODUCTS_TABLE: &str = "products";

/// Hosted backend connection block from config.toml.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub products_table: Option<String>,
}

impl BackendConfig {
    pub fn products_table(&self) -> &str {
        self.products_table
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_PRODUCTS_TABLE)
    }
}

/// Catalog search tuning.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct SearchConfig {
    pub debounce_ms: Option<u64>,
}

/// Top-level fireshow config file structure.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct FireshowConfig {
    pub backend: Option<BackendConfig>,
    pub search: Option<SearchConfig>,
}

impl FireshowConfig {
    /// Load config from ~/.fireshow/config.toml. Returns default if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(FireshowConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: FireshowConfig =
            toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
        Ok(config)
    }

    /// Debounce delay for interactive search.
    pub fn debounce(&self) -> Duration {
        self.search
            .as_ref()
            .and_then(|s| s.debounce_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE)
    }

    /// Display config with secrets redacted.
    pub fn display_redacted(&self) -> String {
        let mut lines = Vec::new();
        if let Some(ref b) = self.backend {
            lines.push("[backend]".to_string());
            if let Some(ref url) = b.url {
                lines.push(format!("  url = \"{}\"", url));
            }
            if let Some(ref key) = b.api_key {
                lines.push(format!("  api_key = \"{}\"", redact(key)));
            }
            if let Some(ref cmd) = b.api_key_command {
                lines.push(format!("  api_key_command = \"{}\"", cmd));
            }
            lines.push(format!("  products_table = \"{}\"", b.products_table()));
        }
        if let Some(ref s) = self.search {
            lines.push("[search]".to_string());
            if let Some(ms) = s.debounce_ms {
                lines.push(format!("  debounce_ms = {ms}"));
            }
        }
        if lines.is_empty() {
            lines.push("(no settings; defaults in use)".to_string());
        }
        lines.join("\n")
    }
}

fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

/// Resolve a credential through the chain: CLI flag > env var > config key > config command.
pub fn resolve_credential(
    cli_flag: Option<&str>,
    env_var_name: &str,
    config: Option<&BackendConfig>,
) -> Result<String> {
    // 1. CLI flag
    if let Some(key) = cli_flag {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    // 2. Environment variable
    if let Ok(val) = std::env::var(env_var_name) {
        if !val.is_empty() {
            return Ok(val);
        }
    }

    if let Some(bc) = config {
        // 3. Config file api_key
        if let Some(ref key) = bc.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }

        // 4. External command
        if let Some(ref cmd) = bc.api_key_command {
            if !cmd.is_empty() {
                let output = std::process::Command::new("sh")
                    .arg("-c")
                    .arg(cmd)
                    .output()
                    .with_context(|| format!("Failed to run api_key_command: {cmd}"))?;

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    bail!(
                        "api_key_command failed (exit {}): {}",
                        output.status.code().unwrap_or(-1),
                        stderr.trim()
                    );
                }

                let secret = String::from_utf8(output.stdout)
                    .context("api_key_command output is not valid UTF-8")?
                    .trim()
                    .to_string();

                if !secret.is_empty() {
                    return Ok(secret);
                }
            }
        }
    }

    bail!(
        "No API key found. Provide via --api-key, {} env var, or ~/.fireshow/config.toml",
        env_var_name
    );
}

/// Path to the config file: ~/.fireshow/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".fireshow").join("config.toml"))
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.fireshow/config.toml
# Credential resolution order: CLI flag > FIRESHOW_API_KEY > api_key > api_key_command

[backend]
# url = "https://your-project.example.co"
# api_key = "your-anon-or-service-key"
# api_key_command = "your-secrets-manager-command-here"
# products_table = "products"

[search]
# debounce_ms = 300
"#
}

/// Create the default config file if it doesn't already exist.
pub fn init_config() -> Result<bool> {
    let path = config_path()?;
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, default_config_template())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let config = FireshowConfig::parse(default_config_template()).unwrap();
        assert_eq!(config.debounce(), DEFAULT_DEBOUNCE);
        assert_eq!(
            config.backend.as_ref().map(|b| b.products_table()),
            Some(DEFAULT_PRODUCTS_TABLE)
        );
    }

    #[test]
    fn debounce_and_table_overrides() {
        let config = FireshowConfig::parse(
            "[backend]\nurl = \"https://x.example.co\"\nproducts_table = \"catalog\"\n[search]\ndebounce_ms = 150\n",
        )
        .unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(150));
        assert_eq!(config.backend.unwrap().products_table(), "catalog");
    }

    #[test]
    fn redacted_display_hides_key() {
        let config = FireshowConfig {
            backend: Some(BackendConfig {
                api_key: Some("sk_live_1234567890".into()),
                ..BackendConfig::default()
            }),
            search: None,
        };
        let shown = config.display_redacted();
        assert!(shown.contains("sk_l...7890"));
        assert!(!shown.contains("1234567890\""));
    }

    #[test]
    fn redact_counts_characters_not_bytes() {
        assert_eq!(redact("clé-ñandú-señal-ü"), "clé-...al-ü");
        assert_eq!(redact("ñññññ"), "****");
    }

    #[test]
    fn cli_flag_wins_credential_chain() {
        let bc = BackendConfig {
            api_key: Some("from-config".into()),
            ..BackendConfig::default()
        };
        let key = resolve_credential(Some("from-flag"), "FIRESHOW_TEST_UNSET_VAR", Some(&bc)).unwrap();
        assert_eq!(key, "from-flag");
        let key = resolve_credential(None, "FIRESHOW_TEST_UNSET_VAR", Some(&bc)).unwrap();
        assert_eq!(key, "from-config");
        assert!(resolve_credential(None, "FIRESHOW_TEST_UNSET_VAR", None).is_err());
    }
}
