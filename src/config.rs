//! TOML configuration.
//!
//! ```toml
//! [store]
//! url = "http://localhost:8984/rest/"
//! user = "admin"
//! password = "admin"
//! database = "yams-data"
//!
//! [crawler]
//! batch_size = 100
//!
//! [query]
//! on_duplicate = "skip"
//! ```
//!
//! `[crawler]` and `[query]` may be omitted. The store password can be
//! overridden with the `YAMS_STORE_PASSWORD` environment variable.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use yams_core::{DuplicatePolicy, DEFAULT_DATABASE};

pub const PASSWORD_ENV: &str = "YAMS_STORE_PASSWORD";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub url: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub recursive_queries: bool,
}

fn default_user() -> String {
    "admin".to_string()
}
fn default_password() -> String {
    "admin".to_string()
}
fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default = "default_true")]
    pub audit: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            filter: None,
            audit: true,
        }
    }
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_max_field_values")]
    pub max_field_values: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_on_duplicate")]
    pub on_duplicate: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_field_values: default_max_field_values(),
            page_size: default_page_size(),
            on_duplicate: default_on_duplicate(),
        }
    }
}

fn default_max_field_values() -> usize {
    50
}
fn default_page_size() -> usize {
    30
}
fn default_on_duplicate() -> String {
    "skip".to_string()
}

impl QueryConfig {
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        match self.on_duplicate.as_str() {
            "fail" => DuplicatePolicy::Fail,
            _ => DuplicatePolicy::Skip,
        }
    }
}

impl Config {
    /// Defaults for a local store, used when no config file is present.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                url: "http://localhost:8984/rest/".to_string(),
                user: default_user(),
                password: default_password(),
                database: default_database(),
                timeout_secs: default_timeout_secs(),
                recursive_queries: true,
            },
            crawler: CrawlerConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        config.store.password = password;
    }

    // Validate store
    if config.store.url.trim().is_empty() {
        anyhow::bail!("store.url must not be empty");
    }
    if !config.store.url.ends_with('/') {
        config.store.url.push('/');
    }
    if config.store.database.trim().is_empty() {
        anyhow::bail!("store.database must not be empty");
    }
    if config.store.timeout_secs == 0 {
        anyhow::bail!("store.timeout_secs must be > 0");
    }

    // Validate crawler and query
    if config.crawler.batch_size == 0 {
        anyhow::bail!("crawler.batch_size must be >= 1");
    }
    if config.query.max_field_values == 0 {
        anyhow::bail!("query.max_field_values must be >= 1");
    }
    if config.query.page_size == 0 {
        anyhow::bail!("query.page_size must be >= 1");
    }

    match config.query.on_duplicate.as_str() {
        "skip" | "fail" => {}
        other => anyhow::bail!(
            "Unknown query.on_duplicate policy: '{}'. Must be skip or fail.",
            other
        ),
    }

    Ok(config)
}
