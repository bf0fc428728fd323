use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default)]
    pub replicas: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_on_conflict")]
    pub retry_on_conflict: u32,
    #[serde(default = "default_true")]
    pub refresh_on_write: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_url(),
            name: default_index_name(),
            shards: default_shards(),
            replicas: 0,
            timeout_secs: default_timeout_secs(),
            retry_on_conflict: default_retry_on_conflict(),
            refresh_on_write: true,
        }
    }
}

fn default_backend() -> String {
    "elasticsearch".to_string()
}
fn default_url() -> String {
    "http://127.0.0.1:9200".to_string()
}
fn default_index_name() -> String {
    "inventopedia".to_string()
}
fn default_shards() -> u32 {
    1
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retry_on_conflict() -> u32 {
    3
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_welcome_name")]
    pub welcome_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
            welcome_name: default_welcome_name(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}
fn default_welcome_name() -> String {
    "Nakama".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    10
}
fn default_max_page_size() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Configuration used when no config file exists: a local single-node
    /// Elasticsearch and the built-in defaults for everything else.
    pub fn minimal() -> Self {
        Self {
            index: IndexConfig::default(),
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

/// Like [`load_config`], but a missing file yields [`Config::minimal`].
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    match config.index.backend.as_str() {
        "elasticsearch" | "memory" => {}
        other => anyhow::bail!(
            "Unknown index backend: '{}'. Must be elasticsearch or memory.",
            other
        ),
    }

    if config.index.name.trim().is_empty() {
        anyhow::bail!("index.name must not be empty");
    }
    if config.index.name != config.index.name.to_lowercase() {
        anyhow::bail!("index.name must be lowercase");
    }
    if config.index.shards == 0 {
        anyhow::bail!("index.shards must be >= 1");
    }
    if config.index.backend == "elasticsearch" {
        reqwest::Url::parse(&config.index.url)
            .with_context(|| format!("index.url is not a valid URL: {}", config.index.url))?;
    }

    if config.search.page_size == 0 {
        anyhow::bail!("search.page_size must be >= 1");
    }
    if config.search.page_size > config.search.max_page_size {
        anyhow::bail!("search.page_size must be <= search.max_page_size");
    }

    Ok(())
}
