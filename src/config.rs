use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::extend::{ExtensionBound, ExtensionOptions};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub weaviate: WeaviateConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeaviateConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u64,
    #[serde(default)]
    pub default_ext_k: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_ext_k: 0,
        }
    }
}

fn default_top_k() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExtensionConfig {
    #[serde(default)]
    pub bound: ExtensionBound,
    /// `0` leaves fan-out unbounded.
    #[serde(default)]
    pub max_concurrent_fetches: usize,
    #[serde(default)]
    pub verify_page: bool,
}

impl ExtensionConfig {
    pub fn options(&self) -> ExtensionOptions {
        ExtensionOptions {
            bound: self.bound,
            max_concurrent_fetches: match self.max_concurrent_fetches {
                0 => None,
                n => Some(n),
            },
            verify_page: self.verify_page,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

impl Config {
    /// All defaults; used when no config file is present.
    pub fn minimal() -> Self {
        Self {
            weaviate: WeaviateConfig::default(),
            search: SearchConfig::default(),
            extension: ExtensionConfig::default(),
            server: ServerConfig::default(),
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

/// Like [`load_config`], but falls back to [`Config::minimal`] when the file
/// does not exist. Parse and validation errors still fail.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    let url = config.weaviate.url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("weaviate.url must start with http:// or https://, got '{}'", url);
    }

    if config.weaviate.timeout_secs == 0 {
        anyhow::bail!("weaviate.timeout_secs must be > 0");
    }

    Ok(())
}
