use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_asn_year")]
    pub asn_year: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
}

fn default_delay_ms() -> u64 {
    500
}
fn default_timeout_seconds() -> u64 {
    30
}
fn default_retry_count() -> u32 {
    3
}
fn default_page_size() -> u32 {
    100
}
fn default_asn_year() -> u16 {
    2023
}
fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            timeout_seconds: default_timeout_seconds(),
            retry_count: default_retry_count(),
            page_size: default_page_size(),
            asn_year: default_asn_year(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
        }
    }
}

impl Config {
    /// Load config.toml from the working directory, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = match fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No {} found, using default configuration", config_path);
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ScraperError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path, e
                )))
            }
        };

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Database URL from the environment; None means no durable store is
    /// configured and the in-memory storage should be used.
    pub fn database_url() -> Option<String> {
        env::var("LIBSQL_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn database_auth_token() -> String {
        env::var("LIBSQL_AUTH_TOKEN").unwrap_or_default()
    }
}
