//! Configuration types and loading
//!
//! Precedence: CLI `--config` > `CONFIG_PATH` > `laundry-api.toml` for the
//! file, then `API_BASE_URL` overrides `api.base_url`.

use api_client::ClientConfig;
use laundry_auth::{DEFAULT_REFRESH_TTL_DAYS, DEFAULT_TOKEN_TTL_DAYS, TokenTtl};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ClientConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where and for how long credentials are kept
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_days: u32,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            token_ttl_days: default_token_ttl(),
            refresh_ttl_days: default_refresh_ttl(),
        }
    }
}

impl StorageConfig {
    pub fn ttl(&self) -> TokenTtl {
        TokenTtl {
            access_days: self.token_ttl_days,
            refresh_days: self.refresh_ttl_days,
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("laundry-credentials.json")
}

fn default_token_ttl() -> u32 {
    DEFAULT_TOKEN_TTL_DAYS
}

fn default_refresh_ttl() -> u32 {
    DEFAULT_REFRESH_TTL_DAYS
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(base_url) = std::env::var("API_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.api.base_url = base_url.trim().to_owned();
        }

        config.api.validate()?;

        if config.storage.token_ttl_days == 0 || config.storage.refresh_ttl_days == 0 {
            return Err(common::Error::Config(
                "storage ttl days must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("laundry-api.toml")
    }
}
