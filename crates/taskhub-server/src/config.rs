//! Server configuration, read from the TOML file named by `TASKHUB_CONFIG`.

use std::path::Path;

use serde::Deserialize;
use taskhub_access::config::PolicyConfig;
use taskhub_db::DbConfig;

use crate::error::ServerError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TASKHUB_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub policy: PolicyConfig,
    /// Seed demo users, groups and tasks into an empty store.
    pub seed_demo_data: bool,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            policy: PolicyConfig::default(),
            seed_demo_data: true,
            log_filter: "taskhub=info".into(),
        }
    }
}

impl ServerConfig {
    /// Load from the file named by [`CONFIG_ENV`], or the defaults when
    /// the variable is unset.
    pub fn load() -> Result<Self, ServerError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(raw)?)
    }
}
