use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Filesystem,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Root directory for the filesystem backend, database file for SQLite
    pub path: PathBuf,
    pub database_id: String,
    pub container_id: String,
    pub create_if_missing: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Filesystem,
            path: PathBuf::from("./histvault-data"),
            database_id: "chat".to_string(),
            container_id: "history".to_string(),
            create_if_missing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("HISTVAULT").separator("__"));

        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let defaults = StorageConfig::default();
        let config = builder
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.path", defaults.path.to_string_lossy().to_string())?
            .set_default("storage.database_id", defaults.database_id)?
            .set_default("storage.container_id", defaults.container_id)?
            .set_default("storage.create_if_missing", defaults.create_if_missing)?
            .set_default("logging.level", "info")?
            .build()?;

        config.try_deserialize()
    }
}
