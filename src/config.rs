//! Runtime configuration
//!
//! Read from `DAIRY_*` environment variables, falling back to defaults that
//! keep everything in the working directory.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite database file (`DAIRY_DB_PATH`)
    pub db_path: PathBuf,
    /// Directory for exported reports (`DAIRY_EXPORT_DIR`)
    pub export_dir: PathBuf,
    /// API server bind address (`DAIRY_SERVER_ADDR`)
    pub server_addr: String,
    /// Default log filter when `RUST_LOG` is unset (`DAIRY_LOG_LEVEL`)
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("dairy_management.db"),
            export_dir: PathBuf::from("."),
            server_addr: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = AppConfig::default();

        config::Config::builder()
            .set_default("db_path", defaults.db_path.to_string_lossy().to_string())?
            .set_default("export_dir", defaults.export_dir.to_string_lossy().to_string())?
            .set_default("server_addr", defaults.server_addr)?
            .set_default("log_level", defaults.log_level)?
            .add_source(config::Environment::with_prefix("DAIRY"))
            .build()?
            .try_deserialize()
    }
}
