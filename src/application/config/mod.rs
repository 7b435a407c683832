pub mod database;
pub mod install;

use std::env;

pub use install::{InstallConfig, INSTALL_CONFIG_KEYS};

use crate::error::Result;

/// Log output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// Built once by the binary and handed down explicitly; nothing in the
/// migration core reads the environment on its own.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: database::DatabaseConfig,
    pub install: InstallConfig,

    // Build info
    pub version: String,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let install = match env::var("SCHEMASHIFT_INSTALL_CONFIG") {
            Ok(path) if !path.is_empty() => InstallConfig::from_file(path)?,
            _ => InstallConfig::default(),
        };

        Ok(Self {
            database: database::DatabaseConfig::from_env(),
            install,

            version: env!("CARGO_PKG_VERSION").to_string(),

            log_level: env::var("SCHEMASHIFT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: LogFormat::parse(
                &env::var("SCHEMASHIFT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            ),
        })
    }
}
