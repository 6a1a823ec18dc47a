//! Runtime configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. optional `brigade.toml` in the working directory
//! 3. environment variables prefixed `BRIGADE_` (a `.env` file is loaded first
//!    when present), e.g. `BRIGADE_BIND_ADDR=127.0.0.1:9000`

use std::path::PathBuf;

use config::{Config as Cfg, ConfigError, Environment, File};
use serde::Deserialize;

use brigade_observability::LogFormat;

use crate::services::DEFAULT_MAX_CONFLICT_RETRIES;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Extra attempts after an optimistic-concurrency conflict.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// JSON catalog seed (stations, products, tables).
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Capacity of the notification broadcast channel feeding `/stream`.
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_CONFLICT_RETRIES
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_notification_buffer() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_conflict_retries: default_max_conflict_retries(),
            log_format: LogFormat::default(),
            log_filter: default_log_filter(),
            catalog_path: None,
            notification_buffer: default_notification_buffer(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_sources(File::with_name("brigade").required(false), Environment::with_prefix("BRIGADE"))
    }

    fn from_sources(file: File<config::FileSourceFile, config::FileFormat>, env: Environment) -> Result<Self, ConfigError> {
        let config = Cfg::builder()
            .add_source(file)
            .add_source(env.prefix_separator("_").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
