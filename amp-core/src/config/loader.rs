//! # Configuration Loader
//!
//! Loads and merges configuration from multiple sources:
//! 1. Default values (lowest priority)
//! 2. Configuration file (middle priority)
//! 3. Environment variables (highest priority)

use std::env;
use std::path::{Path, PathBuf};

use amp_types::ContainerEnvironment;
use serde::Deserialize;

use crate::config::{PlatformConfig, ValidateConfig};
use crate::error::{PlatformError, Result};

/// Configuration loader with support for file and environment variable overrides
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Path to configuration file
    config_path: PathBuf,

    /// Environment variable prefix
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: "AMP".to_string(),
        }
    }
}

impl ConfigLoader {
    /// Create a new config loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config loader with a specific config file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: "AMP".to_string(),
        }
    }

    /// Create a config loader with custom environment prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: prefix.into(),
        }
    }

    /// Replace the environment prefix
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Path the loader reads from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the default configuration file path
    fn default_config_path() -> PathBuf {
        if let Ok(config_path) = env::var("AMP_CONFIG") {
            return PathBuf::from(config_path);
        }

        let possible_paths = [
            PathBuf::from("amp.toml"),
            dirs::config_dir()
                .map(|d| d.join("amp").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("/etc/amp/config.toml")),
        ];

        for path in &possible_paths {
            if path.exists() {
                return path.clone();
            }
        }

        possible_paths[0].clone()
    }

    /// Load configuration with full hierarchy
    pub fn load(&self) -> Result<PlatformConfig> {
        let mut config = PlatformConfig::default();

        if self.config_path.exists() {
            let file_config = self.load_from_file()?;
            config = merge_file_config(config, file_config);
        }

        config = self.merge_env_config(config)?;

        config.validate().map_err(|e| {
            PlatformError::configuration(format!("Configuration validation failed: {}", e))
        })?;

        Ok(config)
    }

    fn load_from_file(&self) -> Result<FileConfig> {
        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            PlatformError::configuration(format!(
                "Failed to read config file '{}': {}",
                self.config_path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            PlatformError::configuration(format!(
                "Failed to parse config file '{}': {}",
                self.config_path.display(),
                e
            ))
        })
    }

    fn merge_env_config(&self, mut config: PlatformConfig) -> Result<PlatformConfig> {
        let prefix = &self.env_prefix;

        if let Ok(url) = env::var(format!("{}_PUBLIC_URL", prefix)) {
            config.public_url = Some(url);
        }
        if let Some(port) = parse_env(&format!("{}_SERVER_PORT", prefix))? {
            config.server_port = port;
        }
        if let Ok(value) = env::var(format!("{}_CONTAINER_ENVIRONMENT", prefix)) {
            config.container_environment = value
                .parse::<ContainerEnvironment>()
                .map_err(PlatformError::configuration)?;
        }
        if let Some(secs) = parse_env(&format!("{}_CONTAINER_TIMEOUT_SECS", prefix))? {
            config.container_timeout_secs = secs;
        }
        if let Some(ms) = parse_env(&format!("{}_POLL_INTERVAL_MS", prefix))? {
            config.poll_interval_ms = ms;
        }
        if let Some(secs) = parse_env(&format!("{}_REQUEST_TIMEOUT_SECS", prefix))? {
            config.request_timeout_secs = secs;
        }
        if let Some(enabled) = parse_env_bool(&format!("{}_ENABLE_AUTH", prefix))? {
            config.enable_auth = enabled;
        }
        if let Ok(secret) = env::var(format!("{}_AUTH_SECRET", prefix)) {
            config.auth_secret = secret;
        }
        if let Some(size) = parse_env(&format!("{}_EVENT_HISTORY_SIZE", prefix))? {
            config.event_history_size = size;
        }
        if let Ok(provides) = env::var(format!("{}_PROVIDES", prefix)) {
            config.provides = provides
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }
}

/// File representation, every key optional
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    public_url: Option<String>,
    server_port: Option<u16>,
    container_environment: Option<ContainerEnvironment>,
    container_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    enable_auth: Option<bool>,
    auth_secret: Option<String>,
    event_history_size: Option<usize>,
    provides: Option<Vec<String>>,
}

fn merge_file_config(mut base: PlatformConfig, file: FileConfig) -> PlatformConfig {
    if let Some(url) = file.public_url {
        base.public_url = Some(url);
    }
    if let Some(port) = file.server_port {
        base.server_port = port;
    }
    if let Some(env) = file.container_environment {
        base.container_environment = env;
    }
    if let Some(secs) = file.container_timeout_secs {
        base.container_timeout_secs = secs;
    }
    if let Some(ms) = file.poll_interval_ms {
        base.poll_interval_ms = ms;
    }
    if let Some(secs) = file.request_timeout_secs {
        base.request_timeout_secs = secs;
    }
    if let Some(enabled) = file.enable_auth {
        base.enable_auth = enabled;
    }
    if let Some(secret) = file.auth_secret {
        base.auth_secret = secret;
    }
    if let Some(size) = file.event_history_size {
        base.event_history_size = size;
    }
    if let Some(provides) = file.provides {
        base.provides = provides;
    }
    base
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PlatformError::configuration(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

fn parse_env_bool(key: &str) -> Result<Option<bool>> {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(PlatformError::configuration(format!(
                "Invalid boolean for {}: {}",
                key, other
            ))),
        },
        Err(_) => Ok(None),
    }
}
