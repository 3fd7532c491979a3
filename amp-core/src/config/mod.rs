//! # AMP Configuration
//!
//! Platform settings shared by the lifecycle, federation and dispatch layers.
//!
//! ## Configuration Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Environment Variables           │
//! │    AMP_CONTAINER_TIMEOUT_SECS=60        │
//! ├─────────────────────────────────────────┤
//! │         Config File (amp.toml)          │
//! │    container_timeout_secs = 60          │
//! ├─────────────────────────────────────────┤
//! │         Default Values                  │
//! │    impl Default for PlatformConfig      │
//! └─────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::Duration;

use amp_types::ContainerEnvironment;
use serde::{Deserialize, Serialize};

use crate::address;
use crate::error::{PlatformError, Result};

mod loader;

pub use loader::ConfigLoader;

/// Default port of the platform's own API
pub const DEFAULT_SERVER_PORT: u16 = 8000;
/// Default deployment timeout in seconds
pub const DEFAULT_CONTAINER_TIMEOUT_SECS: u64 = 120;
/// Default readiness poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Default outbound request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default event history capacity
pub const DEFAULT_EVENT_HISTORY_SIZE: usize = 50;

/// Runtime platform configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PlatformConfig {
    /// Externally reachable base URL of this platform
    pub public_url: Option<String>,

    /// Port the platform API listens on
    pub server_port: u16,

    /// Container backend this platform deploys to
    pub container_environment: ContainerEnvironment,

    /// Upper bound for a deployment's readiness polling
    pub container_timeout_secs: u64,

    /// Delay between two readiness probes
    pub poll_interval_ms: u64,

    /// Timeout for outbound calls to containers and peers
    pub request_timeout_secs: u64,

    /// Issue container tokens and enforce ownership
    pub enable_auth: bool,

    /// Secret used to sign container tokens
    pub auth_secret: String,

    /// Number of events kept in the history ring buffer
    pub event_history_size: usize,

    /// Extra provisions advertised by this platform
    pub provides: Vec<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            public_url: None,
            server_port: DEFAULT_SERVER_PORT,
            container_environment: ContainerEnvironment::Docker,
            container_timeout_secs: DEFAULT_CONTAINER_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            enable_auth: false,
            auth_secret: String::new(),
            event_history_size: DEFAULT_EVENT_HISTORY_SIZE,
            provides: Vec::new(),
        }
    }
}

/// Trait for validating configuration sections
pub trait ValidateConfig {
    /// Validate the configuration
    fn validate(&self) -> Result<()>;
}

impl ValidateConfig for PlatformConfig {
    fn validate(&self) -> Result<()> {
        if self.container_timeout_secs == 0 {
            return Err(validation_error("container_timeout_secs must be greater than 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(validation_error("poll_interval_ms must be greater than 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(validation_error("request_timeout_secs must be greater than 0"));
        }
        if self.enable_auth && self.auth_secret.is_empty() {
            return Err(validation_error("auth_secret is required when enable_auth is set"));
        }
        if let Some(url) = &self.public_url {
            address::check_url(&address::normalize_url(url))
                .map_err(|e| validation_error(format!("public_url: {}", e)))?;
        }
        Ok(())
    }
}

impl PlatformConfig {
    /// Deployment timeout
    pub fn container_timeout(&self) -> Duration {
        Duration::from_secs(self.container_timeout_secs)
    }

    /// Readiness poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Outbound request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The base URL other platforms and containers use to reach this one.
    ///
    /// Falls back to `http://<outbound-ip>:<server_port>` when no public URL is set.
    pub fn own_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => address::normalize_url(url),
            None => format!("http://{}:{}", outbound_ip(), self.server_port),
        }
    }

    /// Flattened, redacted view of the configuration
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("public_url".to_string(), self.own_base_url());
        map.insert("server_port".to_string(), self.server_port.to_string());
        map.insert(
            "container_environment".to_string(),
            self.container_environment.to_string(),
        );
        map.insert(
            "container_timeout_secs".to_string(),
            self.container_timeout_secs.to_string(),
        );
        map.insert("poll_interval_ms".to_string(), self.poll_interval_ms.to_string());
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert("enable_auth".to_string(), self.enable_auth.to_string());
        map.insert(
            "event_history_size".to_string(),
            self.event_history_size.to_string(),
        );
        map.insert("provides".to_string(), self.provides.join(","));
        map
    }
}

/// Address of the interface used for outbound traffic. No packet is sent.
fn outbound_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Helper for validation errors
pub fn validation_error(msg: impl Into<String>) -> PlatformError {
    PlatformError::configuration(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlatformConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.container_timeout(), Duration::from_secs(120));
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.container_environment, ContainerEnvironment::Docker);
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = PlatformConfig::default();
        config.container_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = PlatformConfig::default();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_auth_requires_secret() {
        let mut config = PlatformConfig::default();
        config.enable_auth = true;
        assert!(matches!(
            config.validate(),
            Err(PlatformError::Configuration(_))
        ));

        config.auth_secret = "s3cret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_public_url() {
        let mut config = PlatformConfig::default();
        config.public_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.public_url = Some(" \"http://amp.example.org:8000/\" ".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.own_base_url(), "http://amp.example.org:8000");
    }

    #[test]
    fn test_own_base_url_fallback_uses_port() {
        let mut config = PlatformConfig::default();
        config.server_port = 8123;
        let url = config.own_base_url();
        assert!(url.starts_with("http://"));
        assert!(url.ends_with(":8123"));
    }

    #[test]
    fn test_to_map_is_redacted() {
        let mut config = PlatformConfig::default();
        config.enable_auth = true;
        config.auth_secret = "s3cret".to_string();
        config.provides = vec!["gpu".to_string(), "llm".to_string()];

        let map = config.to_map();
        assert!(!map.contains_key("auth_secret"));
        assert!(map.values().all(|v| v != "s3cret"));
        assert_eq!(map.get("provides").map(String::as_str), Some("gpu,llm"));
        assert_eq!(map.get("container_environment").map(String::as_str), Some("DOCKER"));
    }
}
