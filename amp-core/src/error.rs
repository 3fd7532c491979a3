//! # AMP Error Types
//!
//! Centralized error handling for the dispatch and federation engine.

use thiserror::Error;

/// Result type alias for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Core error types for the platform
#[derive(Error, Debug)]
pub enum PlatformError {
    /// No matching agent, action, stream, container or peer
    #[error("Not found: {0}")]
    NotFound(String),

    /// Deployment request does not fit the configured container backend
    #[error("Config mismatch: {0}")]
    ConfigMismatch(String),

    /// Transport failure talking to a backend, container or peer
    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// A reachable container or platform returned a schema-invalid payload
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials valid, permission missing
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input, e.g. a malformed URL
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// Create a new not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new config mismatch error
    pub fn config_mismatch(msg: impl Into<String>) -> Self {
        Self::ConfigMismatch(msg.into())
    }

    /// Create a new unreachable error
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    /// Create a new malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a new unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a new forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new generic/other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::ConfigMismatch(_) | Self::InvalidInput(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Unreachable(_) | Self::MalformedResponse(_) => 502,
            Self::Configuration(_) | Self::Serialization(_) | Self::Other(_) => 500,
        }
    }

    /// Whether this is a failure of one remote candidate, so the next one may be tried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::MalformedResponse(_) | Self::NotFound(_) | Self::Forbidden(_) | Self::Unauthorized(_)
        )
    }
}
