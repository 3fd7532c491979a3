use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::container::AgentContainer;

/// Snapshot of a runtime platform as returned by its `info` route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimePlatform {
    pub platform_id: String,
    pub base_url: String,
    #[serde(default)]
    pub containers: Vec<AgentContainer>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default = "Utc::now")]
    pub running_since: DateTime<Utc>,
}

impl RuntimePlatform {
    pub fn new(platform_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
            base_url: base_url.into(),
            containers: Vec::new(),
            provides: Vec::new(),
            connections: Vec::new(),
            running_since: Utc::now(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Request to connect to another platform, optionally with credentials
/// for that platform.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginConnection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub url: String,
}

impl LoginConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            username: None,
            password: None,
            url: url.into(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Credentials to log in at the target, if a username was given.
    pub fn login(&self) -> Option<Login> {
        self.username.as_ref().map(|username| Login {
            username: username.clone(),
            password: self.password.clone().unwrap_or_default(),
        })
    }
}

impl fmt::Debug for LoginConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConnection")
            .field("username", &self.username)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
