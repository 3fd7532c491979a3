//! # Authority Trait
//!
//! 权限判定边界。角色体系与存储不在本引擎内。

use std::sync::Arc;

use crate::error::Result;

/// Caller identity as established by the transport layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub username: Option<String>,
    pub admin: bool,
}

impl Actor {
    /// Unauthenticated caller
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            admin: false,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            admin: true,
        }
    }
}

/// Operation being authorized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Deploy a new container
    Deploy,
    /// Remove or replace a container owned by `owner`
    ManageContainer { owner: Option<String> },
}

/// 权限判定与容器令牌签发
pub trait Authority: Send + Sync {
    /// `Ok(())` if allowed, `Unauthorized` or `Forbidden` otherwise
    fn authorize(&self, actor: &Actor, permission: &Permission) -> Result<()>;

    /// Container-scoped token, `None` when auth is disabled
    fn issue_token(&self, subject: &str, owner: Option<&str>) -> Result<Option<String>>;
}

pub type AuthorityRef = Arc<dyn Authority>;
