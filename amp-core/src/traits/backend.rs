//! # ContainerBackend Trait
//!
//! Docker / Kubernetes 等容器后端的抽象。

use std::sync::Arc;

use amp_types::{Connectivity, PostAgentContainer};
use async_trait::async_trait;

use crate::error::Result;

/// 容器后端
///
/// Mapped ports in a returned [`Connectivity`] stay reserved until
/// `stop_container` has succeeded for that container.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Called once at platform startup, failure is fatal
    async fn test_connectivity(&self) -> Result<()>;

    /// Start a container.
    ///
    /// # Returns
    /// * `Err(PlatformError::NotFound(_))` - image missing
    /// * `Err(PlatformError::Unreachable(_))` - backend unreachable or misconfigured
    async fn start_container(
        &self,
        container_id: &str,
        token: Option<&str>,
        owner: Option<&str>,
        request: &PostAgentContainer,
    ) -> Result<Connectivity>;

    /// Stop a container, `NotFound` if it is already gone
    async fn stop_container(&self, container_id: &str) -> Result<()>;

    async fn is_container_alive(&self, container_id: &str) -> Result<bool>;

    /// URL under which the platform reaches the container's API
    fn url(&self, container_id: &str) -> Result<String>;
}

pub type ContainerBackendRef = Arc<dyn ContainerBackend>;
