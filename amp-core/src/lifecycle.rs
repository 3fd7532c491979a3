//! # Lifecycle Manager
//!
//! Container deployment state machine:
//!
//! ```text
//! REQUESTED -> BACKEND_STARTING -> POLLING_READY -> REGISTERED
//!                                               \-> ROLLED_BACK
//! ```
//!
//! A container is registered only after it answered its own info probe.
//! Connectivity always comes from the backend, never from the container.

use std::sync::Arc;
use std::time::Duration;

use amp_types::{AgentContainer, PostAgentContainer};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PlatformConfig;
use crate::directory::Directory;
use crate::error::{PlatformError, Result};
use crate::federation::FederationManager;
use crate::requirements;
use crate::traits::{Actor, AuthorityRef, ContainerBackendRef, EndpointFactoryRef, Permission};

/// Deployment phase, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    Requested,
    BackendStarting,
    PollingReady,
    Registered,
    RolledBack,
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeploymentState::Requested => "REQUESTED",
            DeploymentState::BackendStarting => "BACKEND_STARTING",
            DeploymentState::PollingReady => "POLLING_READY",
            DeploymentState::Registered => "REGISTERED",
            DeploymentState::RolledBack => "ROLLED_BACK",
        };
        f.write_str(name)
    }
}

/// 容器生命周期管理器
pub struct LifecycleManager {
    config: Arc<PlatformConfig>,
    directory: Arc<Directory>,
    backend: ContainerBackendRef,
    endpoints: EndpointFactoryRef,
    authority: AuthorityRef,
    federation: Arc<FederationManager>,
}

impl LifecycleManager {
    pub fn new(
        config: Arc<PlatformConfig>,
        directory: Arc<Directory>,
        backend: ContainerBackendRef,
        endpoints: EndpointFactoryRef,
        authority: AuthorityRef,
        federation: Arc<FederationManager>,
    ) -> Self {
        Self {
            config,
            directory,
            backend,
            endpoints,
            authority,
            federation,
        }
    }

    fn transition(container_id: &str, state: DeploymentState) {
        debug!("Container {} -> {}", container_id, state);
    }

    /// Deploy a container and wait until it answers, up to `timeout`
    /// (the configured container timeout if `None` or zero). Returns the new id.
    pub async fn add_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.authority.authorize(actor, &Permission::Deploy)?;

        if let Some(client_config) = &request.client_config {
            let requested = client_config.environment();
            if requested != self.config.container_environment {
                return Err(PlatformError::config_mismatch(format!(
                    "Client config {} does not match platform environment {}",
                    requested, self.config.container_environment
                )));
            }
        }

        let provided = requirements::provisions(&self.config, &self.directory.list_containers());
        requirements::check_requirements(&request.image, &provided)?;

        let container_id = uuid::Uuid::new_v4().to_string();
        let owner = actor.username.clone();
        let token = self.authority.issue_token(&container_id, owner.as_deref())?;
        Self::transition(&container_id, DeploymentState::Requested);

        Self::transition(&container_id, DeploymentState::BackendStarting);
        info!("Starting container {} from image {}", container_id, request.image.image_name);
        let connectivity = self
            .backend
            .start_container(&container_id, token.as_deref(), owner.as_deref(), request)
            .await?;

        Self::transition(&container_id, DeploymentState::PollingReady);
        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or_else(|| self.config.container_timeout());
        let reported = match self.await_ready(&container_id, token.as_deref(), timeout).await {
            Ok(reported) => reported,
            Err(e) => {
                self.roll_back(&container_id).await;
                return Err(e);
            }
        };

        if !reported.container_id.is_empty() && reported.container_id != container_id {
            warn!(
                "Container {} reports id {}; using platform id",
                container_id, reported.container_id
            );
        }

        let container = AgentContainer {
            container_id: container_id.clone(),
            image: request.image.clone(),
            arguments: request.arguments.clone(),
            agents: reported.agents,
            owner,
            running_since: reported.running_since,
            connectivity: Some(connectivity),
        };
        if let Some(token) = token {
            self.directory.put_token(&container_id, token);
        }
        self.directory.put_container(container);
        Self::transition(&container_id, DeploymentState::Registered);
        info!("Container {} is ready", container_id);

        self.federation.spawn_notify();
        Ok(container_id)
    }

    /// Probe the container's info route until it answers.
    ///
    /// Transport failures keep polling; a malformed answer or a dead
    /// container ends the loop at once.
    async fn await_ready(
        &self,
        container_id: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<AgentContainer> {
        let deadline = Instant::now() + timeout;
        let interval = self.config.poll_interval();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.backend.is_container_alive(container_id).await {
                Ok(false) => {
                    return Err(PlatformError::unreachable(format!(
                        "Container {} stopped during startup",
                        container_id
                    )))
                }
                Ok(true) => {}
                Err(e) => debug!("Liveness check for {} failed: {}", container_id, e),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let endpoint = self.endpoints.endpoint(&self.backend.url(container_id)?, token);
            match tokio::time::timeout(remaining, endpoint.container_info()).await {
                Ok(Ok(info)) => return Ok(info),
                Ok(Err(PlatformError::MalformedResponse(msg))) => {
                    return Err(PlatformError::malformed(format!(
                        "Container {} is not an agent container: {}",
                        container_id, msg
                    )))
                }
                Ok(Err(e)) => debug!("Container {} not ready (attempt {}): {}", container_id, attempts, e),
                Err(_) => debug!("Container {} info probe timed out", container_id),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PlatformError::unreachable(format!(
                    "Container {} did not respond within {:?}",
                    container_id, timeout
                )));
            }
            tokio::time::sleep(interval.min(remaining)).await;
        }
    }

    async fn roll_back(&self, container_id: &str) {
        warn!("Rolling back container {}", container_id);
        if let Err(e) = self.backend.stop_container(container_id).await {
            warn!("Failed to stop container {} during rollback: {}", container_id, e);
        }
        Self::transition(container_id, DeploymentState::RolledBack);
    }

    /// Remove a container. Unknown ids yield `false`.
    pub async fn remove_container(&self, actor: &Actor, container_id: &str) -> Result<bool> {
        let Some(container) = self.directory.get_container(container_id) else {
            debug!("Container {} not registered", container_id);
            return Ok(false);
        };
        self.authority.authorize(
            actor,
            &Permission::ManageContainer {
                owner: container.owner.clone(),
            },
        )?;

        if self.directory.remove_container(container_id).is_none() {
            return Ok(false);
        }
        self.directory.remove_token(container_id);
        info!("Removed container {}", container_id);

        let stopped = self.backend.stop_container(container_id).await;
        self.federation.spawn_notify();
        match stopped {
            Ok(()) => Ok(true),
            Err(PlatformError::NotFound(msg)) => {
                warn!("Container {} was already stopped: {}", container_id, msg);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-probe a container. Its agents are refreshed, its connectivity kept.
    /// A container that does not answer is removed and `false` returned.
    pub async fn notify_update_container(&self, container_id: &str) -> Result<bool> {
        if !self.directory.contains_container(container_id) {
            return Err(PlatformError::not_found(format!(
                "Container did not exist: {}",
                container_id
            )));
        }

        let token = self.directory.get_token(container_id);
        let probe = match self.backend.url(container_id) {
            Ok(url) => {
                self.endpoints
                    .endpoint(&url, token.as_deref())
                    .container_info()
                    .await
            }
            Err(e) => Err(e),
        };

        match probe {
            Ok(info) => {
                if !info.container_id.is_empty() && info.container_id != container_id {
                    warn!("Container {} reports id {}", container_id, info.container_id);
                }
                let updated = self
                    .directory
                    .update_container(container_id, |c| c.agents = info.agents);
                if updated {
                    self.federation.spawn_notify();
                }
                Ok(updated)
            }
            Err(e) => {
                warn!("Container {} did not respond: {}; removing", container_id, e);
                self.directory.remove_container(container_id);
                self.directory.remove_token(container_id);
                self.federation.spawn_notify();
                Ok(false)
            }
        }
    }

    /// Replace the single running container with the same image name.
    pub async fn update_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let matching: Vec<AgentContainer> = self
            .directory
            .list_containers()
            .into_iter()
            .filter(|c| c.image.image_name == request.image.image_name)
            .collect();

        let existing = match matching.as_slice() {
            [single] => single,
            [] => {
                return Err(PlatformError::invalid_input(format!(
                    "No running container with image {}",
                    request.image.image_name
                )))
            }
            _ => {
                return Err(PlatformError::invalid_input(format!(
                    "Several running containers with image {}",
                    request.image.image_name
                )))
            }
        };

        self.authority.authorize(
            actor,
            &Permission::ManageContainer {
                owner: existing.owner.clone(),
            },
        )?;
        info!("Replacing container {} with image {}", existing.container_id, request.image.image_name);
        self.remove_container(actor, &existing.container_id).await?;
        self.add_container(actor, request, timeout).await
    }

    /// Running containers in registration order
    pub fn containers(&self) -> Vec<AgentContainer> {
        self.directory.list_containers()
    }

    pub fn container(&self, container_id: &str) -> Option<AgentContainer> {
        self.directory.get_container(container_id)
    }
}
