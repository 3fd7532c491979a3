//! # Platform
//!
//! Facade over Directory, Dispatcher, Lifecycle Manager and Federation
//! Manager. [`PlatformApi`] is the surface a transport layer binds to.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use amp_types::{
    AgentContainer, AgentDescription, LoginConnection, Message, PostAgentContainer, RuntimePlatform,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

use crate::auth::{OwnerPolicy, Unrestricted};
use crate::config::{PlatformConfig, ValidateConfig};
use crate::directory::Directory;
use crate::dispatcher::Dispatcher;
use crate::error::{PlatformError, Result};
use crate::federation::FederationManager;
use crate::history::EventHistory;
use crate::lifecycle::LifecycleManager;
use crate::recorded::Recorded;
use crate::requirements;
use crate::traits::{Actor, AuthorityRef, ByteStream, ContainerBackendRef, EndpointFactoryRef};

/// 平台对外接口
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Snapshot of this platform, confidential arguments redacted
    async fn info(&self) -> Result<RuntimePlatform>;

    /// Redacted configuration
    async fn config(&self) -> Result<BTreeMap<String, String>>;

    async fn agents(&self, include_connected: bool) -> Result<Vec<AgentDescription>>;

    async fn agent(&self, agent_id: &str) -> Result<AgentDescription>;

    async fn send(
        &self,
        agent_id: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()>;

    async fn broadcast(
        &self,
        channel: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()>;

    async fn invoke(
        &self,
        action: &str,
        params: &Map<String, Value>,
        agent_id: Option<&str>,
        timeout: Option<Duration>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<Value>;

    async fn get_stream(
        &self,
        stream: &str,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<ByteStream>;

    async fn post_stream(
        &self,
        stream: &str,
        data: Bytes,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()>;

    async fn containers(&self) -> Result<Vec<AgentContainer>>;

    async fn container(&self, container_id: &str) -> Result<AgentContainer>;

    async fn add_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String>;

    async fn update_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String>;

    async fn remove_container(&self, actor: &Actor, container_id: &str) -> Result<bool>;

    async fn connections(&self) -> Result<Vec<String>>;

    async fn connect(&self, connection: &LoginConnection) -> Result<bool>;

    async fn disconnect(&self, url: &str) -> Result<bool>;

    async fn notify_update_container(&self, container_id: &str) -> Result<bool>;

    async fn notify_update_platform(&self, url: &str) -> Result<bool>;
}

/// Authority matching the configuration
pub fn authority_for(config: &PlatformConfig) -> Result<AuthorityRef> {
    if config.enable_auth {
        Ok(Arc::new(OwnerPolicy::new(&config.auth_secret)?))
    } else {
        Ok(Arc::new(Unrestricted))
    }
}

/// 运行时平台
pub struct Platform {
    platform_id: String,
    started_at: DateTime<Utc>,
    config: Arc<PlatformConfig>,
    directory: Arc<Directory>,
    dispatcher: Dispatcher,
    lifecycle: LifecycleManager,
    federation: Arc<FederationManager>,
}

impl Platform {
    /// Assemble a platform without touching the backend
    pub fn new(
        config: PlatformConfig,
        backend: ContainerBackendRef,
        endpoints: EndpointFactoryRef,
        authority: AuthorityRef,
    ) -> Self {
        let config = Arc::new(config);
        let directory = Arc::new(Directory::new());
        let federation = Arc::new(FederationManager::new(
            config.own_base_url(),
            directory.clone(),
            endpoints.clone(),
        ));
        let dispatcher = Dispatcher::new(directory.clone(), backend.clone(), endpoints.clone());
        let lifecycle = LifecycleManager::new(
            config.clone(),
            directory.clone(),
            backend,
            endpoints,
            authority,
            federation.clone(),
        );

        Self {
            platform_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            config,
            directory,
            dispatcher,
            lifecycle,
            federation,
        }
    }

    /// Validate the configuration, check the backend once and assemble the platform.
    pub async fn start(
        config: PlatformConfig,
        backend: ContainerBackendRef,
        endpoints: EndpointFactoryRef,
    ) -> Result<Self> {
        config.validate()?;
        backend.test_connectivity().await.map_err(|e| {
            PlatformError::configuration(format!("Container backend is not available: {}", e))
        })?;
        let authority = authority_for(&config)?;
        let platform = Self::new(config, backend, endpoints, authority);
        info!(
            "Platform {} started at {} ({})",
            platform.platform_id,
            platform.own_url(),
            platform.config.container_environment
        );
        Ok(platform)
    }

    /// [`Platform::start`] wrapped in a [`Recorded`] decorator whose history
    /// holds at most `event_history_size` events.
    pub async fn start_recorded(
        config: PlatformConfig,
        backend: ContainerBackendRef,
        endpoints: EndpointFactoryRef,
    ) -> Result<Recorded<Self>> {
        let history = Arc::new(EventHistory::new(config.event_history_size));
        let platform = Self::start(config, backend, endpoints).await?;
        Ok(Recorded::new(platform, history))
    }

    pub fn platform_id(&self) -> &str {
        &self.platform_id
    }

    pub fn own_url(&self) -> &str {
        self.federation.own_url()
    }

    pub fn settings(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn federation(&self) -> &Arc<FederationManager> {
        &self.federation
    }
}

#[async_trait]
impl PlatformApi for Platform {
    async fn info(&self) -> Result<RuntimePlatform> {
        let containers = self.directory.list_containers();
        Ok(RuntimePlatform {
            platform_id: self.platform_id.clone(),
            base_url: self.own_url().to_string(),
            provides: requirements::provisions(&self.config, &containers)
                .into_iter()
                .collect(),
            containers: containers.iter().map(AgentContainer::redacted).collect(),
            connections: self.directory.peer_urls(),
            running_since: self.started_at,
        })
    }

    async fn config(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.config.to_map())
    }

    async fn agents(&self, include_connected: bool) -> Result<Vec<AgentDescription>> {
        Ok(self.dispatcher.agents(include_connected))
    }

    async fn agent(&self, agent_id: &str) -> Result<AgentDescription> {
        self.dispatcher
            .agent(agent_id)
            .ok_or_else(|| PlatformError::not_found(format!("Unknown agent: {}", agent_id)))
    }

    async fn send(
        &self,
        agent_id: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        self.dispatcher.send(agent_id, message, container_id, forward).await
    }

    async fn broadcast(
        &self,
        channel: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        self.dispatcher
            .broadcast(channel, message, container_id, forward)
            .await
    }

    async fn invoke(
        &self,
        action: &str,
        params: &Map<String, Value>,
        agent_id: Option<&str>,
        timeout: Option<Duration>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<Value> {
        self.dispatcher
            .invoke(action, params, agent_id, timeout, container_id, forward)
            .await
    }

    async fn get_stream(
        &self,
        stream: &str,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<ByteStream> {
        self.dispatcher
            .get_stream(stream, agent_id, container_id, forward)
            .await
    }

    async fn post_stream(
        &self,
        stream: &str,
        data: Bytes,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        self.dispatcher
            .post_stream(stream, data, agent_id, container_id, forward)
            .await
    }

    async fn containers(&self) -> Result<Vec<AgentContainer>> {
        Ok(self
            .lifecycle
            .containers()
            .iter()
            .map(AgentContainer::redacted)
            .collect())
    }

    async fn container(&self, container_id: &str) -> Result<AgentContainer> {
        self.lifecycle
            .container(container_id)
            .map(|c| c.redacted())
            .ok_or_else(|| PlatformError::not_found(format!("Unknown container: {}", container_id)))
    }

    async fn add_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.lifecycle.add_container(actor, request, timeout).await
    }

    async fn update_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.lifecycle.update_container(actor, request, timeout).await
    }

    async fn remove_container(&self, actor: &Actor, container_id: &str) -> Result<bool> {
        self.lifecycle.remove_container(actor, container_id).await
    }

    async fn connections(&self) -> Result<Vec<String>> {
        Ok(self.federation.connections())
    }

    async fn connect(&self, connection: &LoginConnection) -> Result<bool> {
        self.federation.connect(connection).await
    }

    async fn disconnect(&self, url: &str) -> Result<bool> {
        self.federation.disconnect(url).await
    }

    async fn notify_update_container(&self, container_id: &str) -> Result<bool> {
        self.lifecycle.notify_update_container(container_id).await
    }

    async fn notify_update_platform(&self, url: &str) -> Result<bool> {
        self.federation.notify_update_platform(url).await
    }
}
