//! # Dispatcher
//!
//! Routes send / broadcast / invoke / stream requests to local containers and,
//! when forwarding, to connected peers.
//!
//! Unicast operations try candidates in registration order, locals first,
//! and stop at the first success. Every forwarded call carries
//! `forward = false`, so a request travels at most one hop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use amp_types::{AgentContainer, AgentDescription, Message};
use bytes::Bytes;
use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::directory::Directory;
use crate::error::{PlatformError, Result};
use crate::traits::{ByteStream, ContainerBackendRef, EndpointFactoryRef, RemoteEndpointRef};

/// Capability a candidate agent must offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<'a> {
    Action(&'a str),
    Stream(&'a str),
}

/// Matching predicate shared by all dispatch operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selector<'a> {
    pub container_id: Option<&'a str>,
    pub agent_id: Option<&'a str>,
    pub capability: Option<Capability<'a>>,
}

impl<'a> Selector<'a> {
    pub fn new(
        container_id: Option<&'a str>,
        agent_id: Option<&'a str>,
        capability: Option<Capability<'a>>,
    ) -> Self {
        Self {
            container_id,
            agent_id,
            capability,
        }
    }

    /// A container matches if its id passes the filter and at least one of
    /// its agents passes the agent filter and offers the capability.
    pub fn matches(&self, container: &AgentContainer) -> bool {
        if let Some(id) = self.container_id {
            if container.container_id != id {
                return false;
            }
        }
        container.agents.iter().any(|agent| self.matches_agent(agent))
    }

    fn matches_agent(&self, agent: &AgentDescription) -> bool {
        if let Some(id) = self.agent_id {
            if agent.agent_id != id {
                return false;
            }
        }
        match self.capability {
            None => true,
            Some(Capability::Action(name)) => agent.has_action(name),
            Some(Capability::Stream(name)) => agent.has_stream(name),
        }
    }
}

/// Where a request may be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Container(String),
    Peer(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Container(id) => write!(f, "container {}", id),
            Target::Peer(url) => write!(f, "platform {}", url),
        }
    }
}

/// 请求调度器
pub struct Dispatcher {
    directory: Arc<Directory>,
    backend: ContainerBackendRef,
    endpoints: EndpointFactoryRef,
}

impl Dispatcher {
    pub fn new(
        directory: Arc<Directory>,
        backend: ContainerBackendRef,
        endpoints: EndpointFactoryRef,
    ) -> Self {
        Self {
            directory,
            backend,
            endpoints,
        }
    }

    /// Ordered candidates: matching local containers, then (if `forward`)
    /// peers whose last snapshot holds a matching container.
    pub fn candidates(&self, selector: &Selector<'_>, forward: bool) -> Vec<Target> {
        let mut targets: Vec<Target> = self
            .directory
            .list_containers()
            .iter()
            .filter(|c| selector.matches(c))
            .map(|c| Target::Container(c.container_id.clone()))
            .collect();

        if forward {
            targets.extend(
                self.directory
                    .list_peers()
                    .into_iter()
                    .filter(|(_, platform)| platform.containers.iter().any(|c| selector.matches(c)))
                    .map(|(url, _)| Target::Peer(url)),
            );
        }
        debug!("Dispatch candidates for {:?}: {:?}", selector, targets);
        targets
    }

    fn endpoint_for(&self, target: &Target) -> Result<RemoteEndpointRef> {
        match target {
            Target::Container(id) => {
                let url = self.backend.url(id)?;
                let token = self.directory.get_token(id);
                Ok(self.endpoints.endpoint(&url, token.as_deref()))
            }
            Target::Peer(url) => {
                let token = self.directory.get_token(url);
                Ok(self.endpoints.endpoint(url, token.as_deref()))
            }
        }
    }

    /// Try candidates in order until one succeeds.
    async fn first_success<T, F, Fut>(&self, what: &str, targets: Vec<Target>, call: F) -> Result<T>
    where
        F: Fn(RemoteEndpointRef) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if targets.is_empty() {
            return Err(PlatformError::not_found(format!("No candidate found for {}", what)));
        }

        let mut last_error = None;
        for target in targets {
            let result = match self.endpoint_for(&target) {
                Ok(endpoint) => call(endpoint).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transport() => {
                    warn!("{} failed at {}: {}", what, target, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| PlatformError::not_found(format!("No candidate found for {}", what))))
    }

    pub async fn send(
        &self,
        agent_id: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let selector = Selector::new(container_id, Some(agent_id), None);
        let targets = self.candidates(&selector, forward);
        self.first_success(&format!("send to agent {}", agent_id), targets, |endpoint| async move {
            endpoint.send(agent_id, message, container_id, false).await
        })
        .await
    }

    /// Deliver to every candidate. Failures are logged, never returned.
    pub async fn broadcast(
        &self,
        channel: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let selector = Selector::new(container_id, None, None);
        let targets = self.candidates(&selector, forward);

        let deliveries = targets.iter().map(|target| async move {
            let result = match self.endpoint_for(target) {
                Ok(endpoint) => endpoint.broadcast(channel, message, container_id, false).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!("Broadcast on {} failed at {}: {}", channel, target, e);
            }
            result.is_ok()
        });
        let delivered = join_all(deliveries).await.into_iter().filter(|ok| *ok).count();
        debug!("Broadcast on {} delivered to {}/{} targets", channel, delivered, targets.len());
        Ok(())
    }

    /// `timeout` is handed to the endpoint; a timed-out candidate is just a failed one.
    pub async fn invoke(
        &self,
        action: &str,
        params: &Map<String, Value>,
        agent_id: Option<&str>,
        timeout: Option<Duration>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<Value> {
        let selector = Selector::new(container_id, agent_id, Some(Capability::Action(action)));
        let targets = self.candidates(&selector, forward);
        self.first_success(&format!("action {}", action), targets, |endpoint| async move {
            endpoint
                .invoke(action, params, agent_id, timeout, container_id, false)
                .await
        })
        .await
    }

    pub async fn get_stream(
        &self,
        stream: &str,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<ByteStream> {
        let selector = Selector::new(container_id, agent_id, Some(Capability::Stream(stream)));
        let targets = self.candidates(&selector, forward);
        self.first_success(&format!("stream {}", stream), targets, |endpoint| async move {
            endpoint.get_stream(stream, agent_id, container_id, false).await
        })
        .await
    }

    /// `data` is shared between attempts without copying.
    pub async fn post_stream(
        &self,
        stream: &str,
        data: Bytes,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let selector = Selector::new(container_id, agent_id, Some(Capability::Stream(stream)));
        let targets = self.candidates(&selector, forward);
        self.first_success(&format!("stream {}", stream), targets, |endpoint| {
            let data = data.clone();
            async move {
                endpoint
                    .post_stream(stream, data, agent_id, container_id, false)
                    .await
            }
        })
        .await
    }

    /// Agents of local containers, then of peer snapshots if `include_connected`.
    pub fn agents(&self, include_connected: bool) -> Vec<AgentDescription> {
        let mut agents: Vec<AgentDescription> = self
            .directory
            .list_containers()
            .into_iter()
            .flat_map(|c| c.agents)
            .collect();
        if include_connected {
            agents.extend(
                self.directory
                    .list_peers()
                    .into_iter()
                    .flat_map(|(_, platform)| platform.containers)
                    .flat_map(|c| c.agents),
            );
        }
        agents
    }

    /// First agent with this id, locally or at a peer
    pub fn agent(&self, agent_id: &str) -> Option<AgentDescription> {
        self.agents(true)
            .into_iter()
            .find(|agent| agent.agent_id == agent_id)
    }
}
