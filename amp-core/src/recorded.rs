//! # Recorded
//!
//! Decorator over [`PlatformApi`] that writes a CALL event before and a
//! RESULT or ERROR event after every state-changing or dispatching call.
//! Queries and `get_stream` pass through unrecorded.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use amp_types::{
    AgentContainer, AgentDescription, Event, LoginConnection, Message, PostAgentContainer,
    RuntimePlatform, REDACTED,
};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::history::EventHistory;
use crate::platform::PlatformApi;
use crate::traits::{Actor, ByteStream};

/// 事件记录装饰器
pub struct Recorded<P> {
    inner: P,
    history: Arc<EventHistory>,
}

impl<P: PlatformApi> Recorded<P> {
    pub fn new(inner: P, history: Arc<EventHistory>) -> Self {
        Self { inner, history }
    }

    pub fn with_capacity(inner: P, capacity: usize) -> Self {
        Self::new(inner, Arc::new(EventHistory::new(capacity)))
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn history(&self) -> Vec<Event> {
        self.history.snapshot()
    }

    async fn record<T, F>(&self, method: &str, params: Value, call: F) -> Result<T>
    where
        T: Serialize + Send,
        F: Future<Output = Result<T>> + Send,
    {
        let call_id = self.history.record_call(method, params);
        match call.await {
            Ok(value) => {
                let result = serde_json::to_value(&value).unwrap_or_default();
                self.history.record_result(&call_id, method, result);
                Ok(value)
            }
            Err(e) => {
                self.history.record_error(&call_id, method, &e.to_string());
                Err(e)
            }
        }
    }
}

fn deployment_params(request: &PostAgentContainer, timeout: Option<Duration>) -> Value {
    let arguments: BTreeMap<&str, &str> = request
        .arguments
        .iter()
        .map(|(name, value)| {
            let shown = if request.image.is_confidential(name) {
                REDACTED
            } else {
                value.as_str()
            };
            (name.as_str(), shown)
        })
        .collect();
    json!({
        "image": request.image.image_name,
        "arguments": arguments,
        "timeout": timeout.map(|t| t.as_secs()),
    })
}

#[async_trait]
impl<P: PlatformApi> PlatformApi for Recorded<P> {
    async fn info(&self) -> Result<RuntimePlatform> {
        self.inner.info().await
    }

    async fn config(&self) -> Result<BTreeMap<String, String>> {
        self.inner.config().await
    }

    async fn agents(&self, include_connected: bool) -> Result<Vec<AgentDescription>> {
        self.inner.agents(include_connected).await
    }

    async fn agent(&self, agent_id: &str) -> Result<AgentDescription> {
        self.inner.agent(agent_id).await
    }

    async fn send(
        &self,
        agent_id: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let params = json!({
            "agentId": agent_id,
            "message": message,
            "containerId": container_id,
            "forward": forward,
        });
        self.record(
            "send",
            params,
            self.inner.send(agent_id, message, container_id, forward),
        )
        .await
    }

    async fn broadcast(
        &self,
        channel: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let params = json!({
            "channel": channel,
            "message": message,
            "containerId": container_id,
            "forward": forward,
        });
        self.record(
            "broadcast",
            params,
            self.inner.broadcast(channel, message, container_id, forward),
        )
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
        let recorded = json!({
            "action": action,
            "parameters": params,
            "agentId": agent_id,
            "timeout": timeout.map(|t| t.as_secs()),
            "containerId": container_id,
            "forward": forward,
        });
        self.record(
            "invoke",
            recorded,
            self.inner
                .invoke(action, params, agent_id, timeout, container_id, forward),
        )
        .await
    }

    async fn get_stream(
        &self,
        stream: &str,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<ByteStream> {
        self.inner
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
        let params = json!({
            "stream": stream,
            "bytes": data.len(),
            "agentId": agent_id,
            "containerId": container_id,
            "forward": forward,
        });
        self.record(
            "postStream",
            params,
            self.inner
                .post_stream(stream, data, agent_id, container_id, forward),
        )
        .await
    }

    async fn containers(&self) -> Result<Vec<AgentContainer>> {
        self.inner.containers().await
    }

    async fn container(&self, container_id: &str) -> Result<AgentContainer> {
        self.inner.container(container_id).await
    }

    async fn add_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.record(
            "addContainer",
            deployment_params(request, timeout),
            self.inner.add_container(actor, request, timeout),
        )
        .await
    }

    async fn update_container(
        &self,
        actor: &Actor,
        request: &PostAgentContainer,
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.record(
            "updateContainer",
            deployment_params(request, timeout),
            self.inner.update_container(actor, request, timeout),
        )
        .await
    }

    async fn remove_container(&self, actor: &Actor, container_id: &str) -> Result<bool> {
        self.record(
            "removeContainer",
            json!({ "containerId": container_id }),
            self.inner.remove_container(actor, container_id),
        )
        .await
    }

    async fn connections(&self) -> Result<Vec<String>> {
        self.inner.connections().await
    }

    async fn connect(&self, connection: &LoginConnection) -> Result<bool> {
        self.record(
            "connectPlatform",
            json!({ "url": connection.url, "username": connection.username }),
            self.inner.connect(connection),
        )
        .await
    }

    async fn disconnect(&self, url: &str) -> Result<bool> {
        self.record(
            "disconnectPlatform",
            json!({ "url": url }),
            self.inner.disconnect(url),
        )
        .await
    }

    async fn notify_update_container(&self, container_id: &str) -> Result<bool> {
        self.record(
            "notifyUpdateContainer",
            json!({ "containerId": container_id }),
            self.inner.notify_update_container(container_id),
        )
        .await
    }

    async fn notify_update_platform(&self, url: &str) -> Result<bool> {
        self.record(
            "notifyUpdatePlatform",
            json!({ "url": url }),
            self.inner.notify_update_platform(url),
        )
        .await
    }
}
