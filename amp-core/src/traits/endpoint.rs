//! # RemoteEndpoint Trait
//!
//! 同一组操作既可指向智能体容器，也可指向对等平台。
//!
//! 平台转发时总是传入 `forward = false`，转发最多一跳。

use std::sync::Arc;
use std::time::Duration;

use amp_types::{AgentContainer, Login, LoginConnection, Message, RuntimePlatform};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::error::Result;

/// Streamed response body
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// 远程端点 (容器或对等平台)
///
/// Errors: transport failures are `Unreachable`, schema-invalid payloads are
/// `MalformedResponse`, a 404 answer is `NotFound`.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// Base URL this endpoint talks to
    fn base_url(&self) -> &str;

    /// `GET /info` of a peer platform
    async fn platform_info(&self) -> Result<RuntimePlatform>;

    /// `GET /info` of an agent container
    async fn container_info(&self) -> Result<AgentContainer>;

    /// Exchange credentials for a bearer token
    async fn login(&self, login: &Login) -> Result<String>;

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

    /// Invoke an action. `timeout` is passed to the remote side and bounds the request.
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

    /// Ask a peer to connect to the given platform
    async fn connect(&self, connection: &LoginConnection) -> Result<bool>;

    /// Ask a peer to drop its connection to `url`
    async fn disconnect(&self, url: &str) -> Result<bool>;

    /// Tell a platform that one of its containers changed
    async fn notify_update_container(&self, container_id: &str) -> Result<bool>;

    /// Tell a platform that the platform at `url` changed
    async fn notify_update_platform(&self, url: &str) -> Result<bool>;
}

/// Creates endpoints for containers and peers
pub trait EndpointFactory: Send + Sync {
    fn endpoint(&self, base_url: &str, token: Option<&str>) -> RemoteEndpointRef;
}

pub type RemoteEndpointRef = Arc<dyn RemoteEndpoint>;
pub type EndpointFactoryRef = Arc<dyn EndpointFactory>;
