//! # HTTP Remote Endpoint
//!
//! reqwest client for the container and platform REST API.
//!
//! | Operation | Route |
//! |-----------|-------|
//! | info | `GET /info` |
//! | login | `POST /login` |
//! | send | `POST /send/{agentId}` |
//! | broadcast | `POST /broadcast/{channel}` |
//! | invoke | `POST /invoke/{action}[/{agentId}]` |
//! | streams | `GET`/`POST /stream/{stream}[/{agentId}]` |
//! | connect / disconnect | `POST` / `DELETE /connections` |
//! | notify | `POST /containers/notify`, `POST /connections/notify` |
//!
//! Dispatch routes take `containerId`, `forward` and (invoke only) `timeout`
//! as query parameters.

use std::time::Duration;

use amp_types::{AgentContainer, Login, LoginConnection, Message, RuntimePlatform};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PlatformError, Result};
use crate::traits::{ByteStream, EndpointFactory, RemoteEndpoint, RemoteEndpointRef};

/// Header carrying the id of the calling platform
pub const SENDER_HEADER: &str = "senderId";

/// HTTP client for one container or platform
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    base_url: String,
    token: Option<String>,
    sender_id: Option<String>,
}

impl HttpEndpoint {
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
            sender_id: None,
        }
    }

    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            PlatformError::invalid_input(format!("Invalid URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| PlatformError::invalid_input(format!("URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(sender) = &self.sender_id {
            builder = builder.header(SENDER_HEADER, sender);
        }
        builder
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::unreachable(format!("{}: {}", self.base_url, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!("{} answered {}: {}", self.base_url, status, body);
        Err(match status {
            StatusCode::NOT_FOUND => PlatformError::not_found(body),
            StatusCode::UNAUTHORIZED => PlatformError::unauthorized(body),
            StatusCode::FORBIDDEN => PlatformError::forbidden(body),
            _ => PlatformError::unreachable(format!("{} answered {}: {}", self.base_url, status, body)),
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let body = response
            .bytes()
            .await
            .map_err(|e| PlatformError::unreachable(format!("{}: {}", self.base_url, e)))?;
        // only JSON of the wrong shape is malformed; a body that is not JSON
        // yet (placeholder page of a booting service) counts as not reachable
        serde_json::from_slice(&body).map_err(|e| {
            if e.is_data() {
                PlatformError::malformed(format!("{}: {}", self.base_url, e))
            } else {
                PlatformError::unreachable(format!("{}: unexpected body: {}", self.base_url, e))
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments)?;
        let response = self.execute(self.request(Method::GET, url)).await?;
        self.read_json(response).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let url = self.url(segments)?;
        let response = self.execute(self.request(method, url).json(body)).await?;
        self.read_json(response).await
    }
}

fn dispatch_query(container_id: Option<&str>, forward: bool) -> Vec<(&'static str, String)> {
    let mut query = vec![("forward", forward.to_string())];
    if let Some(id) = container_id {
        query.push(("containerId", id.to_string()));
    }
    query
}

fn with_agent<'a>(base: [&'a str; 2], agent_id: Option<&'a str>) -> Vec<&'a str> {
    let mut segments = base.to_vec();
    if let Some(agent) = agent_id {
        segments.push(agent);
    }
    segments
}

#[async_trait]
impl RemoteEndpoint for HttpEndpoint {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn platform_info(&self) -> Result<RuntimePlatform> {
        self.get_json(&["info"]).await
    }

    async fn container_info(&self) -> Result<AgentContainer> {
        self.get_json(&["info"]).await
    }

    async fn login(&self, login: &Login) -> Result<String> {
        let url = self.url(&["login"])?;
        let response = self.execute(self.request(Method::POST, url).json(login)).await?;
        let token = response
            .text()
            .await
            .map_err(|e| PlatformError::unreachable(format!("{}: {}", self.base_url, e)))?;
        let token = token.trim().trim_matches('"').to_string();
        if token.is_empty() {
            return Err(PlatformError::malformed(format!("{}: empty token", self.base_url)));
        }
        Ok(token)
    }

    async fn send(
        &self,
        agent_id: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let url = self.url(&["send", agent_id])?;
        let builder = self
            .request(Method::POST, url)
            .query(&dispatch_query(container_id, forward))
            .json(message);
        self.execute(builder).await?;
        Ok(())
    }

    async fn broadcast(
        &self,
        channel: &str,
        message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let url = self.url(&["broadcast", channel])?;
        let builder = self
            .request(Method::POST, url)
            .query(&dispatch_query(container_id, forward))
            .json(message);
        self.execute(builder).await?;
        Ok(())
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
        let url = self.url(&with_agent(["invoke", action], agent_id))?;
        let mut query = dispatch_query(container_id, forward);
        let mut builder = self.request(Method::POST, url);
        if let Some(timeout) = timeout {
            query.push(("timeout", timeout.as_secs().to_string()));
            builder = builder.timeout(timeout);
        }
        let response = self.execute(builder.query(&query).json(params)).await?;
        self.read_json(response).await
    }

    async fn get_stream(
        &self,
        stream: &str,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<ByteStream> {
        let url = self.url(&with_agent(["stream", stream], agent_id))?;
        let builder = self
            .request(Method::GET, url)
            .query(&dispatch_query(container_id, forward));
        let response = self.execute(builder).await?;
        let base_url = self.base_url.clone();
        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| PlatformError::unreachable(format!("{}: {}", base_url, e)))
            })
            .boxed())
    }

    async fn post_stream(
        &self,
        stream: &str,
        data: Bytes,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        let url = self.url(&with_agent(["stream", stream], agent_id))?;
        let builder = self
            .request(Method::POST, url)
            .query(&dispatch_query(container_id, forward))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        self.execute(builder).await?;
        Ok(())
    }

    async fn connect(&self, connection: &LoginConnection) -> Result<bool> {
        self.send_json(Method::POST, &["connections"], connection).await
    }

    async fn disconnect(&self, url: &str) -> Result<bool> {
        self.send_json(Method::DELETE, &["connections"], url).await
    }

    async fn notify_update_container(&self, container_id: &str) -> Result<bool> {
        self.send_json(Method::POST, &["containers", "notify"], container_id)
            .await
    }

    async fn notify_update_platform(&self, url: &str) -> Result<bool> {
        self.send_json(Method::POST, &["connections", "notify"], url)
            .await
    }
}

/// Creates [`HttpEndpoint`]s sharing one connection pool
#[derive(Debug, Clone)]
pub struct HttpEndpointFactory {
    client: Client,
    sender_id: Option<String>,
}

impl HttpEndpointFactory {
    /// `timeout` bounds every request that does not carry its own timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PlatformError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            sender_id: None,
        })
    }

    /// Send `sender_id` with every request
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }
}

impl EndpointFactory for HttpEndpointFactory {
    fn endpoint(&self, base_url: &str, token: Option<&str>) -> RemoteEndpointRef {
        let mut endpoint = HttpEndpoint::new(self.client.clone(), base_url, token.map(String::from));
        if let Some(sender) = &self.sender_id {
            endpoint = endpoint.with_sender(sender.clone());
        }
        std::sync::Arc::new(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(base: &str) -> HttpEndpoint {
        HttpEndpoint::new(Client::new(), base, None)
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let ep = endpoint("http://host:8000");
        assert_eq!(
            ep.url(&["invoke", "add numbers", "agent/1"]).unwrap().as_str(),
            "http://host:8000/invoke/add%20numbers/agent%2F1"
        );

        let ep = endpoint("http://host:8000/platform/");
        assert_eq!(
            ep.url(&["info"]).unwrap().as_str(),
            "http://host:8000/platform/info"
        );
    }

    #[test]
    fn test_dispatch_query() {
        assert_eq!(
            dispatch_query(Some("c1"), false),
            vec![("forward", "false".to_string()), ("containerId", "c1".to_string())]
        );
        assert_eq!(dispatch_query(None, true).len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // port 9 (discard) on localhost is normally closed
        let ep = endpoint("http://127.0.0.1:9");
        let result = ep.platform_info().await;
        assert!(matches!(result, Err(PlatformError::Unreachable(_))));
    }
}
