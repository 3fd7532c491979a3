//! Mock remote endpoints.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use amp_types::{AgentContainer, AgentContainerImage, Login, LoginConnection, Message, RuntimePlatform};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{Map, Value};

use super::{MockCallTracker, MockFailure};
use crate::error::{PlatformError, Result};
use crate::traits::{ByteStream, EndpointFactory, RemoteEndpoint, RemoteEndpointRef};

#[derive(Debug)]
struct Behavior {
    failure: Option<MockFailure>,
    method_failures: HashMap<&'static str, MockFailure>,
    platform_info: Option<RuntimePlatform>,
    container_info: AgentContainer,
    container_info_script: VecDeque<std::result::Result<AgentContainer, MockFailure>>,
    invoke_result: Value,
    stream_chunks: Vec<&'static str>,
    login_token: String,
    connect_result: bool,
    disconnect_result: bool,
    notify_result: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            failure: None,
            method_failures: HashMap::new(),
            platform_info: None,
            container_info: AgentContainer::new("", AgentContainerImage::new("mock-image")),
            container_info_script: VecDeque::new(),
            invoke_result: Value::Null,
            stream_chunks: Vec::new(),
            login_token: "mock-token".to_string(),
            connect_result: true,
            disconnect_result: true,
            notify_result: true,
        }
    }
}

/// Mock 远程端点
///
/// Clones share behaviour and tracker.
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    url: String,
    behavior: Arc<Mutex<Behavior>>,
    tracker: MockCallTracker,
}

impl MockEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            behavior: Arc::new(Mutex::new(Behavior::default())),
            tracker: MockCallTracker::new(),
        }
    }

    /// Every operation fails with `err`
    pub fn failing(self, err: PlatformError) -> Self {
        self.behavior.lock().unwrap().failure = Some(err.into());
        self
    }

    /// Only `method` fails with `err`
    pub fn failing_on(self, method: &'static str, err: PlatformError) -> Self {
        self.behavior
            .lock()
            .unwrap()
            .method_failures
            .insert(method, err.into());
        self
    }

    pub fn with_platform_info(self, info: RuntimePlatform) -> Self {
        self.behavior.lock().unwrap().platform_info = Some(info);
        self
    }

    pub fn with_container_info(self, info: AgentContainer) -> Self {
        self.behavior.lock().unwrap().container_info = info;
        self
    }

    /// Answers for successive `container_info` calls before the default applies
    pub fn with_container_info_sequence(
        self,
        answers: Vec<std::result::Result<AgentContainer, PlatformError>>,
    ) -> Self {
        self.behavior.lock().unwrap().container_info_script = answers
            .into_iter()
            .map(|r| r.map_err(MockFailure::from))
            .collect();
        self
    }

    pub fn with_invoke_result(self, result: Value) -> Self {
        self.behavior.lock().unwrap().invoke_result = result;
        self
    }

    pub fn with_stream_chunks(self, chunks: Vec<&'static str>) -> Self {
        self.behavior.lock().unwrap().stream_chunks = chunks;
        self
    }

    pub fn with_login_token(self, token: impl Into<String>) -> Self {
        self.behavior.lock().unwrap().login_token = token.into();
        self
    }

    pub fn with_connect_result(self, result: bool) -> Self {
        self.behavior.lock().unwrap().connect_result = result;
        self
    }

    pub fn with_disconnect_result(self, result: bool) -> Self {
        self.behavior.lock().unwrap().disconnect_result = result;
        self
    }

    pub fn with_notify_result(self, result: bool) -> Self {
        self.behavior.lock().unwrap().notify_result = result;
        self
    }

    pub fn tracker(&self) -> &MockCallTracker {
        &self.tracker
    }

    fn rebased(&self, url: &str, tracker: MockCallTracker) -> Self {
        Self {
            url: url.to_string(),
            behavior: self.behavior.clone(),
            tracker,
        }
    }

    fn call(&self, method: &'static str, mut args: Vec<String>) -> Result<()> {
        args.insert(0, self.url.clone());
        self.tracker.record(method, args);
        let behavior = self.behavior.lock().unwrap();
        if let Some(failure) = behavior.method_failures.get(method) {
            return Err(failure.to_error());
        }
        match &behavior.failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn fwd(forward: bool) -> String {
    format!("forward={}", forward)
}

#[async_trait]
impl RemoteEndpoint for MockEndpoint {
    fn base_url(&self) -> &str {
        &self.url
    }

    async fn platform_info(&self) -> Result<RuntimePlatform> {
        self.call("platform_info", vec![])?;
        let behavior = self.behavior.lock().unwrap();
        Ok(behavior
            .platform_info
            .clone()
            .unwrap_or_else(|| RuntimePlatform::new(format!("platform@{}", self.url), self.url.clone())))
    }

    async fn container_info(&self) -> Result<AgentContainer> {
        self.call("container_info", vec![])?;
        let mut behavior = self.behavior.lock().unwrap();
        match behavior.container_info_script.pop_front() {
            Some(answer) => answer.map_err(|f| f.to_error()),
            None => Ok(behavior.container_info.clone()),
        }
    }

    async fn login(&self, login: &Login) -> Result<String> {
        self.call("login", vec![login.username.clone()])?;
        Ok(self.behavior.lock().unwrap().login_token.clone())
    }

    async fn send(
        &self,
        agent_id: &str,
        _message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        self.call("send", vec![agent_id.to_string(), opt(container_id), fwd(forward)])
    }

    async fn broadcast(
        &self,
        channel: &str,
        _message: &Message,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        self.call("broadcast", vec![channel.to_string(), opt(container_id), fwd(forward)])
    }

    async fn invoke(
        &self,
        action: &str,
        _params: &Map<String, Value>,
        agent_id: Option<&str>,
        timeout: Option<Duration>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<Value> {
        self.call(
            "invoke",
            vec![
                action.to_string(),
                opt(agent_id),
                format!("timeout={:?}", timeout),
                opt(container_id),
                fwd(forward),
            ],
        )?;
        Ok(self.behavior.lock().unwrap().invoke_result.clone())
    }

    async fn get_stream(
        &self,
        stream: &str,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<ByteStream> {
        self.call(
            "get_stream",
            vec![stream.to_string(), opt(agent_id), opt(container_id), fwd(forward)],
        )?;
        let chunks = self.behavior.lock().unwrap().stream_chunks.clone();
        Ok(futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes())))).boxed())
    }

    async fn post_stream(
        &self,
        stream: &str,
        data: Bytes,
        agent_id: Option<&str>,
        container_id: Option<&str>,
        forward: bool,
    ) -> Result<()> {
        self.call(
            "post_stream",
            vec![
                stream.to_string(),
                format!("{} bytes", data.len()),
                opt(agent_id),
                opt(container_id),
                fwd(forward),
            ],
        )
    }

    async fn connect(&self, connection: &LoginConnection) -> Result<bool> {
        self.call("connect", vec![connection.url.clone()])?;
        Ok(self.behavior.lock().unwrap().connect_result)
    }

    async fn disconnect(&self, url: &str) -> Result<bool> {
        self.call("disconnect", vec![url.to_string()])?;
        Ok(self.behavior.lock().unwrap().disconnect_result)
    }

    async fn notify_update_container(&self, container_id: &str) -> Result<bool> {
        self.call("notify_update_container", vec![container_id.to_string()])?;
        Ok(self.behavior.lock().unwrap().notify_result)
    }

    async fn notify_update_platform(&self, url: &str) -> Result<bool> {
        self.call("notify_update_platform", vec![url.to_string()])?;
        Ok(self.behavior.lock().unwrap().notify_result)
    }
}

/// Mock 端点工厂
///
/// Unregistered URLs get an endpoint built from the default template.
/// All endpoints record into the factory's tracker; the first argument of
/// every record is the endpoint URL.
#[derive(Debug)]
pub struct MockEndpointFactory {
    tracker: MockCallTracker,
    registered: Mutex<HashMap<String, MockEndpoint>>,
    default: Mutex<MockEndpoint>,
    created: Mutex<Vec<(String, Option<String>)>>,
}

impl Default for MockEndpointFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEndpointFactory {
    pub fn new() -> Self {
        Self {
            tracker: MockCallTracker::new(),
            registered: Mutex::new(HashMap::new()),
            default: Mutex::new(MockEndpoint::new("")),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Use `endpoint` for calls to `url`
    pub fn register(&self, url: &str, endpoint: MockEndpoint) {
        self.registered
            .lock()
            .unwrap()
            .insert(url.to_string(), endpoint.rebased(url, self.tracker.clone()));
    }

    /// Template for every URL without a registered endpoint
    pub fn set_default(&self, endpoint: MockEndpoint) {
        *self.default.lock().unwrap() = endpoint;
    }

    pub fn tracker(&self) -> &MockCallTracker {
        &self.tracker
    }

    /// Number of `method` calls made against `url`
    pub fn calls_to(&self, url: &str, method: &str) -> usize {
        self.tracker
            .get_calls_for(method)
            .iter()
            .filter(|c| c.args.first().map(String::as_str) == Some(url))
            .count()
    }

    /// `(url, token)` of every endpoint handed out
    pub fn created(&self) -> Vec<(String, Option<String>)> {
        self.created.lock().unwrap().clone()
    }
}

impl EndpointFactory for MockEndpointFactory {
    fn endpoint(&self, base_url: &str, token: Option<&str>) -> RemoteEndpointRef {
        self.created
            .lock()
            .unwrap()
            .push((base_url.to_string(), token.map(String::from)));
        let registered = self.registered.lock().unwrap().get(base_url).cloned();
        let endpoint = match registered {
            Some(endpoint) => endpoint,
            None => self
                .default
                .lock()
                .unwrap()
                .rebased(base_url, self.tracker.clone()),
        };
        Arc::new(endpoint)
    }
}
