//! Subcommand implementations.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use amp_core::{
    ConfigLoader, EndpointFactory, HttpEndpointFactory, PlatformConfig, RemoteEndpoint,
};
use amp_core::address::parse_platform_url;
use amp_core::traits::RemoteEndpointRef;
use amp_types::{LoginConnection, Message};
use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use futures::StreamExt;
use serde_json::{Map, Value};

#[derive(Subcommand, Debug)]
pub enum NotifyTarget {
    /// A container of the platform changed
    Container { id: String },
    /// A connected platform changed
    Platform { url: String },
}

/// Loaded configuration plus the endpoint of the target platform
pub struct Context {
    config: PlatformConfig,
    endpoint: RemoteEndpointRef,
    json: bool,
}

impl Context {
    pub fn load(
        config_path: Option<PathBuf>,
        url: Option<String>,
        token: Option<String>,
        json: bool,
    ) -> Result<Self> {
        let loader = match config_path {
            Some(path) => ConfigLoader::with_path(path),
            None => ConfigLoader::new(),
        };
        let config = loader
            .load()
            .with_context(|| format!("loading {}", loader.config_path().display()))?;

        let url = match url {
            Some(url) => parse_platform_url(&url)?,
            None => config.own_base_url(),
        };
        let factory = HttpEndpointFactory::new(config.request_timeout())?;
        let endpoint = factory.endpoint(&url, token.as_deref());

        Ok(Self {
            config,
            endpoint,
            json,
        })
    }

    pub fn url(&self) -> &str {
        self.endpoint.base_url()
    }

    fn print(&self, value: &Value) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(value)?);
        } else {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }
}

/// JSON if it parses, otherwise the raw text as a JSON string
fn json_or_string(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_params(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("parameter '{}' is not key=value", pair);
        };
        if key.is_empty() {
            bail!("parameter '{}' has an empty name", pair);
        }
        params.insert(key.to_string(), json_or_string(value));
    }
    Ok(params)
}

pub async fn info(ctx: &Context) -> Result<()> {
    let info = ctx.endpoint.platform_info().await?;
    if ctx.json {
        return ctx.print(&serde_json::to_value(&info)?);
    }
    println!("Platform:    {}", info.platform_id);
    println!("Base URL:    {}", info.base_url);
    println!("Running:     {}", info.running_since);
    println!("Containers:  {}", info.containers.len());
    for container in &info.containers {
        println!(
            "  {}  {}  ({} agents)",
            container.container_id,
            container.image.image_name,
            container.agents.len()
        );
    }
    println!("Connections: {}", info.connections.len());
    for url in &info.connections {
        println!("  {}", url);
    }
    Ok(())
}

pub async fn agents(ctx: &Context) -> Result<()> {
    let info = ctx.endpoint.platform_info().await?;
    let agents: Vec<_> = info
        .containers
        .iter()
        .flat_map(|c| c.agents.iter().map(move |a| (c, a)))
        .collect();

    if ctx.json {
        let list: Vec<_> = agents.iter().map(|(_, a)| a).collect();
        return ctx.print(&serde_json::to_value(list)?);
    }
    if agents.is_empty() {
        println!("No agents");
    }
    for (container, agent) in agents {
        let actions: Vec<_> = agent.actions.iter().map(|a| a.name.as_str()).collect();
        println!(
            "{}  [{}]  container={}  actions={}",
            agent.agent_id,
            agent.agent_type.as_deref().unwrap_or("-"),
            container.container_id,
            actions.join(",")
        );
    }
    Ok(())
}

pub async fn send(
    ctx: &Context,
    agent: &str,
    payload: &str,
    container: Option<&str>,
    forward: bool,
) -> Result<()> {
    let message = Message::new(json_or_string(payload));
    ctx.endpoint.send(agent, &message, container, forward).await?;
    println!("Sent to {}", agent);
    Ok(())
}

pub async fn broadcast(
    ctx: &Context,
    channel: &str,
    payload: &str,
    container: Option<&str>,
    forward: bool,
) -> Result<()> {
    let message = Message::new(json_or_string(payload));
    ctx.endpoint
        .broadcast(channel, &message, container, forward)
        .await?;
    println!("Broadcast on {}", channel);
    Ok(())
}

pub async fn invoke(
    ctx: &Context,
    action: &str,
    agent: Option<&str>,
    params: &[String],
    timeout: Option<u64>,
    container: Option<&str>,
    forward: bool,
) -> Result<()> {
    let params = parse_params(params)?;
    let result = ctx
        .endpoint
        .invoke(
            action,
            &params,
            agent,
            timeout.map(Duration::from_secs),
            container,
            forward,
        )
        .await?;
    ctx.print(&result)
}

pub async fn stream(
    ctx: &Context,
    name: &str,
    agent: Option<&str>,
    container: Option<&str>,
    forward: bool,
) -> Result<()> {
    let mut chunks = ctx
        .endpoint
        .get_stream(name, agent, container, forward)
        .await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    while let Some(chunk) = chunks.next().await {
        out.write_all(&chunk?)?;
    }
    out.flush()?;
    Ok(())
}

pub async fn connect(
    ctx: &Context,
    url: &str,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let url = parse_platform_url(url)?;
    let mut connection = LoginConnection::new(url.clone());
    if let (Some(username), Some(password)) = (username, password) {
        connection = connection.with_credentials(username, password);
    }
    if ctx.endpoint.connect(&connection).await? {
        println!("Connected to {}", url);
    } else {
        println!("Already connected to {}", url);
    }
    Ok(())
}

pub async fn disconnect(ctx: &Context, url: &str) -> Result<()> {
    let url = parse_platform_url(url)?;
    if ctx.endpoint.disconnect(&url).await? {
        println!("Disconnected from {}", url);
    } else {
        println!("Not connected to {}", url);
    }
    Ok(())
}

pub async fn notify(ctx: &Context, target: NotifyTarget) -> Result<()> {
    let (what, ok) = match target {
        NotifyTarget::Container { id } => {
            let ok = ctx.endpoint.notify_update_container(&id).await?;
            (id, ok)
        }
        NotifyTarget::Platform { url } => {
            let url = parse_platform_url(&url)?;
            let ok = ctx.endpoint.notify_update_platform(&url).await?;
            (url, ok)
        }
    };
    if ok {
        println!("{} refreshed", what);
    } else {
        println!("{} was unreachable and has been removed", what);
    }
    Ok(())
}

pub fn config(ctx: &Context) -> Result<()> {
    let map = ctx.config.to_map();
    if ctx.json {
        return ctx.print(&serde_json::to_value(map)?);
    }
    for (key, value) in map {
        println!("{:<24} {}", key, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_or_string() {
        assert_eq!(json_or_string("42"), Value::from(42));
        assert_eq!(json_or_string("{\"a\":1}")["a"], Value::from(1));
        assert_eq!(json_or_string("hello"), Value::from("hello"));
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["a=1".to_string(), "name=bob".to_string()]).unwrap();
        assert_eq!(params["a"], Value::from(1));
        assert_eq!(params["name"], Value::from("bob"));

        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=1".to_string()]).is_err());
    }
}
