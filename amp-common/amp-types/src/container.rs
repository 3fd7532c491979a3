use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::agent::AgentDescription;

/// Port on which an agent container serves its API unless the image says otherwise.
pub const DEFAULT_API_PORT: u16 = 8082;

/// Placeholder shown instead of confidential argument values.
pub const REDACTED: &str = "****";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerEnvironment {
    Docker,
    Kubernetes,
}

impl fmt::Display for ContainerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerEnvironment::Docker => write!(f, "DOCKER"),
            ContainerEnvironment::Kubernetes => write!(f, "KUBERNETES"),
        }
    }
}

impl FromStr for ContainerEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOCKER" => Ok(ContainerEnvironment::Docker),
            "KUBERNETES" => Ok(ContainerEnvironment::Kubernetes),
            other => Err(format!("unknown container environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescription {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PortDescription {
    pub fn tcp(description: impl Into<String>) -> Self {
        Self {
            protocol: "tcp".to_string(),
            description: Some(description.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParameter {
    pub name: String,
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub confidential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

fn default_param_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContainerImage {
    pub image_name: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub extra_ports: BTreeMap<u16, PortDescription>,
    #[serde(default)]
    pub parameters: Vec<ImageParameter>,
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

impl AgentContainerImage {
    pub fn new(image_name: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            requires: Vec::new(),
            provides: Vec::new(),
            name: None,
            version: None,
            description: None,
            provider: None,
            api_port: DEFAULT_API_PORT,
            extra_ports: BTreeMap::new(),
            parameters: Vec::new(),
        }
    }

    pub fn is_confidential(&self, parameter: &str) -> bool {
        self.parameters
            .iter()
            .any(|p| p.name == parameter && p.confidential)
    }
}

/// Where a running container can be reached. Always set by the platform,
/// never taken from the container's own report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connectivity {
    pub public_url: String,
    pub api_port_mapping: u16,
    #[serde(default)]
    pub extra_port_mappings: BTreeMap<u16, PortDescription>,
}

impl Connectivity {
    /// All host ports held by this container.
    pub fn ports(&self) -> Vec<u16> {
        std::iter::once(self.api_port_mapping)
            .chain(self.extra_port_mappings.keys().copied())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContainer {
    pub container_id: String,
    pub image: AgentContainerImage,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
    #[serde(default)]
    pub agents: Vec<AgentDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default = "Utc::now")]
    pub running_since: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<Connectivity>,
}

impl AgentContainer {
    pub fn new(container_id: impl Into<String>, image: AgentContainerImage) -> Self {
        Self {
            container_id: container_id.into(),
            image,
            arguments: BTreeMap::new(),
            agents: Vec::new(),
            owner: None,
            running_since: Utc::now(),
            connectivity: None,
        }
    }

    pub fn with_agent(mut self, agent: AgentDescription) -> Self {
        self.agents.push(agent);
        self
    }

    /// Copy for external consumers, with confidential arguments masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for (name, value) in copy.arguments.iter_mut() {
            if self.image.is_confidential(name) {
                *value = REDACTED.to_string();
            }
        }
        copy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientConfig {
    Docker,
    #[serde(rename_all = "camelCase")]
    Kubernetes {
        #[serde(default)]
        node_name: Option<String>,
        #[serde(default)]
        host_network: Option<bool>,
    },
}

impl ClientConfig {
    pub fn environment(&self) -> ContainerEnvironment {
        match self {
            ClientConfig::Docker => ContainerEnvironment::Docker,
            ClientConfig::Kubernetes { .. } => ContainerEnvironment::Kubernetes,
        }
    }
}

/// Deployment request for a new agent container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAgentContainer {
    pub image: AgentContainerImage,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_config: Option<ClientConfig>,
}

impl PostAgentContainer {
    pub fn new(image: AgentContainerImage) -> Self {
        Self {
            image,
            arguments: BTreeMap::new(),
            client_config: None,
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = Some(config);
        self
    }
}
