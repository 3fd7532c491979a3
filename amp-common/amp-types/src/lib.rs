pub mod agent;
pub mod container;
pub mod event;
pub mod message;
pub mod platform;

pub use agent::{Action, AgentDescription, Parameter, Stream, StreamMode};
pub use container::{
    AgentContainer, AgentContainerImage, ClientConfig, Connectivity, ContainerEnvironment,
    ImageParameter, PortDescription, PostAgentContainer, DEFAULT_API_PORT, REDACTED,
};
pub use event::{Event, EventType};
pub use message::Message;
pub use platform::{Login, LoginConnection, RuntimePlatform};

pub type ContainerId = String;
pub type AgentId = String;
