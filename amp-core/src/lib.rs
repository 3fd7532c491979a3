//! # AMP Core Library
//!
//! Dispatch and federation engine of an AMP runtime platform.
//!
//! A platform hosts agent containers and federates with other platforms, so
//! a message, action invocation or stream request issued at any platform can
//! reach an agent in a local container or, if forwarded, in a container of a
//! connected peer.
//!
//! ## Architecture
//!
//! - **Directory**: concurrent registry of containers, peers, tokens and pending connections
//! - **Dispatcher**: send / broadcast / invoke / stream with ordered fallback
//! - **Lifecycle**: container deployment, readiness polling and rollback
//! - **Federation**: connect / disconnect / notify handshake between platforms
//! - **Platform**: facade implementing [`PlatformApi`], optionally wrapped in [`Recorded`]
//!
//! ```text
//! transport ──▶ PlatformApi ──▶ Dispatcher ─┐
//!                          ├──▶ Lifecycle ──┼──▶ Directory
//!                          └──▶ Federation ─┘
//!                                   │
//!                      RemoteEndpoint / ContainerBackend
//! ```

pub use amp_types::*;

pub mod address;
pub mod auth;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod federation;
pub mod history;
pub mod http;
pub mod lifecycle;
pub mod platform;
pub mod ports;
pub mod recorded;
pub mod requirements;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test;

pub use config::{ConfigLoader, PlatformConfig, ValidateConfig};
pub use directory::Directory;
pub use dispatcher::{Capability, Dispatcher, Selector, Target};
pub use error::{PlatformError, Result};
pub use federation::FederationManager;
pub use history::EventHistory;
pub use http::{HttpEndpoint, HttpEndpointFactory};
pub use lifecycle::{DeploymentState, LifecycleManager};
pub use platform::{authority_for, Platform, PlatformApi};
pub use ports::PortPool;
pub use recorded::Recorded;
pub use traits::{Actor, Authority, ContainerBackend, EndpointFactory, Permission, RemoteEndpoint};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
