//! # 协作方抽象接口 (Traits)
//!
//! 调度与联邦引擎所依赖的外部协作方接口，通过 `Arc<dyn Trait>` 注入。
//!
//! ## 接口列表
//!
//! | Trait | 用途 | 核心方法 |
//! |-------|------|----------|
//! | [`RemoteEndpoint`] | 访问容器或对等平台 | `platform_info`, `send`, `invoke`, `connect` |
//! | [`EndpointFactory`] | 按 URL 与令牌创建端点 | `endpoint` |
//! | [`ContainerBackend`] | 容器启动与停止 | `start_container`, `stop_container`, `is_container_alive` |
//! | [`Authority`] | 权限判定与令牌签发 | `authorize`, `issue_token` |

pub mod auth;
pub mod backend;
pub mod endpoint;

pub use auth::{Actor, Authority, AuthorityRef, Permission};
pub use backend::{ContainerBackend, ContainerBackendRef};
pub use endpoint::{ByteStream, EndpointFactory, EndpointFactoryRef, RemoteEndpoint, RemoteEndpointRef};
