//! # 测试支持
//!
//! Mock 协作方，供单元测试与下游测试 crate (`test-utils` feature) 使用。
//!
//! - `mocks::MockEndpoint` / `mocks::MockEndpointFactory`: 远程端点
//! - `mocks::MockBackend`: 容器后端

pub mod mocks;
