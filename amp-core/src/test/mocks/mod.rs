//! # Mock Implementations
//!
//! 可验证的 Mock 实现，用于单元测试中的依赖隔离。
//!
//! | Mock | 用途 | 关键能力 |
//! |------|------|----------|
//! | `MockEndpoint` | 容器/平台端点 | 预设返回值、按方法注入错误 |
//! | `MockEndpointFactory` | 端点工厂 | 按 URL 注册端点、统一调用追踪 |
//! | `MockBackend` | 容器后端 | 端口分配、启动失败、存活状态 |

pub mod backend;
pub mod endpoint;

pub use backend::MockBackend;
pub use endpoint::{MockEndpoint, MockEndpointFactory};

use std::sync::{Arc, Mutex};

use crate::error::PlatformError;

/// 调用记录
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// 方法名
    pub method: String,
    /// 参数列表（序列化后）
    pub args: Vec<String>,
}

impl CallRecord {
    pub fn new(method: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Mock 调用追踪器
#[derive(Debug, Default, Clone)]
pub struct MockCallTracker {
    calls: Arc<Mutex<Vec<CallRecord>>>,
}

impl MockCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录调用
    pub fn record(&self, method: impl Into<String>, args: Vec<String>) {
        self.calls.lock().unwrap().push(CallRecord::new(method, args));
    }

    /// 获取所有调用记录
    pub fn get_calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    /// 获取指定方法的调用记录
    pub fn get_calls_for(&self, method: &str) -> Vec<CallRecord> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.get_calls_for(method).len()
    }

    /// 断言：方法被调用指定次数
    pub fn assert_call_count(&self, method: &str, expected: usize) {
        let actual = self.call_count(method);
        assert_eq!(
            actual, expected,
            "Expected method '{}' to be called {} times, but was called {} times",
            method, expected, actual
        );
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// Cloneable stand-in for a [`PlatformError`] a mock should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    NotFound(String),
    Unreachable(String),
    Malformed(String),
    Unauthorized(String),
    Forbidden(String),
    InvalidInput(String),
    Other(String),
}

impl From<PlatformError> for MockFailure {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(m) => MockFailure::NotFound(m),
            PlatformError::Unreachable(m) => MockFailure::Unreachable(m),
            PlatformError::MalformedResponse(m) => MockFailure::Malformed(m),
            PlatformError::Unauthorized(m) => MockFailure::Unauthorized(m),
            PlatformError::Forbidden(m) => MockFailure::Forbidden(m),
            PlatformError::InvalidInput(m) => MockFailure::InvalidInput(m),
            other => MockFailure::Other(other.to_string()),
        }
    }
}

impl MockFailure {
    pub fn to_error(&self) -> PlatformError {
        match self {
            MockFailure::NotFound(m) => PlatformError::not_found(m.clone()),
            MockFailure::Unreachable(m) => PlatformError::unreachable(m.clone()),
            MockFailure::Malformed(m) => PlatformError::malformed(m.clone()),
            MockFailure::Unauthorized(m) => PlatformError::unauthorized(m.clone()),
            MockFailure::Forbidden(m) => PlatformError::forbidden(m.clone()),
            MockFailure::InvalidInput(m) => PlatformError::invalid_input(m.clone()),
            MockFailure::Other(m) => PlatformError::other(m.clone()),
        }
    }
}
