//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use amp_core::{ContainerBackend, PlatformConfig, PlatformError, PortPool, Result};
use amp_types::{Connectivity, PostAgentContainer};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Install a test log writer once; honours RUST_LOG.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(public_url: &str) -> PlatformConfig {
    PlatformConfig {
        public_url: Some(public_url.to_string()),
        poll_interval_ms: 20,
        container_timeout_secs: 5,
        ..PlatformConfig::default()
    }
}

/// Container backend that only does port bookkeeping and maps container ids
/// to URLs through a caller supplied function.
pub struct FakeBackend {
    ports: PortPool,
    running: Mutex<HashMap<String, Connectivity>>,
    stops: Mutex<Vec<String>>,
    url_for: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl FakeBackend {
    pub fn new(url_for: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            ports: PortPool::new(),
            running: Mutex::new(HashMap::new()),
            stops: Mutex::new(Vec::new()),
            url_for: Box::new(url_for),
        }
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.lock().clone()
    }

    pub fn running(&self) -> usize {
        self.running.lock().len()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ContainerBackend for FakeBackend {
    async fn test_connectivity(&self) -> Result<()> {
        Ok(())
    }

    async fn start_container(
        &self,
        container_id: &str,
        _token: Option<&str>,
        _owner: Option<&str>,
        request: &PostAgentContainer,
    ) -> Result<Connectivity> {
        let api_port = self.ports.reserve(request.image.api_port)?;
        let connectivity = Connectivity {
            public_url: "http://localhost".to_string(),
            api_port_mapping: api_port,
            extra_port_mappings: Default::default(),
        };
        self.running
            .lock()
            .insert(container_id.to_string(), connectivity.clone());
        Ok(connectivity)
    }

    async fn stop_container(&self, container_id: &str) -> Result<()> {
        self.stops.lock().push(container_id.to_string());
        match self.running.lock().remove(container_id) {
            Some(connectivity) => {
                self.ports.release_all(&connectivity.ports());
                Ok(())
            }
            None => Err(PlatformError::not_found(container_id.to_string())),
        }
    }

    async fn is_container_alive(&self, container_id: &str) -> Result<bool> {
        Ok(self.running.lock().contains_key(container_id))
    }

    fn url(&self, container_id: &str) -> Result<String> {
        Ok((self.url_for)(container_id))
    }
}
