//! Mock container backend.

use std::collections::HashMap;
use std::sync::Mutex;

use amp_types::{Connectivity, PostAgentContainer, DEFAULT_API_PORT};
use async_trait::async_trait;

use super::{MockCallTracker, MockFailure};
use crate::error::{PlatformError, Result};
use crate::ports::PortPool;
use crate::traits::ContainerBackend;

/// Mock 容器后端
///
/// Allocates ports from a [`PortPool`] and releases them on stop. Container
/// URLs are `http://<container-id>:8082`.
#[derive(Debug, Default)]
pub struct MockBackend {
    tracker: MockCallTracker,
    ports: PortPool,
    running: Mutex<HashMap<String, Connectivity>>,
    start_failure: Mutex<Option<MockFailure>>,
    stop_failure: Mutex<Option<MockFailure>>,
    connectivity_failure: Mutex<Option<MockFailure>>,
    dead: Mutex<bool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_start(&self, err: PlatformError) {
        *self.start_failure.lock().unwrap() = Some(err.into());
    }

    pub fn fail_stop(&self, err: PlatformError) {
        *self.stop_failure.lock().unwrap() = Some(err.into());
    }

    pub fn fail_connectivity(&self, err: PlatformError) {
        *self.connectivity_failure.lock().unwrap() = Some(err.into());
    }

    /// Report every container as dead from now on
    pub fn kill_all(&self) {
        *self.dead.lock().unwrap() = true;
    }

    pub fn tracker(&self) -> &MockCallTracker {
        &self.tracker
    }

    pub fn ports(&self) -> &PortPool {
        &self.ports
    }

    pub fn is_running(&self, container_id: &str) -> bool {
        self.running.lock().unwrap().contains_key(container_id)
    }

    pub fn connectivity(&self, container_id: &str) -> Option<Connectivity> {
        self.running.lock().unwrap().get(container_id).cloned()
    }
}

#[async_trait]
impl ContainerBackend for MockBackend {
    async fn test_connectivity(&self) -> Result<()> {
        self.tracker.record("test_connectivity", vec![]);
        match self.connectivity_failure.lock().unwrap().as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn start_container(
        &self,
        container_id: &str,
        token: Option<&str>,
        owner: Option<&str>,
        request: &PostAgentContainer,
    ) -> Result<Connectivity> {
        self.tracker.record(
            "start_container",
            vec![
                container_id.to_string(),
                token.unwrap_or("-").to_string(),
                owner.unwrap_or("-").to_string(),
                request.image.image_name.clone(),
            ],
        );
        if let Some(failure) = self.start_failure.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }

        let image = &request.image;
        let api_port = self.ports.reserve(image.api_port)?;
        let extra: Vec<u16> = image.extra_ports.keys().copied().collect();
        let extra_mapped = match self.ports.reserve_all(&extra) {
            Ok(ports) => ports,
            Err(e) => {
                self.ports.release(api_port);
                return Err(e);
            }
        };

        let connectivity = Connectivity {
            public_url: "http://localhost".to_string(),
            api_port_mapping: api_port,
            extra_port_mappings: extra_mapped
                .into_iter()
                .zip(image.extra_ports.values().cloned())
                .collect(),
        };
        self.running
            .lock()
            .unwrap()
            .insert(container_id.to_string(), connectivity.clone());
        Ok(connectivity)
    }

    async fn stop_container(&self, container_id: &str) -> Result<()> {
        self.tracker
            .record("stop_container", vec![container_id.to_string()]);
        if let Some(failure) = self.stop_failure.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }
        let removed = self.running.lock().unwrap().remove(container_id);
        match removed {
            Some(connectivity) => {
                self.ports.release_all(&connectivity.ports());
                Ok(())
            }
            None => Err(PlatformError::not_found(format!(
                "Container {} is not running",
                container_id
            ))),
        }
    }

    async fn is_container_alive(&self, container_id: &str) -> Result<bool> {
        Ok(!*self.dead.lock().unwrap() && self.running.lock().unwrap().contains_key(container_id))
    }

    fn url(&self, container_id: &str) -> Result<String> {
        Ok(format!("http://{}:{}", container_id, DEFAULT_API_PORT))
    }
}
