//! # Port Pool
//!
//! Host port bookkeeping for container backends. A port is reserved before a
//! container starts and handed back only once the backend confirmed the stop.

use std::collections::BTreeSet;
use std::net::TcpListener;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{PlatformError, Result};

/// 端口池
#[derive(Debug, Default)]
pub struct PortPool {
    used: Mutex<BTreeSet<u16>>,
    probe_host: bool,
}

impl PortPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also skip ports that are bound on this host.
    pub fn probing_host() -> Self {
        Self {
            used: Mutex::new(BTreeSet::new()),
            probe_host: true,
        }
    }

    /// Reserve the first free port at or above `preferred`.
    pub fn reserve(&self, preferred: u16) -> Result<u16> {
        let mut used = self.used.lock();
        let mut port = preferred;
        loop {
            if !used.contains(&port) && (!self.probe_host || host_port_free(port)) {
                used.insert(port);
                debug!("Reserved port {}", port);
                return Ok(port);
            }
            port = port.checked_add(1).ok_or_else(|| {
                PlatformError::unreachable(format!("no free port at or above {}", preferred))
            })?;
        }
    }

    /// Reserve one port per entry in `preferred`, all or nothing.
    pub fn reserve_all(&self, preferred: &[u16]) -> Result<Vec<u16>> {
        let mut reserved = Vec::with_capacity(preferred.len());
        for port in preferred {
            match self.reserve(*port) {
                Ok(p) => reserved.push(p),
                Err(e) => {
                    self.release_all(&reserved);
                    return Err(e);
                }
            }
        }
        Ok(reserved)
    }

    pub fn release(&self, port: u16) {
        if self.used.lock().remove(&port) {
            debug!("Released port {}", port);
        }
    }

    pub fn release_all(&self, ports: &[u16]) {
        let mut used = self.used.lock();
        for port in ports {
            used.remove(port);
        }
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.used.lock().contains(&port)
    }

    pub fn reserved(&self) -> Vec<u16> {
        self.used.lock().iter().copied().collect()
    }
}

fn host_port_free(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_skips_used_ports() {
        let pool = PortPool::new();
        assert_eq!(pool.reserve(8082).unwrap(), 8082);
        assert_eq!(pool.reserve(8082).unwrap(), 8083);
        assert_eq!(pool.reserve(8083).unwrap(), 8084);
        pool.release(8082);
        assert_eq!(pool.reserve(8082).unwrap(), 8082);
    }

    #[test]
    fn test_reserve_all_is_disjoint() {
        let pool = PortPool::new();
        let first = pool.reserve_all(&[8082, 8888]).unwrap();
        let second = pool.reserve_all(&[8082, 8888]).unwrap();
        assert_eq!(first, vec![8082, 8888]);
        assert!(first.iter().all(|p| !second.contains(p)));
    }

    #[test]
    fn test_exhausted_range_rolls_back() {
        let pool = PortPool::new();
        pool.reserve(u16::MAX).unwrap();
        assert!(pool.reserve_all(&[8082, u16::MAX]).is_err());
        assert!(!pool.is_reserved(8082));
        assert_eq!(pool.reserved(), vec![u16::MAX]);
    }

    #[test]
    fn test_probing_skips_bound_port() {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let bound = listener.local_addr().unwrap().port();
        let pool = PortPool::probing_host();
        let port = pool.reserve(bound).unwrap();
        assert_ne!(port, bound);
    }
}
