//! # Directory
//!
//! Thread-safe registry of running containers, connected peer platforms,
//! access tokens and pending outbound connections.
//!
//! Every operation touches one key atomically. Listings return snapshots in
//! registration order; replacing an entry keeps its original position.

use std::sync::atomic::{AtomicU64, Ordering};

use amp_types::{AgentContainer, RuntimePlatform};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::{DashMap, DashSet};

#[derive(Debug, Clone)]
struct Slot<T> {
    seq: u64,
    value: T,
}

/// 容器与对等平台注册表
#[derive(Debug, Default)]
pub struct Directory {
    containers: DashMap<String, Slot<AgentContainer>>,
    peers: DashMap<String, Slot<RuntimePlatform>>,
    tokens: DashMap<String, String>,
    pending: DashSet<String>,
    seq: AtomicU64,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    // ---- containers ----

    /// Insert or replace a container, returning the previous entry.
    pub fn put_container(&self, container: AgentContainer) -> Option<AgentContainer> {
        match self.containers.entry(container.container_id.clone()) {
            MapEntry::Occupied(mut occupied) => {
                let previous = std::mem::replace(&mut occupied.get_mut().value, container);
                Some(previous)
            }
            MapEntry::Vacant(vacant) => {
                let seq = self.next_seq();
                vacant.insert(Slot {
                    seq,
                    value: container,
                });
                None
            }
        }
    }

    pub fn get_container(&self, container_id: &str) -> Option<AgentContainer> {
        self.containers.get(container_id).map(|slot| slot.value.clone())
    }

    pub fn contains_container(&self, container_id: &str) -> bool {
        self.containers.contains_key(container_id)
    }

    /// Apply `update` only if the container is still registered.
    pub fn update_container<F>(&self, container_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut AgentContainer),
    {
        match self.containers.get_mut(container_id) {
            Some(mut slot) => {
                update(&mut slot.value);
                true
            }
            None => false,
        }
    }

    pub fn remove_container(&self, container_id: &str) -> Option<AgentContainer> {
        self.containers
            .remove(container_id)
            .map(|(_, slot)| slot.value)
    }

    /// Snapshot of all containers in registration order
    pub fn list_containers(&self) -> Vec<AgentContainer> {
        snapshot(&self.containers)
    }

    // ---- peers ----

    /// Insert or replace a peer snapshot.
    pub fn put_peer(&self, url: &str, platform: RuntimePlatform) {
        match self.peers.entry(url.to_string()) {
            MapEntry::Occupied(mut occupied) => occupied.get_mut().value = platform,
            MapEntry::Vacant(vacant) => {
                let seq = self.next_seq();
                vacant.insert(Slot {
                    seq,
                    value: platform,
                });
            }
        }
    }

    /// Register a peer unless one is already registered under `url`.
    ///
    /// Of several concurrent callers for the same url exactly one gets `true`.
    pub fn register_peer_if_absent(&self, url: &str, platform: RuntimePlatform) -> bool {
        match self.peers.entry(url.to_string()) {
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(vacant) => {
                let seq = self.next_seq();
                vacant.insert(Slot {
                    seq,
                    value: platform,
                });
                true
            }
        }
    }

    /// Replace the snapshot of a peer that is still registered.
    pub fn update_peer(&self, url: &str, platform: RuntimePlatform) -> bool {
        match self.peers.get_mut(url) {
            Some(mut slot) => {
                slot.value = platform;
                true
            }
            None => false,
        }
    }

    pub fn get_peer(&self, url: &str) -> Option<RuntimePlatform> {
        self.peers.get(url).map(|slot| slot.value.clone())
    }

    pub fn contains_peer(&self, url: &str) -> bool {
        self.peers.contains_key(url)
    }

    pub fn remove_peer(&self, url: &str) -> Option<RuntimePlatform> {
        self.peers.remove(url).map(|(_, slot)| slot.value)
    }

    /// Snapshot of `(url, platform)` pairs in registration order
    pub fn list_peers(&self) -> Vec<(String, RuntimePlatform)> {
        let mut entries: Vec<(u64, String, RuntimePlatform)> = self
            .peers
            .iter()
            .map(|item| (item.seq, item.key().clone(), item.value.clone()))
            .collect();
        entries.sort_by_key(|(seq, _, _)| *seq);
        entries
            .into_iter()
            .map(|(_, url, platform)| (url, platform))
            .collect()
    }

    /// Peer URLs in registration order
    pub fn peer_urls(&self) -> Vec<String> {
        self.list_peers().into_iter().map(|(url, _)| url).collect()
    }

    // ---- pending connections ----

    /// Mark `url` as having an outbound handshake in flight.
    ///
    /// Returns `false` if it was already pending.
    pub fn mark_pending(&self, url: &str) -> bool {
        self.pending.insert(url.to_string())
    }

    pub fn clear_pending(&self, url: &str) {
        self.pending.remove(url);
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.contains(url)
    }

    // ---- tokens ----

    /// Store the token for a container id or peer url
    pub fn put_token(&self, key: &str, token: impl Into<String>) {
        self.tokens.insert(key.to_string(), token.into());
    }

    pub fn get_token(&self, key: &str) -> Option<String> {
        self.tokens.get(key).map(|token| token.value().clone())
    }

    pub fn remove_token(&self, key: &str) -> Option<String> {
        self.tokens.remove(key).map(|(_, token)| token)
    }
}

fn snapshot<T: Clone>(map: &DashMap<String, Slot<T>>) -> Vec<T> {
    let mut entries: Vec<(u64, T)> = map
        .iter()
        .map(|item| (item.seq, item.value.clone()))
        .collect();
    entries.sort_by_key(|(seq, _)| *seq);
    entries.into_iter().map(|(_, value)| value).collect()
}
