//! # Federation Manager
//!
//! Connect / disconnect / notify handshake between platforms.
//!
//! ## Loop prevention
//!
//! An uncredentialed connect marks the target URL pending, then asks the
//! target to connect back. If the target's callback arrives while the URL is
//! still pending, it is answered with `true` without further network calls,
//! so two platforms connecting to each other at the same time both end up
//! with exactly one registration.

use std::sync::Arc;

use amp_types::{Login, LoginConnection, RuntimePlatform};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::address::{normalize_url, parse_platform_url};
use crate::directory::Directory;
use crate::error::{PlatformError, Result};
use crate::traits::{EndpointFactoryRef, RemoteEndpointRef};

/// Clears a pending mark on every exit path, including cancellation.
struct PendingGuard<'a> {
    directory: &'a Directory,
    url: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.directory.clear_pending(self.url);
        debug!("Cleared pending connection to {}", self.url);
    }
}

/// 联邦管理器
pub struct FederationManager {
    own_url: String,
    directory: Arc<Directory>,
    endpoints: EndpointFactoryRef,
}

impl FederationManager {
    pub fn new(own_url: impl Into<String>, directory: Arc<Directory>, endpoints: EndpointFactoryRef) -> Self {
        Self {
            own_url: normalize_url(&own_url.into()),
            directory,
            endpoints,
        }
    }

    /// Base URL of this platform
    pub fn own_url(&self) -> &str {
        &self.own_url
    }

    fn peer_endpoint(&self, url: &str) -> RemoteEndpointRef {
        let token = self.directory.get_token(url);
        self.endpoints.endpoint(url, token.as_deref())
    }

    /// Connect to another platform.
    ///
    /// Returns `false` for this platform itself or an already connected peer,
    /// `true` for a callback from a peer this platform is connecting to.
    pub async fn connect(&self, connection: &LoginConnection) -> Result<bool> {
        let url = parse_platform_url(&connection.url)?;

        if url == self.own_url {
            debug!("Ignoring connect to own url {}", url);
            return Ok(false);
        }
        if self.directory.contains_peer(&url) {
            debug!("Platform {} already connected", url);
            return Ok(false);
        }
        if self.directory.is_pending(&url) {
            info!("Accepting callback from pending platform {}", url);
            return Ok(true);
        }

        match connection.login() {
            Some(login) => self.connect_with_credentials(&url, &login).await,
            None => self.connect_mutual(&url).await,
        }
    }

    /// One-way connection: log in, keep the token, register. No callback.
    async fn connect_with_credentials(&self, url: &str, login: &Login) -> Result<bool> {
        let token = self.endpoints.endpoint(url, None).login(login).await?;
        let info = self.endpoints.endpoint(url, Some(&token)).platform_info().await?;

        if self.directory.register_peer_if_absent(url, info) {
            self.directory.put_token(url, token);
            info!("Connected to platform {} as {}", url, login.username);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Two-way connection: ask the peer to connect back, register on success.
    ///
    /// A declined reciprocal call is not always a failure: when the peer's
    /// fresh info already lists this platform (it registered us in a
    /// concurrent handshake) the peer is registered as well. Without that
    /// listing nothing is registered and `false` is returned.
    async fn connect_mutual(&self, url: &str) -> Result<bool> {
        if !self.directory.mark_pending(url) {
            // another connect to the same url won the race
            return Ok(true);
        }
        let _pending = PendingGuard {
            directory: &self.directory,
            url,
        };

        let endpoint = self.endpoints.endpoint(url, None);
        let info = endpoint.platform_info().await?;
        if normalize_url(&info.base_url) != url {
            warn!("Platform {} reports base url {}", url, info.base_url);
        }

        let accepted = endpoint
            .connect(&LoginConnection::new(self.own_url.clone()))
            .await?;

        let info = if accepted {
            info
        } else {
            // the peer may already hold us from an earlier handshake
            match endpoint.platform_info().await {
                Ok(latest) if latest.connections.iter().any(|c| normalize_url(c) == self.own_url) => latest,
                Ok(_) => {
                    info!("Platform {} declined to connect back", url);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        };

        let registered = self.directory.register_peer_if_absent(url, info);
        if registered {
            info!("Connected to platform {}", url);
        }
        Ok(registered)
    }

    /// Drop a connection. Returns `false` for an unknown peer.
    pub async fn disconnect(&self, url: &str) -> Result<bool> {
        let url = parse_platform_url(url)?;
        if self.directory.remove_peer(&url).is_none() {
            debug!("Platform {} was not connected", url);
            return Ok(false);
        }

        if self.directory.remove_token(&url).is_some() {
            info!("Disconnected from platform {} (one-way)", url);
            return Ok(true);
        }

        let endpoint = self.endpoints.endpoint(&url, None);
        match endpoint.disconnect(&self.own_url).await {
            Ok(_) => info!("Disconnected from platform {}", url),
            Err(e) => warn!("Platform {} did not acknowledge disconnect: {}", url, e),
        }
        Ok(true)
    }

    /// Refresh a peer's snapshot. An unreachable peer is removed and `false` returned.
    pub async fn notify_update_platform(&self, url: &str) -> Result<bool> {
        let url = parse_platform_url(url)?;
        if url == self.own_url {
            warn!("Cannot request update for self");
            return Ok(false);
        }
        if !self.directory.contains_peer(&url) {
            return Err(PlatformError::not_found(format!("Platform was not connected: {}", url)));
        }

        match self.peer_endpoint(&url).platform_info().await {
            Ok(info) => Ok(self.directory.update_peer(&url, info)),
            Err(e) => {
                warn!("Platform {} did not respond: {}; removing", url, e);
                self.directory.remove_peer(&url);
                self.directory.remove_token(&url);
                Ok(false)
            }
        }
    }

    /// Tell every connected peer that this platform changed. Best effort.
    pub async fn notify_connected_platforms(&self) {
        let notifications = self.directory.peer_urls().into_iter().map(|url| async move {
            match self.peer_endpoint(&url).notify_update_platform(&self.own_url).await {
                Ok(true) => debug!("Notified platform {}", url),
                Ok(false) => debug!("Platform {} ignored update notification", url),
                Err(e) => warn!("Failed to notify platform {}: {}", url, e),
            }
        });
        join_all(notifications).await;
    }

    /// Same as [`notify_connected_platforms`](Self::notify_connected_platforms)
    /// without waiting for the result.
    pub fn spawn_notify(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.notify_connected_platforms().await;
        });
    }

    /// Connected peer URLs in registration order
    pub fn connections(&self) -> Vec<String> {
        self.directory.peer_urls()
    }

    /// Cached snapshot of a peer
    pub fn peer(&self, url: &str) -> Option<RuntimePlatform> {
        self.directory.get_peer(&normalize_url(url))
    }
}
