//! Shared access to one coordinator.
//!
//! Every remote worker of a host goes through the same [`Coordinator`]:
//! discovery runs once, its result is cached, and all handshakes reuse one
//! HTTP client.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::OnceCell;
use url::Url;

use crate::discovery::Discovery;
use crate::error::Result;

use super::handshake::HandshakeClient;

// ============================================================================
// Coordinator
// ============================================================================

/// Discovery plus HTTP settings for one coordinator.
///
/// Cheap to clone; clones share the cached base endpoint.
#[derive(Clone)]
pub struct Coordinator {
    /// Resolves the base endpoint.
    discovery: Arc<dyn Discovery>,
    /// Cached discovery result.
    base: Arc<OnceCell<Url>>,
    /// Shared HTTP client.
    client: Client,
    /// Limit for opening the socket.
    connect_timeout: Duration,
}

impl Coordinator {
    /// Creates a coordinator handle.
    #[must_use]
    pub fn new(discovery: Arc<dyn Discovery>, client: Client, connect_timeout: Duration) -> Self {
        Self {
            discovery,
            base: Arc::new(OnceCell::new()),
            client,
            connect_timeout,
        }
    }

    /// Resolves the base endpoint, running discovery on first use.
    ///
    /// A failed discovery is not cached; the next call retries it.
    ///
    /// # Errors
    ///
    /// Whatever the discovery returns, typically [`Error::Discovery`](crate::Error::Discovery).
    pub async fn base(&self) -> Result<Url> {
        self.base
            .get_or_try_init(|| self.discovery.resolve())
            .await
            .cloned()
    }

    /// Returns a handshake client bound to the resolved base endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::base`].
    pub async fn handshake_client(&self) -> Result<HandshakeClient> {
        let base = self.base().await?;
        Ok(HandshakeClient::with_client(self.client.clone(), base))
    }

    /// Returns the socket connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("base", &self.base.get())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
