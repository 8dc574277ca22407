//! Coordinator discovery.
//!
//! Resolves the coordinator base endpoint before any worker can bootstrap.
//! [`StaticDiscovery`] uses a configured endpoint; [`PingDiscovery`] asks a
//! ping service which origins the coordinator announced.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{PingEntry, PingMessage};

// ============================================================================
// Discovery
// ============================================================================

/// Resolves the coordinator base endpoint.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Returns the base endpoint, e.g. `http://localhost:3000`.
    async fn resolve(&self) -> Result<Url>;
}

// ============================================================================
// StaticDiscovery
// ============================================================================

/// A fixed, pre-configured endpoint.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    base: Url,
}

impl StaticDiscovery {
    /// Creates a discovery that always yields `base`.
    #[inline]
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn resolve(&self) -> Result<Url> {
        Ok(self.base.clone())
    }
}

// ============================================================================
// PingDiscovery
// ============================================================================

/// Discovers the coordinator through a ping service.
///
/// # Format
///
/// ```json
/// [{ "message": "{\"tunnel_origin\":\"https://...\",\"local_origin\":\"http://...\"}" }]
/// ```
///
/// Only the first entry is considered; the tunnel origin wins over the
/// local one.
#[derive(Debug, Clone)]
pub struct PingDiscovery {
    client: Client,
    ping_url: Url,
}

impl PingDiscovery {
    /// Creates a discovery querying `ping_url`.
    #[inline]
    #[must_use]
    pub fn new(client: Client, ping_url: Url) -> Self {
        Self { client, ping_url }
    }
}

#[async_trait]
impl Discovery for PingDiscovery {
    async fn resolve(&self) -> Result<Url> {
        debug!(ping_url = %self.ping_url, "Discovering coordinator");

        let response = self.client.get(self.ping_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::discovery(format!(
                "ping answered HTTP {}",
                status.as_u16()
            )));
        }

        let entries: Vec<PingEntry> = response
            .json()
            .await
            .map_err(|e| Error::discovery(format!("invalid ping response: {e}")))?;

        let entry = entries
            .first()
            .ok_or_else(|| Error::discovery("no coordinator announced"))?;

        let message: PingMessage = serde_json::from_str(&entry.message)
            .map_err(|e| Error::discovery(format!("invalid ping message: {e}")))?;

        let origin = message
            .origin()
            .ok_or_else(|| Error::discovery("ping message has no origin"))?;

        let base = Url::parse(origin)
            .map_err(|e| Error::discovery(format!("invalid origin {origin:?}: {e}")))?;

        info!(%base, "Coordinator discovered");
        Ok(base)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn ping_server(response: ResponseTemplate) -> (MockServer, PingDiscovery) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(response)
            .mount(&server)
            .await;

        let ping_url = Url::parse(&format!("{}/ping", server.uri())).unwrap();
        let discovery = PingDiscovery::new(Client::new(), ping_url);
        (server, discovery)
    }

    #[tokio::test]
    async fn test_static_discovery() {
        let base = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(StaticDiscovery::new(base.clone()).resolve().await.unwrap(), base);
    }

    #[tokio::test]
    async fn test_ping_prefers_tunnel_origin() {
        let body = json!([{
            "message": r#"{"tunnel_origin":"https://tunnel.example","local_origin":"http://10.0.0.2:3000"}"#
        }]);
        let (_server, discovery) = ping_server(ResponseTemplate::new(200).set_body_json(body)).await;

        let base = discovery.resolve().await.unwrap();
        assert_eq!(base.as_str(), "https://tunnel.example/");
    }

    #[tokio::test]
    async fn test_ping_falls_back_to_local_origin() {
        let body = json!([{ "message": r#"{"local_origin":"http://10.0.0.2:3000"}"# }]);
        let (_server, discovery) = ping_server(ResponseTemplate::new(200).set_body_json(body)).await;

        let base = discovery.resolve().await.unwrap();
        assert_eq!(base.as_str(), "http://10.0.0.2:3000/");
    }

    #[tokio::test]
    async fn test_ping_empty_list() {
        let (_server, discovery) =
            ping_server(ResponseTemplate::new(200).set_body_json(json!([]))).await;
        assert!(matches!(discovery.resolve().await, Err(Error::Discovery { .. })));
    }

    #[tokio::test]
    async fn test_ping_message_not_json() {
        let body = json!([{ "message": "not json" }]);
        let (_server, discovery) = ping_server(ResponseTemplate::new(200).set_body_json(body)).await;
        assert!(matches!(discovery.resolve().await, Err(Error::Discovery { .. })));
    }

    #[tokio::test]
    async fn test_ping_http_error() {
        let (_server, discovery) = ping_server(ResponseTemplate::new(503)).await;
        assert!(matches!(discovery.resolve().await, Err(Error::Discovery { .. })));
    }
}
