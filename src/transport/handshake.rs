//! HTTP exchanges with the coordinator.
//!
//! The bootstrap call trades a worker script URL for a socket endpoint.
//! Registration is an independent call for persistent workers.
//!
//! # Bootstrap
//!
//! ```text
//! POST {base}/jsworkers/v1/start   { "url": ".../worker.js" }
//!   200 { "ws_url": "wss://..." }  -> endpoint
//!   non-2xx / no ws_url            -> Error::Handshake
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use serde_json::Value as Json;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{
    REGISTER_PATH, RegisterRequest, RegisterResponse, START_PATH, StartRequest, StartResponse,
};

// ============================================================================
// HandshakeClient
// ============================================================================

/// Issues bootstrap and registration requests to one coordinator.
#[derive(Debug, Clone)]
pub struct HandshakeClient {
    /// Shared HTTP client.
    client: Client,
    /// Coordinator base endpoint.
    base: Url,
}

impl HandshakeClient {
    /// Creates a client for the coordinator at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base))
    }

    /// Creates a client reusing an existing HTTP client.
    #[inline]
    #[must_use]
    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Returns the coordinator base endpoint.
    #[inline]
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Exchanges a worker script URL for its socket endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::Handshake`] on a non-success status, a body that is not
    ///   JSON, or a missing/invalid `ws_url`
    /// - [`Error::Http`] if the request cannot be sent
    pub async fn bootstrap(&self, worker_url: &Url) -> Result<Url> {
        let endpoint = self.endpoint(START_PATH)?;
        debug!(%endpoint, worker = %worker_url, "Sending bootstrap request");

        let response = self
            .client
            .post(endpoint)
            .json(&StartRequest {
                url: worker_url.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), worker = %worker_url, "Bootstrap rejected");
            return Err(Error::handshake_status(status.as_u16()));
        }

        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| Error::handshake(format!("invalid bootstrap response: {e}")))?;

        let ws_url = body
            .ws_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::handshake("bootstrap response has no ws_url"))?;

        let ws_url = Url::parse(&ws_url)
            .map_err(|e| Error::handshake(format!("invalid ws_url {ws_url:?}: {e}")))?;

        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::handshake(format!(
                "ws_url has unsupported scheme {:?}",
                ws_url.scheme()
            )));
        }

        info!(worker = %worker_url, %ws_url, "Bootstrap completed");
        Ok(ws_url)
    }

    /// Registers a persistent worker with the coordinator.
    ///
    /// # Errors
    ///
    /// - [`Error::Registration`] on a non-success status, an unexpected
    ///   body, or `success: false`
    /// - [`Error::Http`] if the request cannot be sent
    pub async fn register(&self, worker_url: &Url, options: Json) -> Result<()> {
        let endpoint = self.endpoint(REGISTER_PATH)?;
        debug!(%endpoint, worker = %worker_url, "Sending registration request");

        let response = self
            .client
            .post(endpoint)
            .json(&RegisterRequest {
                url: worker_url.to_string(),
                options,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::registration(format!(
                "coordinator answered HTTP {}",
                status.as_u16()
            )));
        }

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| Error::registration(format!("invalid registration response: {e}")))?;

        if body.success {
            info!(worker = %worker_url, "Registration successful");
            Ok(())
        } else {
            let reason = body
                .error
                .unwrap_or_else(|| "registration refused".to_string());
            warn!(worker = %worker_url, error = %reason, "Registration failed");
            Err(Error::registration(reason))
        }
    }

    /// Joins an API path onto the base, keeping any base path prefix.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HandshakeClient {
        let base = Url::parse(&server.uri()).unwrap();
        HandshakeClient::new(base, Duration::from_secs(5)).unwrap()
    }

    fn worker_url() -> Url {
        Url::parse("https://app.example/worker.js").unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("https://box.example/prefix/").unwrap();
        let client = HandshakeClient::with_client(Client::new(), base);
        assert_eq!(
            client.endpoint(START_PATH).unwrap().as_str(),
            "https://box.example/prefix/jsworkers/v1/start"
        );
    }

    #[tokio::test]
    async fn test_bootstrap_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/start"))
            .and(body_json(json!({ "url": "https://app.example/worker.js" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ws_url": "wss://host/path" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let ws_url = client(&server).bootstrap(&worker_url()).await.unwrap();
        assert_eq!(ws_url.as_str(), "wss://host/path");
    }

    #[tokio::test]
    async fn test_bootstrap_http_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/start"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).bootstrap(&worker_url()).await.unwrap_err();
        assert!(matches!(err, Error::Handshake { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn test_bootstrap_missing_ws_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "other": 1 })))
            .mount(&server)
            .await;

        let err = client(&server).bootstrap(&worker_url()).await.unwrap_err();
        assert!(matches!(err, Error::Handshake { status: None, .. }));
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_non_socket_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/start"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ws_url": "https://host/" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).bootstrap(&worker_url()).await.unwrap_err();
        assert!(matches!(err, Error::Handshake { .. }));
    }

    #[tokio::test]
    async fn test_register_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/register"))
            .and(body_json(json!({
                "url": "https://app.example/worker.js",
                "options": { "scope": "/" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .register(&worker_url(), json!({ "scope": "/" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_refused_carries_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/register"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "error": "quota exceeded" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .register(&worker_url(), Json::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Registration { ref message } if message == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_register_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/register"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .register(&worker_url(), Json::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Registration { .. }));
    }
}
