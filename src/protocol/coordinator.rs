//! Coordinator HTTP message bodies.
//!
//! | Endpoint | Request | Response |
//! |----------|---------|----------|
//! | `POST {base}/jsworkers/v1/start` | [`StartRequest`] | [`StartResponse`] |
//! | `POST {base}/jsworkers/v1/register` | [`RegisterRequest`] | [`RegisterResponse`] |
//! | `GET {ping}` | - | `[`[`PingEntry`]`]` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

// ============================================================================
// Constants
// ============================================================================

/// Path of the bootstrap endpoint, relative to the coordinator base.
pub const START_PATH: &str = "jsworkers/v1/start";

/// Path of the registration endpoint, relative to the coordinator base.
pub const REGISTER_PATH: &str = "jsworkers/v1/register";

// ============================================================================
// Bootstrap
// ============================================================================

/// Body of the bootstrap request.
///
/// ```json
/// { "url": "https://app.example/worker.js" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartRequest {
    /// Absolute worker script URL.
    pub url: String,
}

/// Body of a successful bootstrap response.
///
/// ```json
/// { "ws_url": "wss://box.example/ws/1234" }
/// ```
///
/// A missing or empty `ws_url` is a handshake failure.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StartResponse {
    /// Socket endpoint for this worker.
    #[serde(default)]
    pub ws_url: Option<String>,
}

// ============================================================================
// Registration
// ============================================================================

/// Body of the persistent registration request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegisterRequest {
    /// Absolute worker script URL.
    pub url: String,
    /// Registration options, passed through untouched.
    pub options: Json,
}

/// Body of the registration response.
///
/// ```json
/// { "success": false, "error": "quota exceeded" }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    /// Whether registration succeeded.
    #[serde(default)]
    pub success: bool,
    /// Failure reason, if any.
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

/// One entry of the ping service's answer.
///
/// `message` is itself a JSON document, see [`PingMessage`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PingEntry {
    /// Embedded JSON describing the coordinator.
    pub message: String,
}

/// Coordinator origins announced through the ping service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct PingMessage {
    /// Origin reachable through the public tunnel.
    #[serde(default)]
    pub tunnel_origin: Option<String>,
    /// Origin reachable on the local network.
    #[serde(default)]
    pub local_origin: Option<String>,
}

impl PingMessage {
    /// Returns the preferred origin: tunnel first, then local.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        non_empty(&self.tunnel_origin).or_else(|| non_empty(&self.local_origin))
    }
}

fn non_empty(origin: &Option<String>) -> Option<&str> {
    origin.as_deref().filter(|o| !o.is_empty())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{from_str, json, to_value};

    #[test]
    fn test_start_request_format() {
        let req = StartRequest {
            url: "https://app.example/w.js".into(),
        };
        assert_eq!(
            to_value(&req).unwrap(),
            json!({ "url": "https://app.example/w.js" })
        );
    }

    #[test]
    fn test_start_response_parse() {
        let resp: StartResponse = from_str(r#"{"ws_url":"wss://host/path"}"#).unwrap();
        assert_eq!(resp.ws_url.as_deref(), Some("wss://host/path"));

        let resp: StartResponse = from_str("{}").unwrap();
        assert_eq!(resp.ws_url, None);
    }

    #[test]
    fn test_register_request_format() {
        let req = RegisterRequest {
            url: "https://app.example/sw.js".into(),
            options: json!({ "scope": "/" }),
        };
        assert_eq!(
            to_value(&req).unwrap(),
            json!({ "url": "https://app.example/sw.js", "options": { "scope": "/" } })
        );
    }

    #[test]
    fn test_register_response_parse() {
        let resp: RegisterResponse = from_str(r#"{"success":true}"#).unwrap();
        assert!(resp.success);

        let resp: RegisterResponse = from_str(r#"{"error":"nope"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_ping_message_prefers_tunnel() {
        let msg: PingMessage = from_str(
            r#"{"tunnel_origin":"https://t.example","local_origin":"http://192.168.0.2:3000"}"#,
        )
        .unwrap();
        assert_eq!(msg.origin(), Some("https://t.example"));

        let msg: PingMessage = from_str(r#"{"local_origin":"http://192.168.0.2:3000"}"#).unwrap();
        assert_eq!(msg.origin(), Some("http://192.168.0.2:3000"));

        assert_eq!(PingMessage::default().origin(), None);
    }
}
