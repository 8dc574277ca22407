//! Error types for remote workers.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```no_run
//! use remote_workers::{Result, Value, Worker};
//!
//! async fn example(worker: &Worker) -> Result<()> {
//!     worker.send(&Value::from("hello")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::ScriptNotFound`] |
//! | Coordinator | [`Error::Discovery`], [`Error::Handshake`], [`Error::Registration`] |
//! | Connection | [`Error::Transport`], [`Error::Timeout`] |
//! | Protocol | [`Error::ProtocolState`], [`Error::Codec`] |
//! | Lifecycle | [`Error::WorkerFailed`], [`Error::Terminated`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::codec::Tag;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// CodecError
// ============================================================================

/// Failure while encoding or decoding a [`Value`](crate::codec::Value).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value cannot be expressed in the binary format.
    #[error("Unsupported value: {message}")]
    Unsupported {
        /// What could not be encoded.
        message: String,
    },

    /// A read or write would run past the end of the buffer.
    #[error("Truncated buffer at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Offset where the access started.
        offset: usize,
        /// Bytes the access required.
        needed: usize,
        /// Bytes actually available.
        remaining: usize,
    },

    /// The tag byte does not identify a known kind.
    #[error("Unknown tag 0x{tag:02x} at offset {offset}")]
    UnknownTag {
        /// The offending byte.
        tag: u8,
        /// Offset of the tag byte.
        offset: usize,
    },

    /// The body is structurally invalid for its tag.
    #[error("Malformed {tag:?} at offset {offset}: {message}")]
    Malformed {
        /// Tag of the value being read.
        tag: Tag,
        /// Offset of the body.
        offset: usize,
        /// What was wrong.
        message: String,
    },
}

impl CodecError {
    /// Creates an unsupported value error.
    #[inline]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates a truncation error.
    #[inline]
    pub fn truncated(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::Truncated {
            offset,
            needed,
            remaining,
        }
    }

    /// Creates a malformed body error.
    #[inline]
    pub fn malformed(tag: Tag, offset: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            tag,
            offset,
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when host options are invalid or an operation is not
    /// available in the configured mode.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No in-process script is registered for a worker URL.
    #[error("No local script registered for {url}")]
    ScriptNotFound {
        /// The requested worker URL.
        url: String,
    },

    // ========================================================================
    // Coordinator Errors
    // ========================================================================
    /// Coordinator discovery failed.
    #[error("Discovery failed: {message}")]
    Discovery {
        /// Description of the discovery failure.
        message: String,
    },

    /// Bootstrap request failed or returned an unexpected shape.
    #[error("Handshake failed: {message}")]
    Handshake {
        /// HTTP status, when the coordinator answered.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// Persistent registration was refused.
    #[error("Registration failed: {message}")]
    Registration {
        /// Reason reported by the coordinator.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Socket error or unexpected closure.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Frame out of pairing order, or a state precondition did not hold.
    #[error("Protocol state error: {message}")]
    ProtocolState {
        /// Description of the violation.
        message: String,
    },

    /// Value encoding or decoding failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The worker reached the terminal failed state.
    #[error("Worker {worker} has failed")]
    WorkerFailed {
        /// Worker URL, for diagnostics.
        worker: String,
    },

    /// The worker was terminated by its owner.
    #[error("Worker {worker} was terminated")]
    Terminated {
        /// Worker URL, for diagnostics.
        worker: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a script not found error.
    #[inline]
    pub fn script_not_found(url: impl Into<String>) -> Self {
        Self::ScriptNotFound { url: url.into() }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Creates a handshake error without an HTTP status.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a handshake error for a non-success HTTP status.
    #[inline]
    pub fn handshake_status(status: u16) -> Self {
        Self::Handshake {
            status: Some(status),
            message: format!("coordinator answered HTTP {status}"),
        }
    }

    /// Creates a registration error.
    #[inline]
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a protocol state error.
    #[inline]
    pub fn protocol_state(message: impl Into<String>) -> Self {
        Self::ProtocolState {
            message: message.into(),
        }
    }

    /// Creates a worker failed error.
    #[inline]
    pub fn worker_failed(worker: impl Into<String>) -> Self {
        Self::WorkerFailed {
            worker: worker.into(),
        }
    }

    /// Creates a terminated error.
    #[inline]
    pub fn terminated(worker: impl Into<String>) -> Self {
        Self::Terminated {
            worker: worker.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a codec error.
    #[inline]
    #[must_use]
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Self::Codec(_))
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the worker can no longer be used.
    ///
    /// Callers needing resilience must create a new worker.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WorkerFailed { .. } | Self::Terminated { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
