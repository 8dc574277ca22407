//! Coordinator transport layer.
//!
//! This module handles communication between a worker handle (Rust) and
//! the worker process hosted behind a coordinator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    HTTP  /jsworkers/v1/start   ┌─────────────────┐
//! │  WorkerProxy    │───────────────────────────────►│  Coordinator    │
//! │                 │◄──────── { ws_url } ───────────│                 │
//! │  FrameTransport │                                │                 │
//! │  (event loop)   │◄═══════ WebSocket frames ═════►│  Worker script  │
//! └─────────────────┘                                └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Coordinator::handshake_client` - Resolve the coordinator base
//! 2. `HandshakeClient::bootstrap` - Trade the script URL for a socket URL
//! 3. `connect` - Open the socket
//! 4. `FrameTransport::run` - Pair inbound frames, flush outbound payloads
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Socket event loop and frame pairing |
//! | `coordinator` | Cached discovery plus shared HTTP client |
//! | `handshake` | Bootstrap and registration requests |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket frame transport and event loop.
pub mod connection;

/// Shared access to one coordinator.
pub mod coordinator;

/// HTTP exchanges with the coordinator.
pub mod handshake;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    FrameTransport, InboundHandler, StatsSnapshot, TransportCommand, TransportExit,
    TransportStats, WsStream, connect,
};
pub use coordinator::Coordinator;
pub use handshake::HandshakeClient;
