//! Wire message types.
//!
//! This module defines the messages exchanged with the coordinator: the
//! JSON bodies of the HTTP bootstrap and registration calls, and the
//! framing of the socket that follows.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Carrier |
//! |---------|-----------|---------|
//! | [`StartRequest`] / [`StartResponse`] | Local ⇄ Coordinator | HTTP JSON |
//! | [`RegisterRequest`] / [`RegisterResponse`] | Local ⇄ Coordinator | HTTP JSON |
//! | Command + payload pair | Remote → Local | text frame + binary frame |
//! | Payload | Local → Remote | binary frame |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `coordinator` | HTTP request and response bodies |
//! | `frame` | Socket frame pairing |

// ============================================================================
// Submodules
// ============================================================================

/// HTTP request and response bodies.
pub mod coordinator;

/// Socket frame pairing.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use coordinator::{
    PingEntry, PingMessage, REGISTER_PATH, RegisterRequest, RegisterResponse, START_PATH,
    StartRequest, StartResponse,
};
pub use frame::{Command, Frame, FramePairer, InboundMessage, PairingState};
