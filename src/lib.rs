//! Remote Workers - run worker scripts behind a coordinator.
//!
//! This library spawns workers whose script runs on a remote coordinator
//! and exchanges structured values with them over a WebSocket, or runs the
//! same kind of worker in-process.
//!
//! # Architecture
//!
//! - **Handshake (HTTP)**: the script URL is traded for a socket endpoint
//! - **Transport (WebSocket)**: inbound messages arrive as a text command
//!   frame followed by a binary payload frame; outbound values go as a
//!   single binary frame
//! - **Codec**: every payload is a tagged binary encoding of a [`Value`]
//!
//! Key design principles:
//!
//! - Each [`WorkerProxy`] owns exactly one socket and one event loop
//! - `Failed` is terminal; there is no reconnection
//! - Configuration is explicit ([`HostOptions`]); there is no global state
//!
//! # Quick Start
//!
//! ```no_run
//! use remote_workers::{Result, Value, WorkerHost};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = WorkerHost::builder()
//!         .remote(Url::parse("http://localhost:3000")?)
//!         .build()?;
//!
//!     let worker = host.spawn("https://app.example/worker.js")?;
//!     worker.set_onmessage(|value| println!("worker said {value:?}"));
//!     worker.set_onerror(|value| eprintln!("worker failed: {value:?}"));
//!
//!     worker.ready().await?;
//!     worker.send(&Value::from("hello")).await?;
//!
//!     worker.terminate().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`codec`] | Binary value format: [`Value`], `encode`, `decode`, `size_of` |
//! | [`discovery`] | Coordinator discovery |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Worker factory and configuration |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types (internal) |
//! | [`transport`] | HTTP handshake and socket transport (internal) |
//! | [`worker`] | Worker handles, state machine, listeners |

// ============================================================================
// Modules
// ============================================================================

/// Binary value codec.
///
/// Pure functions over a tagged binary format; no I/O.
pub mod codec;

/// Coordinator discovery.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Worker factory and configuration.
///
/// Use [`WorkerHost::builder()`] to create a configured host.
pub mod host;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire message types.
///
/// Internal module defining coordinator request bodies and frame pairing.
pub mod protocol;

/// Coordinator transport layer.
///
/// Internal module handling the HTTP handshake and the socket event loop.
pub mod transport;

/// Worker handles.
///
/// - [`Worker`] - Handle returned by the host
/// - [`WorkerProxy`] - Remote worker
/// - [`LocalWorker`] - In-process worker
pub mod worker;

// ============================================================================
// Re-exports
// ============================================================================

// Codec types
pub use codec::{Blob, Tag, TypedArray, TypedArrayKind, Value};

// Discovery types
pub use discovery::{Discovery, PingDiscovery, StaticDiscovery};

// Error types
pub use error::{CodecError, Error, Result};

// Host types
pub use host::{CoordinatorSource, HostOptions, Mode, WorkerHost, WorkerHostBuilder};

// Identifier types
pub use identifiers::{ListenerId, WorkerId};

// Worker types
pub use worker::{
    ConnectionState, EventKind, LocalWorker, ReadySignal, Worker, WorkerProxy, WorkerScope,
    WorkerScript,
};
