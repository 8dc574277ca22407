//! Worker host module.
//!
//! This module provides the entry point for spawning workers.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WorkerHost`] | Factory for local and remote workers |
//! | [`WorkerHostBuilder`] | Fluent configuration builder |
//! | [`HostOptions`] | Mode, coordinator and timeouts |
//! | [`Mode`] | Local or remote execution |
//! | [`CoordinatorSource`] | Static endpoint or ping discovery |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for host configuration.
pub mod builder;

/// Core host implementation.
pub mod core;

/// Host options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::WorkerHostBuilder;
pub use core::WorkerHost;
pub use options::{CoordinatorSource, HostOptions, Mode};
