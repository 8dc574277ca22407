//! Builder pattern for host configuration.
//!
//! Provides a fluent API for configuring and creating [`WorkerHost`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use remote_workers::WorkerHost;
//! use url::Url;
//!
//! # fn example() -> remote_workers::Result<()> {
//! let host = WorkerHost::builder()
//!     .remote(Url::parse("http://localhost:3000")?)
//!     .base_url(Url::parse("https://app.example/")?)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use url::Url;

use crate::discovery::Discovery;
use crate::error::{Error, Result};
use crate::worker::WorkerScript;

use super::core::WorkerHost;
use super::options::{CoordinatorSource, HostOptions, Mode};

// ============================================================================
// WorkerHostBuilder
// ============================================================================

/// Builder for configuring a [`WorkerHost`].
///
/// Use [`WorkerHost::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct WorkerHostBuilder {
    /// Accumulated options.
    options: HostOptions,
    /// Custom discovery, overriding the coordinator source.
    discovery: Option<Arc<dyn Discovery>>,
    /// Local scripts by worker URL.
    scripts: FxHashMap<String, Arc<dyn WorkerScript>>,
}

// ============================================================================
// WorkerHostBuilder Implementation
// ============================================================================

impl WorkerHostBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs workers in-process.
    #[inline]
    #[must_use]
    pub fn local(mut self) -> Self {
        self.options.mode = Mode::Local;
        self
    }

    /// Runs workers behind the coordinator at `base`.
    ///
    /// # Arguments
    ///
    /// * `base` - Coordinator base endpoint (e.g. "http://localhost:3000")
    #[inline]
    #[must_use]
    pub fn remote(mut self, base: Url) -> Self {
        self.options.mode = Mode::Remote;
        self.options.coordinator = Some(CoordinatorSource::Static(base));
        self
    }

    /// Runs workers behind a coordinator announced by a ping service.
    #[inline]
    #[must_use]
    pub fn discover(mut self, ping_url: Url) -> Self {
        self.options.mode = Mode::Remote;
        self.options.coordinator = Some(CoordinatorSource::Ping(ping_url));
        self
    }

    /// Uses a custom discovery instead of the coordinator source.
    #[inline]
    #[must_use]
    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Sets the base for relative worker URLs.
    #[inline]
    #[must_use]
    pub fn base_url(mut self, base: Url) -> Self {
        self.options.base_url = Some(base);
        self
    }

    /// Sets the coordinator HTTP timeout.
    #[inline]
    #[must_use]
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.options.http_timeout = timeout;
        self
    }

    /// Sets the socket connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Registers an in-process script under a worker URL.
    ///
    /// Only used in local mode. Relative URLs are resolved the same way
    /// [`WorkerHost::spawn`] resolves them.
    #[must_use]
    pub fn script(mut self, url: impl Into<String>, script: impl WorkerScript + 'static) -> Self {
        self.scripts.insert(url.into(), Arc::new(script));
        self
    }

    /// Builds the host with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if remote mode has no coordinator source
    /// - [`Error::Config`] if a script URL cannot be resolved
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn build(self) -> Result<WorkerHost> {
        self.validate_coordinator()?;
        WorkerHost::new(self.options, self.discovery, self.scripts)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl WorkerHostBuilder {
    /// Validates that remote mode can find its coordinator.
    fn validate_coordinator(&self) -> Result<()> {
        if self.options.mode == Mode::Remote
            && self.options.coordinator.is_none()
            && self.discovery.is_none()
        {
            return Err(Error::config(
                "Remote mode requires a coordinator. Use .remote() or .discover() to set it.\n\
                 Example: WorkerHost::builder().remote(Url::parse(\"http://localhost:3000\")?)",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for WorkerHostBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHostBuilder")
            .field("options", &self.options)
            .field("custom_discovery", &self.discovery.is_some())
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
