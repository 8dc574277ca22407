//! Host configuration.
//!
//! Everything a host needs is passed here at construction; nothing is kept
//! in process-wide state.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use remote_workers::{CoordinatorSource, HostOptions, Mode};
//! use url::Url;
//!
//! let options = HostOptions::new()
//!     .with_mode(Mode::Remote)
//!     .with_coordinator(CoordinatorSource::Static(Url::parse("http://localhost:3000").unwrap()))
//!     .with_connect_timeout(Duration::from_secs(5));
//!
//! assert_eq!(options.mode, Mode::Remote);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for coordinator HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for opening a worker socket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Mode
// ============================================================================

/// Where workers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// In-process, from registered scripts.
    Local,
    /// Behind a coordinator.
    #[default]
    Remote,
}

// ============================================================================
// CoordinatorSource
// ============================================================================

/// How the coordinator base endpoint is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorSource {
    /// Fixed endpoint.
    Static(Url),
    /// Ping service announcing the endpoint.
    Ping(Url),
}

// ============================================================================
// HostOptions
// ============================================================================

/// Worker host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOptions {
    /// Where workers run.
    pub mode: Mode,

    /// Coordinator source; required in remote mode.
    pub coordinator: Option<CoordinatorSource>,

    /// Base against which relative worker URLs are resolved.
    pub base_url: Option<Url>,

    /// Timeout for bootstrap, registration and ping calls.
    pub http_timeout: Duration,

    /// Timeout for opening a worker socket.
    pub connect_timeout: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl HostOptions {
    /// Creates remote-mode options with default timeouts and no coordinator.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mode::Remote,
            coordinator: None,
            base_url: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Creates local-mode options.
    #[inline]
    #[must_use]
    pub fn local() -> Self {
        Self {
            mode: Mode::Local,
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl HostOptions {
    /// Sets the mode.
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the coordinator source.
    #[inline]
    #[must_use]
    pub fn with_coordinator(mut self, source: CoordinatorSource) -> Self {
        self.coordinator = Some(source);
        self
    }

    /// Sets the base for relative worker URLs.
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    /// Sets the HTTP timeout.
    #[inline]
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Sets the socket connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let options = HostOptions::new();
        assert_eq!(options.mode, Mode::Remote);
        assert!(options.coordinator.is_none());
        assert!(options.base_url.is_none());
        assert_eq!(options.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert_eq!(options, HostOptions::default());
    }

    #[test]
    fn test_local() {
        let options = HostOptions::local();
        assert_eq!(options.mode, Mode::Local);
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_builder_chain() {
        let ping = Url::parse("https://ping.example/latest").unwrap();
        let options = HostOptions::new()
            .with_coordinator(CoordinatorSource::Ping(ping.clone()))
            .with_base_url(Url::parse("https://app.example/").unwrap())
            .with_http_timeout(Duration::from_secs(3))
            .with_connect_timeout(Duration::from_secs(4));

        assert_eq!(options.coordinator, Some(CoordinatorSource::Ping(ping)));
        assert_eq!(options.http_timeout, Duration::from_secs(3));
        assert_eq!(options.connect_timeout, Duration::from_secs(4));
    }
}
