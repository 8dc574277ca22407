//! Worker host and factory.
//!
//! The [`WorkerHost`] turns worker URLs into running workers according to
//! its [`HostOptions`], and tracks them until they stop.
//!
//! # Example
//!
//! ```no_run
//! use remote_workers::{Value, WorkerHost};
//! use url::Url;
//!
//! # async fn example() -> remote_workers::Result<()> {
//! let host = WorkerHost::builder()
//!     .remote(Url::parse("http://localhost:3000")?)
//!     .build()?;
//!
//! let worker = host.spawn("https://app.example/worker.js")?;
//! worker.set_onmessage(|value| println!("{value:?}"));
//! worker.send(&Value::from("hello")).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;
use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use tracing::{debug, info};
use url::Url;

use crate::discovery::{Discovery, PingDiscovery, StaticDiscovery};
use crate::error::{Error, Result};
use crate::identifiers::WorkerId;
use crate::transport::Coordinator;
use crate::worker::{LocalWorker, WeakWorker, Worker, WorkerProxy, WorkerScript};

use super::builder::WorkerHostBuilder;
use super::options::{CoordinatorSource, HostOptions, Mode};

// ============================================================================
// Constants
// ============================================================================

/// Base for relative script URLs in local mode when no base is configured.
const LOCAL_BASE: &str = "local:///";

// ============================================================================
// WorkerHost
// ============================================================================

/// Factory for workers.
///
/// Cheap to clone; clones share configuration, the coordinator and the
/// worker registry.
#[derive(Clone)]
pub struct WorkerHost {
    /// Shared inner state.
    inner: Arc<HostInner>,
}

struct HostInner {
    options: HostOptions,
    coordinator: Option<Coordinator>,
    scripts: FxHashMap<String, Arc<dyn WorkerScript>>,
    /// Weak so that dropping every user handle still closes the worker.
    workers: Mutex<FxHashMap<WorkerId, WeakWorker>>,
}

// ============================================================================
// WorkerHost - Display
// ============================================================================

impl fmt::Debug for WorkerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHost")
            .field("mode", &self.inner.options.mode)
            .field("coordinator", &self.inner.coordinator)
            .field("worker_count", &self.worker_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WorkerHost - Public API
// ============================================================================

impl WorkerHost {
    /// Creates a configuration builder for the host.
    #[inline]
    #[must_use]
    pub fn builder() -> WorkerHostBuilder {
        WorkerHostBuilder::new()
    }

    /// Returns the mode workers run in.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.inner.options.mode
    }

    /// Returns the host options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &HostOptions {
        &self.inner.options
    }

    /// Resolves a worker URL to absolute form.
    ///
    /// Absolute URLs are taken as-is; relative ones are joined onto the
    /// configured base URL.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the URL is relative and no base is configured,
    /// or if it does not parse.
    pub fn resolve_url(&self, url: &str) -> Result<Url> {
        resolve(&self.inner.options, url)
    }

    /// Starts a worker for the script at `url`.
    ///
    /// In remote mode this returns at once; bootstrap continues in the
    /// background and failures surface through [`Worker::ready`]. Must be
    /// called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL cannot be resolved
    /// - [`Error::ScriptNotFound`] in local mode if no script is registered
    pub fn spawn(&self, url: &str) -> Result<Worker> {
        let url = self.resolve_url(url)?;

        let worker: Worker = match self.inner.options.mode {
            Mode::Local => {
                let script = self
                    .inner
                    .scripts
                    .get(url.as_str())
                    .cloned()
                    .ok_or_else(|| Error::script_not_found(url.as_str()))?;
                LocalWorker::spawn(url, script).into()
            }
            Mode::Remote => {
                let coordinator = self.coordinator()?;
                WorkerProxy::spawn(url, coordinator.clone()).into()
            }
        };

        info!(worker_id = %worker.id(), url = %worker.url(), mode = ?self.mode(), "Worker spawned");
        let mut workers = self.inner.workers.lock();
        workers.retain(|_, entry| entry.is_live());
        workers.insert(worker.id(), worker.downgrade());
        drop(workers);

        Ok(worker)
    }

    /// Registers a persistent worker with the coordinator.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] in local mode or if the URL cannot be resolved
    /// - [`Error::Discovery`] if the coordinator cannot be found
    /// - [`Error::Registration`] if the coordinator refuses
    pub async fn register(&self, url: &str, options: Json) -> Result<()> {
        if self.inner.options.mode == Mode::Local {
            return Err(Error::config("registration requires remote mode"));
        }

        let url = self.resolve_url(url)?;
        let client = self.coordinator()?.handshake_client().await?;
        client.register(&url, options).await
    }

    /// Returns the number of workers that have not stopped.
    ///
    /// A worker whose handles were all dropped counts as stopped.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        let mut workers = self.inner.workers.lock();
        workers.retain(|_, entry| entry.is_live());
        workers.len()
    }

    /// Terminates every worker spawned by this host that still has a handle.
    pub async fn close(&self) {
        let workers: Vec<Worker> = {
            let mut map = self.inner.workers.lock();
            map.drain().filter_map(|(_, entry)| entry.upgrade()).collect()
        };

        info!(count = workers.len(), "Terminating all workers");

        for worker in workers {
            worker.terminate().await;
        }
    }
}

// ============================================================================
// WorkerHost - Internal
// ============================================================================

impl WorkerHost {
    /// Creates a host. Use [`WorkerHost::builder`] instead.
    pub(crate) fn new(
        options: HostOptions,
        discovery: Option<Arc<dyn Discovery>>,
        scripts: FxHashMap<String, Arc<dyn WorkerScript>>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(options.http_timeout).build()?;

        let discovery: Option<Arc<dyn Discovery>> = match (discovery, &options.coordinator) {
            (Some(custom), _) => Some(custom),
            (None, Some(CoordinatorSource::Static(base))) => {
                Some(Arc::new(StaticDiscovery::new(base.clone())))
            }
            (None, Some(CoordinatorSource::Ping(ping_url))) => {
                Some(Arc::new(PingDiscovery::new(client.clone(), ping_url.clone())))
            }
            (None, None) => None,
        };

        let coordinator =
            discovery.map(|d| Coordinator::new(d, client, options.connect_timeout));

        // Key scripts by their resolved URL so lookups match what spawn resolves
        let scripts = scripts
            .into_iter()
            .map(|(url, script)| Ok((resolve(&options, &url)?.to_string(), script)))
            .collect::<Result<FxHashMap<_, _>>>()?;

        debug!(mode = ?options.mode, scripts = scripts.len(), "Worker host created");

        Ok(Self {
            inner: Arc::new(HostInner {
                options,
                coordinator,
                scripts,
                workers: Mutex::new(FxHashMap::default()),
            }),
        })
    }

    fn coordinator(&self) -> Result<&Coordinator> {
        self.inner
            .coordinator
            .as_ref()
            .ok_or_else(|| Error::config("no coordinator configured"))
    }
}

/// Resolves `url` against the configured base.
fn resolve(options: &HostOptions, url: &str) -> Result<Url> {
    match Url::parse(url) {
        Ok(absolute) => Ok(absolute),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = match (&options.base_url, options.mode) {
                (Some(base), _) => base.clone(),
                (None, Mode::Local) => Url::parse(LOCAL_BASE)?,
                (None, Mode::Remote) => {
                    return Err(Error::config(format!(
                        "relative worker URL {url:?} needs a base URL"
                    )));
                }
            };
            base.join(url)
                .map_err(|e| Error::config(format!("invalid worker URL {url:?}: {e}")))
        }
        Err(e) => Err(Error::config(format!("invalid worker URL {url:?}: {e}"))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::codec::Value;
    use crate::worker::WorkerScope;

    struct Noop;

    #[async_trait]
    impl WorkerScript for Noop {
        async fn on_message(&self, _message: Value, _scope: &WorkerScope) -> Result<()> {
            Ok(())
        }
    }

    fn remote_host(base: &str) -> WorkerHost {
        WorkerHost::builder()
            .remote(Url::parse(base).unwrap())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_host_is_clone_and_debug() {
        fn assert_clone<T: Clone>() {}
        fn assert_debug<T: fmt::Debug>() {}
        assert_clone::<WorkerHost>();
        assert_debug::<WorkerHost>();
    }

    #[test]
    fn test_resolve_absolute_url() {
        let host = remote_host("http://localhost:3000");
        let url = host.resolve_url("https://cdn.example/w.js").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example/w.js");
    }

    #[test]
    fn test_resolve_relative_against_base() {
        let host = WorkerHost::builder()
            .remote(Url::parse("http://localhost:3000").unwrap())
            .base_url(Url::parse("https://app.example/pages/index.html").unwrap())
            .build()
            .unwrap();
        let url = host.resolve_url("../workers/w.js").unwrap();
        assert_eq!(url.as_str(), "https://app.example/workers/w.js");
    }

    #[test]
    fn test_resolve_relative_without_base_fails() {
        let host = remote_host("http://localhost:3000");
        assert!(matches!(host.resolve_url("w.js"), Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_local_spawn_by_relative_name() {
        let host = WorkerHost::builder()
            .local()
            .script("echo.js", Noop)
            .build()
            .unwrap();

        let worker = host.spawn("echo.js").unwrap();
        assert!(worker.is_local());
        assert_eq!(worker.url().as_str(), "local:///echo.js");
        assert_eq!(host.worker_count(), 1);

        host.close().await;
        assert_eq!(host.worker_count(), 0);
        assert!(worker.state().is_terminal());
    }

    #[tokio::test]
    async fn test_registry_does_not_keep_dropped_workers() {
        let host = WorkerHost::builder()
            .local()
            .script("echo.js", Noop)
            .build()
            .unwrap();

        let dropped = host.spawn("echo.js").unwrap();
        let kept = host.spawn("echo.js").unwrap();
        drop(dropped);
        assert_eq!(host.worker_count(), 1);

        host.close().await;
        assert!(kept.state().is_terminal());
        assert_eq!(host.worker_count(), 0);
    }

    #[tokio::test]
    async fn test_local_spawn_unknown_script() {
        let host = WorkerHost::builder().local().build().unwrap();
        assert!(matches!(
            host.spawn("missing.js"),
            Err(Error::ScriptNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_rejected_in_local_mode() {
        let host = WorkerHost::builder().local().build().unwrap();
        let err = host.register("echo.js", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_register_forwards_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let host = remote_host(&server.uri());
        host.register("https://app.example/sw.js", json!({ "scope": "/" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remote_spawn_failure_is_pruned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/start"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let host = remote_host(&server.uri());
        let worker = host.spawn("https://app.example/worker.js").unwrap();
        assert!(!worker.is_local());
        assert!(worker.ready().await.is_err());
        assert_eq!(host.worker_count(), 0);
    }
}
