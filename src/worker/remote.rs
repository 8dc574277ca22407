//! Worker hosted behind a coordinator.
//!
//! [`WorkerProxy`] composes the bootstrap call and the socket transport:
//!
//! 1. Resolve the coordinator, POST the script URL, receive `ws_url`
//! 2. Open the socket; readiness resolves
//! 3. Run the event loop until termination or a transport failure
//!
//! Outbound sends queue in call order from construction on and are flushed
//! once the socket is open. Any failure leaves the proxy in `Failed` for
//! good; callers needing resilience create a new worker.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::codec::{self, Value};
use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, WorkerId};
use crate::transport::{
    Coordinator, FrameTransport, InboundHandler, StatsSnapshot, TransportCommand, TransportExit,
    TransportStats, WsStream, connect,
};

use super::events::{EventKind, Listener, Listeners};
use super::state::{ConnectionState, ReadySignal, StateCell};

// ============================================================================
// WorkerProxy
// ============================================================================

/// Handle to one remote worker.
///
/// Cheap to clone; clones share the connection. The socket closes when
/// [`terminate`](Self::terminate) is called or the last clone is dropped.
#[derive(Clone)]
pub struct WorkerProxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    id: WorkerId,
    url: Url,
    state: Arc<StateCell>,
    listeners: Arc<Listeners>,
    stats: Arc<TransportStats>,
    commands: mpsc::UnboundedSender<TransportCommand>,
    terminated: AtomicBool,
}

impl WorkerProxy {
    /// Starts a worker for the script at `url`.
    ///
    /// Returns immediately; bootstrap and connection continue on a
    /// background task. Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(url: Url, coordinator: Coordinator) -> Self {
        let id = WorkerId::generate();
        let state = Arc::new(StateCell::new());
        let listeners = Arc::new(Listeners::new());
        let stats = Arc::new(TransportStats::default());
        let (commands, commands_rx) = mpsc::unbounded_channel();

        debug!(worker_id = %id, %url, "Spawning remote worker");

        // The task holds no command sender, so dropping every handle closes the loop
        tokio::spawn(run(
            id,
            url.clone(),
            coordinator,
            Arc::clone(&state),
            Arc::clone(&listeners),
            Arc::clone(&stats),
            commands_rx,
        ));

        Self {
            inner: Arc::new(ProxyInner {
                id,
                url,
                state,
                listeners,
                stats,
                commands,
                terminated: AtomicBool::new(false),
            }),
        }
    }

    /// Returns a handle that does not keep the connection open.
    #[must_use]
    pub(crate) fn downgrade(&self) -> WeakProxy {
        WeakProxy {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the worker ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.inner.id
    }

    /// Returns the absolute script URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Returns the readiness signal.
    #[must_use]
    pub fn readiness(&self) -> ReadySignal {
        self.inner.state.ready().clone()
    }

    /// Returns transport counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Returns `true` once [`terminate`](Self::terminate) was called.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Waits until the socket is open.
    ///
    /// # Errors
    ///
    /// [`Error::WorkerFailed`] if the worker failed before becoming ready,
    /// [`Error::Terminated`] if it was terminated first.
    pub async fn ready(&self) -> Result<()> {
        if self.inner.state.ready().wait().await {
            Ok(())
        } else {
            Err(self.closed_error())
        }
    }

    /// Sends a value to the worker.
    ///
    /// The value is encoded immediately; transmission happens once the
    /// socket is open, in call order. Resolves when the frame is written.
    ///
    /// # Errors
    ///
    /// - [`Error::Codec`] if the value cannot be encoded
    /// - [`Error::WorkerFailed`] if the worker failed
    /// - [`Error::Terminated`] if the worker was terminated
    pub async fn send(&self, value: &Value) -> Result<()> {
        self.check_usable()?;
        let frame = codec::encode(value)?;

        let (ack, ack_rx) = oneshot::channel();
        self.inner
            .commands
            .send(TransportCommand::Send { frame, ack })
            .map_err(|_| self.closed_error())?;

        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!(worker_id = %self.inner.id, error = %e, "Send failed");
                Err(self.closed_error())
            }
            Err(_) => Err(self.closed_error()),
        }
    }

    /// Serializes `value` and sends it.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let value = Value::from_serialize(value)?;
        self.send(&value).await
    }

    /// Closes the socket and moves the worker to `Failed`.
    ///
    /// Waits for readiness first; queued sends are flushed before the
    /// close. Calling it again is a no-op.
    pub async fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return;
        }

        if self.inner.state.ready().wait().await {
            let (ack, ack_rx) = oneshot::channel();
            if self
                .inner
                .commands
                .send(TransportCommand::Close { ack })
                .is_ok()
            {
                let _ = ack_rx.await;
            }
        }

        self.inner.state.fail();
        info!(worker_id = %self.inner.id, "Worker terminated");
    }

    /// Replaces the `onmessage` handler.
    pub fn set_onmessage<F>(&self, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .set_handler(EventKind::Message, Some(Arc::new(handler)));
    }

    /// Replaces the `onerror` handler.
    pub fn set_onerror<F>(&self, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .set_handler(EventKind::Error, Some(Arc::new(handler)));
    }

    /// Adds a listener for `kind`.
    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.inner.listeners.add(kind, listener)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    fn check_usable(&self) -> Result<()> {
        if self.is_terminated() {
            return Err(Error::terminated(self.inner.url.as_str()));
        }
        if self.inner.state.current().is_terminal() {
            return Err(Error::worker_failed(self.inner.url.as_str()));
        }
        Ok(())
    }

    fn closed_error(&self) -> Error {
        if self.is_terminated() {
            Error::terminated(self.inner.url.as_str())
        } else {
            Error::worker_failed(self.inner.url.as_str())
        }
    }
}

impl fmt::Debug for WorkerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerProxy")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Non-owning [`WorkerProxy`] reference.
#[derive(Clone)]
pub(crate) struct WeakProxy {
    inner: Weak<ProxyInner>,
}

impl WeakProxy {
    pub(crate) fn upgrade(&self) -> Option<WorkerProxy> {
        self.inner.upgrade().map(|inner| WorkerProxy { inner })
    }
}

// ============================================================================
// Background Task
// ============================================================================

async fn run(
    id: WorkerId,
    url: Url,
    coordinator: Coordinator,
    state: Arc<StateCell>,
    listeners: Arc<Listeners>,
    stats: Arc<TransportStats>,
    commands: mpsc::UnboundedReceiver<TransportCommand>,
) {
    let stream = match establish(&url, &coordinator, &state).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(worker_id = %id, %url, error = %e, "Worker failed to start");
            state.fail();
            return;
        }
    };

    info!(worker_id = %id, %url, "Worker ready");

    let handler: InboundHandler = Box::new(move |message| {
        listeners.dispatch(message.command.into(), &message.value);
    });

    match FrameTransport::new(stream, stats).run(commands, handler).await {
        TransportExit::Closed => debug!(worker_id = %id, "Event loop closed"),
        TransportExit::RemoteClosed => warn!(worker_id = %id, "Coordinator closed the socket"),
        TransportExit::Failed(e) => error!(worker_id = %id, error = %e, "Transport failed"),
    }

    state.fail();
}

/// Drives `AwaitingHandshake -> AwaitingSocket -> Ready`.
async fn establish(url: &Url, coordinator: &Coordinator, state: &StateCell) -> Result<WsStream> {
    let client = coordinator.handshake_client().await?;

    state.expect(ConnectionState::AwaitingHandshake)?;
    let ws_url = client.bootstrap(url).await?;
    state.transition(ConnectionState::AwaitingSocket)?;

    let stream = connect(&ws_url, coordinator.connect_timeout()).await?;
    state.transition(ConnectionState::Ready)?;

    Ok(stream)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::discovery::StaticDiscovery;

    async fn coordinator_answering(response: ResponseTemplate) -> (MockServer, Coordinator) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/start"))
            .respond_with(response)
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let coordinator = Coordinator::new(
            Arc::new(StaticDiscovery::new(base)),
            Client::new(),
            Duration::from_secs(5),
        );
        (server, coordinator)
    }

    fn worker_url() -> Url {
        Url::parse("https://app.example/worker.js").unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_500_fails_worker() {
        let (_server, coordinator) = coordinator_answering(ResponseTemplate::new(500)).await;
        let worker = WorkerProxy::spawn(worker_url(), coordinator);

        assert!(matches!(worker.ready().await, Err(Error::WorkerFailed { .. })));
        assert_eq!(worker.state(), ConnectionState::Failed);
        assert!(!worker.readiness().is_ready());

        let err = worker.send(&Value::from(1)).await.unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_missing_ws_url_fails_worker() {
        let (_server, coordinator) =
            coordinator_answering(ResponseTemplate::new(200).set_body_json(json!({}))).await;
        let worker = WorkerProxy::spawn(worker_url(), coordinator);

        assert!(worker.ready().await.is_err());
        assert_eq!(worker.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_send_queued_before_failure_is_rejected() {
        let (_server, coordinator) = coordinator_answering(ResponseTemplate::new(500)).await;
        let worker = WorkerProxy::spawn(worker_url(), coordinator);

        // Queued while the bootstrap is in flight
        let err = worker.send(&Value::from("early")).await.unwrap_err();
        assert!(matches!(err, Error::WorkerFailed { .. }));
    }

    #[tokio::test]
    async fn test_terminate_after_failure_is_terminal() {
        let (_server, coordinator) = coordinator_answering(ResponseTemplate::new(500)).await;
        let worker = WorkerProxy::spawn(worker_url(), coordinator);

        worker.terminate().await;
        worker.terminate().await;
        assert!(worker.is_terminated());
        assert_eq!(worker.state(), ConnectionState::Failed);

        let err = worker.send(&Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::Terminated { .. }));
    }

    #[tokio::test]
    async fn test_encode_error_surfaces_synchronously() {
        let (_server, coordinator) = coordinator_answering(ResponseTemplate::new(500)).await;
        let worker = WorkerProxy::spawn(worker_url(), coordinator);

        let misaligned = Value::TypedArray(codec::TypedArray::new(
            codec::TypedArrayKind::Int32,
            vec![1, 2, 3],
        ));
        // Either the encode error or, if the bootstrap already failed, the
        // lifecycle error; never a hang.
        let err = worker.send(&misaligned).await.unwrap_err();
        assert!(err.is_codec_error() || err.is_terminal());
    }
}
