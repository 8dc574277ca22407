//! In-process workers.
//!
//! A [`WorkerScript`] runs on its own tokio task and exchanges values with
//! its [`LocalWorker`] handle. Values crossing the boundary go through the
//! codec, so both sides observe the same copy semantics as a remote worker.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use crate::codec::{self, Value};
use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, WorkerId};

use super::events::{EventKind, Listener, Listeners};
use super::state::{ConnectionState, ReadySignal, StateCell};

// ============================================================================
// WorkerScript
// ============================================================================

/// Body of an in-process worker.
#[async_trait]
pub trait WorkerScript: Send + Sync {
    /// Handles one value sent by the owning handle.
    ///
    /// An error is delivered to the handle's `error` listeners as a string.
    async fn on_message(&self, message: Value, scope: &WorkerScope) -> Result<()>;
}

/// What a running script can reach.
pub struct WorkerScope {
    id: WorkerId,
    url: Url,
    listeners: Arc<Listeners>,
}

impl WorkerScope {
    /// Returns the worker ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Returns the script URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Delivers a copy of `value` to the handle's `message` listeners.
    ///
    /// # Errors
    ///
    /// [`Error::Codec`] if the value cannot be copied.
    pub fn post_message(&self, value: &Value) -> Result<()> {
        let copy = structured_clone(value)?;
        self.listeners.dispatch(EventKind::Message, &copy);
        Ok(())
    }
}

impl fmt::Debug for WorkerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerScope")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// LocalWorker
// ============================================================================

enum LocalCommand {
    Message(Value),
    Terminate(oneshot::Sender<()>),
}

/// Handle to one in-process worker.
///
/// Ready as soon as it is spawned. Cheap to clone.
#[derive(Clone)]
pub struct LocalWorker {
    inner: Arc<LocalInner>,
}

struct LocalInner {
    id: WorkerId,
    url: Url,
    state: Arc<StateCell>,
    listeners: Arc<Listeners>,
    commands: mpsc::UnboundedSender<LocalCommand>,
    terminated: AtomicBool,
}

impl LocalWorker {
    /// Starts `script` on a new task. Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(url: Url, script: Arc<dyn WorkerScript>) -> Self {
        let id = WorkerId::generate();
        let state = Arc::new(StateCell::new());
        let listeners = Arc::new(Listeners::new());
        let (commands, commands_rx) = mpsc::unbounded_channel();

        // No handshake and no socket: both steps succeed at once
        let _ = state.transition(ConnectionState::AwaitingSocket);
        let _ = state.transition(ConnectionState::Ready);

        let scope = WorkerScope {
            id,
            url: url.clone(),
            listeners: Arc::clone(&listeners),
        };
        tokio::spawn(run(script, scope, Arc::clone(&state), commands_rx));

        debug!(worker_id = %id, %url, "Local worker started");

        Self {
            inner: Arc::new(LocalInner {
                id,
                url,
                state,
                listeners,
                commands,
                terminated: AtomicBool::new(false),
            }),
        }
    }

    /// Returns a handle that does not keep the script running.
    #[must_use]
    pub(crate) fn downgrade(&self) -> WeakLocal {
        WeakLocal {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the worker ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.inner.id
    }

    /// Returns the script URL.
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

    /// Returns the readiness signal.
    #[must_use]
    pub fn readiness(&self) -> ReadySignal {
        self.inner.state.ready().clone()
    }

    /// Returns `true` once [`terminate`](Self::terminate) was called.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Resolves immediately unless the worker already stopped.
    ///
    /// # Errors
    ///
    /// [`Error::Terminated`] after termination.
    pub async fn ready(&self) -> Result<()> {
        if self.inner.state.ready().wait().await {
            Ok(())
        } else {
            Err(self.closed_error())
        }
    }

    /// Queues a copy of `value` for the script.
    ///
    /// # Errors
    ///
    /// - [`Error::Codec`] if the value cannot be copied
    /// - [`Error::Terminated`] / [`Error::WorkerFailed`] once stopped
    pub async fn send(&self, value: &Value) -> Result<()> {
        if self.is_terminated() {
            return Err(Error::terminated(self.inner.url.as_str()));
        }
        let copy = structured_clone(value)?;
        self.inner
            .commands
            .send(LocalCommand::Message(copy))
            .map_err(|_| self.closed_error())
    }

    /// Stops the script after the values already queued.
    pub async fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return;
        }

        let (ack, ack_rx) = oneshot::channel();
        if self.inner.commands.send(LocalCommand::Terminate(ack)).is_ok() {
            let _ = ack_rx.await;
        }

        self.inner.state.fail();
        info!(worker_id = %self.inner.id, "Local worker terminated");
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

    /// Removes a listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    fn closed_error(&self) -> Error {
        if self.is_terminated() {
            Error::terminated(self.inner.url.as_str())
        } else {
            Error::worker_failed(self.inner.url.as_str())
        }
    }
}

impl fmt::Debug for LocalWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWorker")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Non-owning [`LocalWorker`] reference.
#[derive(Clone)]
pub(crate) struct WeakLocal {
    inner: Weak<LocalInner>,
}

impl WeakLocal {
    pub(crate) fn upgrade(&self) -> Option<LocalWorker> {
        self.inner.upgrade().map(|inner| LocalWorker { inner })
    }
}

// ============================================================================
// Background Task
// ============================================================================

async fn run(
    script: Arc<dyn WorkerScript>,
    scope: WorkerScope,
    state: Arc<StateCell>,
    mut commands: mpsc::UnboundedReceiver<LocalCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            LocalCommand::Message(value) => {
                if let Err(e) = script.on_message(value, &scope).await {
                    warn!(worker_id = %scope.id, error = %e, "Worker script raised an error");
                    scope
                        .listeners
                        .dispatch(EventKind::Error, &Value::String(e.to_string()));
                }
            }
            LocalCommand::Terminate(ack) => {
                let _ = ack.send(());
                break;
            }
        }
    }

    state.fail();
    debug!(worker_id = %scope.id, "Local worker stopped");
}

/// Copies a value through the codec.
fn structured_clone(value: &Value) -> Result<Value> {
    Ok(codec::decode(&codec::encode(value)?)?)
}

// ============================================================================
// Tests
// ============================================================================
