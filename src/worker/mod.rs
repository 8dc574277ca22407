//! Worker handles.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Worker`] | Handle returned by the host, local or remote |
//! | [`WorkerProxy`] | Worker hosted behind a coordinator |
//! | [`LocalWorker`] | Worker running in-process |
//! | [`ConnectionState`] | Lifecycle state machine |
//! | [`ReadySignal`] | One-shot readiness |
//! | [`Listeners`] | `message`/`error` listener registry |

// ============================================================================
// Submodules
// ============================================================================

/// Message and error listeners.
pub mod events;

/// In-process workers.
pub mod local;

/// Coordinator-hosted workers.
pub mod remote;

/// Connection state machine.
pub mod state;

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use url::Url;

use crate::codec::Value;
use crate::error::Result;
use crate::identifiers::{ListenerId, WorkerId};

// ============================================================================
// Re-exports
// ============================================================================

pub use events::{EventKind, Listener, Listeners};
pub use local::{LocalWorker, WorkerScope, WorkerScript};
pub use remote::WorkerProxy;
pub use state::{ConnectionState, ReadySignal, StateCell};

// ============================================================================
// Worker
// ============================================================================

/// Handle to a worker, whichever mode spawned it.
#[derive(Debug, Clone)]
pub enum Worker {
    /// In-process worker.
    Local(LocalWorker),
    /// Coordinator-hosted worker.
    Remote(WorkerProxy),
}

impl Worker {
    /// Returns the worker ID.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        match self {
            Self::Local(w) => w.id(),
            Self::Remote(w) => w.id(),
        }
    }

    /// Returns the absolute script URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        match self {
            Self::Local(w) => w.url(),
            Self::Remote(w) => w.url(),
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match self {
            Self::Local(w) => w.state(),
            Self::Remote(w) => w.state(),
        }
    }

    /// Returns the readiness signal.
    #[must_use]
    pub fn readiness(&self) -> ReadySignal {
        match self {
            Self::Local(w) => w.readiness(),
            Self::Remote(w) => w.readiness(),
        }
    }

    /// Returns `true` for in-process workers.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Waits until the worker can exchange messages.
    ///
    /// # Errors
    ///
    /// [`Error::WorkerFailed`](crate::Error::WorkerFailed) or
    /// [`Error::Terminated`](crate::Error::Terminated) if it never will.
    pub async fn ready(&self) -> Result<()> {
        match self {
            Self::Local(w) => w.ready().await,
            Self::Remote(w) => w.ready().await,
        }
    }

    /// Sends a value to the worker.
    ///
    /// # Errors
    ///
    /// See [`WorkerProxy::send`] and [`LocalWorker::send`].
    pub async fn send(&self, value: &Value) -> Result<()> {
        match self {
            Self::Local(w) => w.send(value).await,
            Self::Remote(w) => w.send(value).await,
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

    /// Stops the worker. Idempotent.
    pub async fn terminate(&self) {
        match self {
            Self::Local(w) => w.terminate().await,
            Self::Remote(w) => w.terminate().await,
        }
    }

    /// Replaces the `onmessage` handler.
    pub fn set_onmessage<F>(&self, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        match self {
            Self::Local(w) => w.set_onmessage(handler),
            Self::Remote(w) => w.set_onmessage(handler),
        }
    }

    /// Replaces the `onerror` handler.
    pub fn set_onerror<F>(&self, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        match self {
            Self::Local(w) => w.set_onerror(handler),
            Self::Remote(w) => w.set_onerror(handler),
        }
    }

    /// Adds a listener for `kind`.
    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        match self {
            Self::Local(w) => w.add_listener(kind, listener),
            Self::Remote(w) => w.add_listener(kind, listener),
        }
    }

    /// Removes a listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        match self {
            Self::Local(w) => w.remove_listener(id),
            Self::Remote(w) => w.remove_listener(id),
        }
    }
}

impl Worker {
    /// Returns a registry entry that does not keep the worker alive.
    pub(crate) fn downgrade(&self) -> WeakWorker {
        match self {
            Self::Local(w) => WeakWorker::Local(w.downgrade()),
            Self::Remote(w) => WeakWorker::Remote(w.downgrade()),
        }
    }
}

/// Non-owning [`Worker`] reference.
#[derive(Clone)]
pub(crate) enum WeakWorker {
    Local(local::WeakLocal),
    Remote(remote::WeakProxy),
}

impl WeakWorker {
    /// Returns the worker if a handle to it still exists.
    pub(crate) fn upgrade(&self) -> Option<Worker> {
        match self {
            Self::Local(w) => w.upgrade().map(Worker::Local),
            Self::Remote(w) => w.upgrade().map(Worker::Remote),
        }
    }

    /// Returns `true` while some handle exists and the worker has not stopped.
    pub(crate) fn is_live(&self) -> bool {
        self.upgrade()
            .is_some_and(|worker| !worker.state().is_terminal())
    }
}

impl From<LocalWorker> for Worker {
    fn from(worker: LocalWorker) -> Self {
        Self::Local(worker)
    }
}

impl From<WorkerProxy> for Worker {
    fn from(worker: WorkerProxy) -> Self {
        Self::Remote(worker)
    }
}
