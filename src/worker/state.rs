//! Connection state machine and readiness signal.
//!
//! ```text
//! AwaitingHandshake ──bootstrap ok──► AwaitingSocket ──socket open──► Ready
//!         │                                  │                         │
//!         └──────────────────────────────────┴────────────► Failed ◄───┘
//! ```
//!
//! `Failed` is terminal. Readiness resolves exactly once, on entry to
//! `Ready`; if the worker fails first, waiters are released as abandoned.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of one worker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Bootstrap request not yet answered.
    #[default]
    AwaitingHandshake,
    /// Endpoint known, socket not yet open.
    AwaitingSocket,
    /// Socket open; messages flow.
    Ready,
    /// Terminal.
    Failed,
}

impl ConnectionState {
    /// Returns the state name.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AwaitingHandshake => "AwaitingHandshake",
            Self::AwaitingSocket => "AwaitingSocket",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }

    /// Returns `true` if no transition leaves this state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns `true` if `next` is a legal successor.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::AwaitingHandshake, Self::AwaitingSocket)
                | (Self::AwaitingSocket, Self::Ready)
                | (Self::AwaitingHandshake | Self::AwaitingSocket | Self::Ready, Self::Failed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// ReadySignal
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Abandoned,
}

/// One-shot readiness signal.
///
/// Resolves at most once and never resets. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    inner: Arc<watch::Sender<Readiness>>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    /// Creates an unresolved signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::Pending);
        Self { inner: Arc::new(tx) }
    }

    /// Resolves the signal.
    ///
    /// Returns `true` only for the call that resolved it.
    pub fn resolve(&self) -> bool {
        self.inner.send_if_modified(|r| {
            if *r == Readiness::Pending {
                *r = Readiness::Ready;
                true
            } else {
                false
            }
        })
    }

    /// Releases waiters without resolving. No-op once resolved.
    pub fn abandon(&self) {
        self.inner.send_if_modified(|r| {
            if *r == Readiness::Pending {
                *r = Readiness::Abandoned;
                true
            } else {
                false
            }
        });
    }

    /// Returns `true` if the signal has resolved.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.inner.borrow() == Readiness::Ready
    }

    /// Waits until the signal resolves or is abandoned.
    ///
    /// Returns `true` if it resolved.
    pub async fn wait(&self) -> bool {
        let mut rx = self.inner.subscribe();
        match rx.wait_for(|r| *r != Readiness::Pending).await {
            Ok(r) => *r == Readiness::Ready,
            Err(_) => false,
        }
    }
}

// ============================================================================
// StateCell
// ============================================================================

/// Current connection state plus readiness, shared by a worker handle and
/// its event loop.
#[derive(Debug)]
pub struct StateCell {
    state: watch::Sender<ConnectionState>,
    ready: ReadySignal,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    /// Creates a cell in `AwaitingHandshake`.
    #[must_use]
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(ConnectionState::AwaitingHandshake);
        Self {
            state,
            ready: ReadySignal::new(),
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns the readiness signal.
    #[inline]
    #[must_use]
    pub fn ready(&self) -> &ReadySignal {
        &self.ready
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Moves to `next`. Entering `Ready` resolves readiness; entering
    /// `Failed` abandons it.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolState`] if the transition is not legal.
    pub fn transition(&self, next: ConnectionState) -> Result<()> {
        let mut from = ConnectionState::Failed;
        let moved = self.state.send_if_modified(|current| {
            from = *current;
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if !moved {
            return Err(Error::protocol_state(format!(
                "illegal transition {from} -> {next}"
            )));
        }

        debug!(%from, to = %next, "Connection state changed");
        match next {
            ConnectionState::Ready => {
                self.ready.resolve();
            }
            ConnectionState::Failed => self.ready.abandon(),
            _ => {}
        }
        Ok(())
    }

    /// Forces `Failed`. Returns `false` if already failed.
    pub fn fail(&self) -> bool {
        self.transition(ConnectionState::Failed).is_ok()
    }

    /// Checks that the current state is `expected`.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolState`] otherwise.
    pub fn expect(&self, expected: ConnectionState) -> Result<()> {
        let current = self.current();
        if current == expected {
            Ok(())
        } else {
            Err(Error::protocol_state(format!(
                "expected state {expected}, found {current}"
            )))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use ConnectionState::*;

    #[test]
    fn test_legal_transitions() {
        assert!(AwaitingHandshake.can_transition_to(AwaitingSocket));
        assert!(AwaitingSocket.can_transition_to(Ready));
        assert!(AwaitingHandshake.can_transition_to(Failed));
        assert!(AwaitingSocket.can_transition_to(Failed));
        assert!(Ready.can_transition_to(Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!AwaitingHandshake.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(AwaitingSocket));
        assert!(!Ready.can_transition_to(Ready));
        for next in [AwaitingHandshake, AwaitingSocket, Ready, Failed] {
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(AwaitingSocket.to_string(), "AwaitingSocket");
        assert!(Failed.is_terminal());
        assert!(!Ready.is_terminal());
    }

    #[test]
    fn test_ready_signal_resolves_once() {
        let signal = ReadySignal::new();
        assert!(!signal.is_ready());
        assert!(signal.resolve());
        assert!(!signal.resolve());
        signal.abandon();
        assert!(signal.is_ready());
    }

    #[tokio::test]
    async fn test_ready_signal_wakes_waiters() {
        let signal = ReadySignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.resolve();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_signal_abandoned() {
        let signal = ReadySignal::new();
        signal.abandon();
        assert!(!signal.wait().await);
        assert!(!signal.resolve());
    }

    #[test]
    fn test_state_cell_happy_path() {
        let cell = StateCell::new();
        cell.expect(AwaitingHandshake).unwrap();
        cell.transition(AwaitingSocket).unwrap();
        assert!(!cell.ready().is_ready());
        cell.transition(Ready).unwrap();
        assert!(cell.ready().is_ready());
        assert_eq!(cell.current(), Ready);
    }

    #[test]
    fn test_state_cell_rejects_illegal() {
        let cell = StateCell::new();
        let err = cell.transition(Ready).unwrap_err();
        assert!(matches!(err, Error::ProtocolState { .. }));
        assert_eq!(cell.current(), AwaitingHandshake);
    }

    #[test]
    fn test_state_cell_failed_is_terminal() {
        let cell = StateCell::new();
        assert!(cell.fail());
        assert!(!cell.fail());
        assert!(cell.transition(AwaitingSocket).is_err());
        assert!(!cell.ready().is_ready());
        assert!(cell.expect(Ready).is_err());
    }

    #[tokio::test]
    async fn test_state_cell_subscribe() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();
        cell.transition(AwaitingSocket).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AwaitingSocket);
    }
}
