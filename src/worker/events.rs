//! Message and error listeners.
//!
//! Each worker handle holds one [`Listeners`] registry. Dispatch works on a
//! snapshot, so a listener added or removed while an event is being
//! delivered only takes effect from the next event.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::codec::Value;
use crate::identifiers::ListenerId;
use crate::protocol::Command;

// ============================================================================
// Types
// ============================================================================

/// Event kinds a worker emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A value posted by the worker script.
    Message,
    /// An error raised by the worker script.
    Error,
}

impl From<Command> for EventKind {
    fn from(command: Command) -> Self {
        match command {
            Command::Message => Self::Message,
            Command::Error => Self::Error,
        }
    }
}

/// Listener callback.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

// ============================================================================
// Listeners
// ============================================================================

/// Listener registry of one worker.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    onmessage: RwLock<Option<Listener>>,
    onerror: RwLock<Option<Listener>>,
    entries: RwLock<Vec<(ListenerId, EventKind, Listener)>>,
}

impl Listeners {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener for `kind`.
    pub fn add(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, kind, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _, _)| *entry_id != id);
        entries.len() != before
    }

    /// Replaces the `onmessage`/`onerror` slot for `kind`.
    pub fn set_handler(&self, kind: EventKind, handler: Option<Listener>) {
        match kind {
            EventKind::Message => *self.onmessage.write() = handler,
            EventKind::Error => *self.onerror.write() = handler,
        }
    }

    /// Returns the number of listeners for `kind`, excluding the slot.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry_kind, _)| *entry_kind == kind)
            .count()
    }

    /// Delivers `value` to the slot for `kind`, then to each listener.
    ///
    /// Returns how many callbacks ran.
    pub fn dispatch(&self, kind: EventKind, value: &Value) -> usize {
        let slot = match kind {
            EventKind::Message => self.onmessage.read().clone(),
            EventKind::Error => self.onerror.read().clone(),
        };

        // Snapshot; no lock is held while callbacks run
        let snapshot: Vec<Listener> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry_kind, _)| *entry_kind == kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        let mut delivered = 0;
        if let Some(slot) = slot {
            slot(value);
            delivered += 1;
        }
        for listener in snapshot {
            listener(value);
            delivered += 1;
        }
        delivered
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("onmessage", &self.onmessage.read().is_some())
            .field("onerror", &self.onerror.read().is_some())
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &'static str| {
                let log = Arc::clone(&log);
                Arc::new(move |value: &Value| {
                    log.lock().push(format!("{name}:{}", value.as_str().unwrap_or("?")));
                }) as Listener
            }
        };
        (log, make)
    }

    #[test]
    fn test_event_kind_from_command() {
        assert_eq!(EventKind::from(Command::Message), EventKind::Message);
        assert_eq!(EventKind::from(Command::Error), EventKind::Error);
    }

    #[test]
    fn test_dispatch_slot_then_listeners() {
        let listeners = Listeners::new();
        let (log, make) = recorder();

        listeners.add(EventKind::Message, make("a"));
        listeners.set_handler(EventKind::Message, Some(make("slot")));
        listeners.add(EventKind::Message, make("b"));
        listeners.add(EventKind::Error, make("err"));

        let delivered = listeners.dispatch(EventKind::Message, &Value::from("hi"));
        assert_eq!(delivered, 3);
        assert_eq!(*log.lock(), ["slot:hi", "a:hi", "b:hi"]);
    }

    #[test]
    fn test_error_kind_does_not_reach_message_listeners() {
        let listeners = Listeners::new();
        let (log, make) = recorder();
        listeners.set_handler(EventKind::Message, Some(make("msg")));
        listeners.set_handler(EventKind::Error, Some(make("err")));

        listeners.dispatch(EventKind::Error, &Value::from("x"));
        assert_eq!(*log.lock(), ["err:x"]);
    }

    #[test]
    fn test_remove() {
        let listeners = Listeners::new();
        let (log, make) = recorder();
        let id = listeners.add(EventKind::Message, make("a"));

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert_eq!(listeners.dispatch(EventKind::Message, &Value::Null), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_clear_handler_slot() {
        let listeners = Listeners::new();
        let (_log, make) = recorder();
        listeners.set_handler(EventKind::Error, Some(make("err")));
        listeners.set_handler(EventKind::Error, None);
        assert_eq!(listeners.dispatch(EventKind::Error, &Value::Null), 0);
    }

    #[test]
    fn test_removal_during_dispatch_keeps_current_pass() {
        let listeners = Arc::new(Listeners::new());
        let (log, make) = recorder();
        let second_id = Arc::new(Mutex::new(None::<ListenerId>));

        {
            let registry = Arc::clone(&listeners);
            let second_id = Arc::clone(&second_id);
            listeners.add(
                EventKind::Message,
                Arc::new(move |_: &Value| {
                    if let Some(id) = *second_id.lock() {
                        registry.remove(id);
                    }
                }),
            );
        }
        *second_id.lock() = Some(listeners.add(EventKind::Message, make("second")));

        assert_eq!(listeners.dispatch(EventKind::Message, &Value::from("one")), 2);
        assert_eq!(listeners.dispatch(EventKind::Message, &Value::from("two")), 1);
        assert_eq!(*log.lock(), ["second:one"]);
        assert_eq!(listeners.count(EventKind::Message), 1);
    }
}
