use crate::models::LessonId;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tracing::error;

type SubscriptionId = u64;

/// Events exchanged between playback components
///
/// This is the only coupling point between the video controller and the rest
/// of the UI: anything holding the bus can command a seek or observe
/// play/pause without a reference to the player itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SeekTo {
        lesson_id: LessonId,
        time_seconds: f64,
    },
    Play {
        lesson_id: LessonId,
    },
    Pause {
        lesson_id: LessonId,
    },
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::SeekTo { .. } => EventKind::SeekTo,
            PlayerEvent::Play { .. } => EventKind::Play,
            PlayerEvent::Pause { .. } => EventKind::Pause,
        }
    }
}

/// Event kinds a handler can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SeekTo,
    Play,
    Pause,
}

type EventHandler = dyn Fn(&PlayerEvent) + Send + Sync;

struct BusState {
    // Vec keeps registration order for dispatch
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Arc<EventHandler>)>>,
}

/// Synchronous in-process publish/subscribe channel for player events
///
/// Dispatch invokes the handlers registered for the event's kind in
/// registration order before returning. A panicking handler is caught and
/// logged; it does not stop fan-out. No persistence, no delivery to
/// subscribers registered after dispatch.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus {
            state: Arc::new(Mutex::new(BusState {
                handlers: HashMap::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind
    ///
    /// The returned [`Subscription`] unsubscribes when dropped; calling
    /// [`Subscription::unsubscribe`] explicitly is idempotent.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            bus: self.clone(),
            kind,
            id,
            active: true,
        }
    }

    /// Dispatch an event to all currently-registered handlers for its kind
    pub fn dispatch(&self, event: PlayerEvent) {
        // Snapshot under the lock, invoke outside it: handlers may themselves
        // subscribe or unsubscribe without affecting this dispatch.
        let snapshot: Vec<Arc<EventHandler>> = {
            let state = self.state.lock().unwrap();
            state
                .handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                error!("Player event handler panicked for {:?}", event.kind());
            }
        }
    }

    /// Number of live subscriptions across all kinds
    pub fn subscription_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.handlers.values().map(|list| list.len()).sum()
    }

    fn remove(&self, kind: EventKind, id: SubscriptionId) {
        let mut state = self.state.lock().unwrap();
        if let Some(list) = state.handlers.get_mut(&kind) {
            list.retain(|(entry_id, _)| *entry_id != id);
        }
    }
}

/// Guard for a bus subscription
///
/// Unsubscribes on drop so a detached component cannot leave a dangling
/// handler behind.
pub struct Subscription {
    bus: EventBus,
    kind: EventKind,
    id: SubscriptionId,
    active: bool,
}

impl Subscription {
    /// Remove the handler; safe to call more than once
    pub fn unsubscribe(&mut self) {
        if self.active {
            self.bus.remove(self.kind, self.id);
            self.active = false;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
