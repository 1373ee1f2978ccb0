//! Publish/subscribe channel for session events.
//!
//! The bus decouples the gateway from UI-level reactions such as redirecting
//! to a login surface. Delivery is synchronous and in subscription order; one
//! publish runs to completion before another starts delivering.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

/// An event published by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The server rejected the credential; the session has been cleared.
    SessionExpired,
    /// A login succeeded.
    SignedIn {
        /// Identifier of the signed-in user, if the record carries one.
        subject_id: Option<String>,
    },
    /// The user logged out.
    SignedOut,
}

impl Event {
    /// The subscription key for this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::SessionExpired => EventKind::SessionExpired,
            Self::SignedIn { .. } => EventKind::SignedIn,
            Self::SignedOut => EventKind::SignedOut,
        }
    }
}

/// Event kinds that can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`Event::SessionExpired`].
    SessionExpired,
    /// See [`Event::SignedIn`].
    SignedIn,
    /// See [`Event::SignedOut`].
    SignedOut,
}

/// Token returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// A synchronous publish/subscribe channel keyed by [`EventKind`].
pub struct NotificationBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    delivery: ReentrantMutex<()>,
}

impl NotificationBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push(Subscriber {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// A panicking handler is logged and skipped; later handlers still run.
    /// Returns the number of handlers that completed normally.
    pub fn publish(&self, event: &Event) -> usize {
        let _delivery = self.delivery.lock();
        let kind = event.kind();

        // Snapshot so handlers may subscribe or unsubscribe while running.
        let handlers: Vec<Handler> = self
            .subscribers
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        tracing::debug!(?kind, subscribers = handlers.len(), "Publishing event");

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(?kind, reason = %reason, "Event handler panicked");
                }
            }
        }
        delivered
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &NotificationBus, kind: EventKind, log: &Arc<Mutex<Vec<String>>>, tag: &str) {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        bus.subscribe(kind, move |_| log.lock().push(tag.clone()));
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = NotificationBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, EventKind::SessionExpired, &log, "first");
        recorder(&bus, EventKind::SessionExpired, &log, "second");
        recorder(&bus, EventKind::SignedOut, &log, "other");

        let delivered = bus.publish(&Event::SessionExpired);

        assert_eq!(delivered, 2);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let bus = NotificationBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(EventKind::SignedOut, |_| panic!("handler bug"));
        recorder(&bus, EventKind::SignedOut, &log, "after");

        let delivered = bus.publish(&Event::SignedOut);

        assert_eq!(delivered, 1);
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = NotificationBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let log = Arc::clone(&log);
            bus.subscribe(EventKind::SessionExpired, move |_| log.lock().push("x"))
        };

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(&Event::SessionExpired), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn handler_can_publish_reentrantly() {
        let bus = Arc::new(NotificationBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, EventKind::SignedOut, &log, "signed-out");
        {
            let inner = Arc::clone(&bus);
            bus.subscribe(EventKind::SessionExpired, move |_| {
                inner.publish(&Event::SignedOut);
            });
        }

        bus.publish(&Event::SessionExpired);

        assert_eq!(*log.lock(), vec!["signed-out"]);
    }

    #[test]
    fn event_kinds() {
        assert_eq!(Event::SessionExpired.kind(), EventKind::SessionExpired);
        assert_eq!(
            Event::SignedIn { subject_id: None }.kind(),
            EventKind::SignedIn
        );
    }
}
