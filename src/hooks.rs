use std::{
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tracing::{trace, warn};

/// The hook names the built-in commands publish.
pub mod names {
    /// A device was chosen. Payload: `[device]`.
    pub const SET: &str = "set";

    /// The transport opened. Payload: `[device]`.
    pub const OPEN: &str = "open";

    /// The transport closed. Payload: `[device]`.
    pub const CLOSE: &str = "close";

    /// A message went out. Payload: `[message]`.
    pub const WRITE: &str = "write";

    /// The transport reported an error. Payload: `[error message]`.
    pub const ERROR: &str = "error";

    /// Data came in. Payload: `[data]`.
    pub const READ: &str = "read";
}

/// Something called with the payload of each published event it is subscribed to.
pub type Listener = Arc<dyn Fn(&[String]) + Send + Sync>;

/// A shared handle to a [`HookBus`].
pub type Hooks = Arc<HookBus>;

/// Identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

struct Registration {
    id: HookId,
    event: String,
    listener: Listener,
}

/// Named broadcast points.
///
/// Delivery is synchronous, on the publisher's thread, in subscription order.
/// Events published concurrently from different tasks (e.g. a command and inbound
/// transport data) are not ordered with respect to each other.
#[derive(Default)]
pub struct HookBus {
    registrations: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self
            .registrations()
            .iter()
            .map(|registration| registration.event.clone())
            .collect::<Vec<_>>();

        f.debug_struct("HookBus").field("events", &events).finish()
    }
}

impl HookBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn registrations(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Listen to an event.
    /// Subscribing several times, even with the same event name, gives independent subscriptions.
    pub fn subscribe<F>(&self, event: &str, listener: F) -> HookId
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.registrations().push(Registration {
            id,
            event: event.into(),
            listener: Arc::new(listener),
        });

        trace!(%event, ?id, "Subscribed");
        id
    }

    /// Stop a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: HookId) -> bool {
        let mut registrations = self.registrations();
        let before = registrations.len();

        registrations.retain(|registration| registration.id != id);

        before != registrations.len()
    }

    /// How many subscriptions exist for this event.
    pub fn listeners(&self, event: &str) -> usize {
        self.registrations()
            .iter()
            .filter(|registration| registration.event == event)
            .count()
    }

    /// Deliver the payload to every listener of this event.
    ///
    /// A listener which panics is logged and skipped; the rest still get the event.
    /// Returns how many listeners handled the event without panicking.
    pub fn publish<S: AsRef<str>>(&self, event: &str, data: &[S]) -> usize {
        // Copied so that listeners may subscribe while being called.
        let listeners = self
            .registrations()
            .iter()
            .filter(|registration| registration.event == event)
            .map(|registration| Arc::clone(&registration.listener))
            .collect::<Vec<_>>();

        let data = data
            .iter()
            .map(|item| item.as_ref().to_owned())
            .collect::<Vec<_>>();

        let delivered = listeners
            .iter()
            .filter(|listener| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&data)));
                if outcome.is_err() {
                    warn!(%event, "Hook listener panicked");
                }
                outcome.is_ok()
            })
            .count();

        trace!(%event, %delivered, "Published");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let seen = Arc::new(Mutex::new(vec![]));
        let seen_clone = Arc::clone(&seen);

        let make = move |tag: &str| -> Listener {
            let seen = Arc::clone(&seen_clone);
            let tag = tag.to_owned();
            Arc::new(move |data: &[String]| {
                seen.lock().unwrap().push(format!("{tag}:{}", data.join(",")))
            })
        };

        (seen, make)
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = HookBus::new();
        let (seen, make) = recorder();

        let first = make("first");
        let second = make("second");
        bus.subscribe(names::OPEN, move |data| first(data));
        bus.subscribe(names::OPEN, move |data| second(data));

        assert_eq!(bus.publish(names::OPEN, &["COM1"]), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:COM1".to_owned(), "second:COM1".to_owned()]
        );
    }

    #[test]
    fn other_events_are_not_delivered() {
        let bus = HookBus::new();
        let (seen, make) = recorder();

        let listener = make("open");
        bus.subscribe(names::OPEN, move |data| listener(data));

        assert_eq!(bus.publish(names::CLOSE, &["COM1"]), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let bus = HookBus::new();
        let (seen, make) = recorder();

        bus.subscribe(names::READ, |_| panic!("listener blew up"));
        let listener = make("after");
        bus.subscribe(names::READ, move |data| listener(data));

        assert_eq!(bus.publish(names::READ, &["hi"]), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["after:hi".to_owned()]);
    }

    #[test]
    fn unsubscribe_removes_only_that_subscription() {
        let bus = HookBus::new();

        let a = bus.subscribe(names::WRITE, |_| {});
        let _b = bus.subscribe(names::WRITE, |_| {});

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        assert_eq!(bus.listeners(names::WRITE), 1);
    }

    #[test]
    fn listener_may_subscribe_while_called() {
        let bus = Arc::new(HookBus::new());
        let bus_clone = Arc::clone(&bus);

        bus.subscribe(names::SET, move |_| {
            bus_clone.subscribe(names::OPEN, |_| {});
        });

        bus.publish(names::SET, &["COM1"]);
        assert_eq!(bus.listeners(names::OPEN), 1);
    }
}
