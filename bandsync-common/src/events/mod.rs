//! Change notification system
//!
//! Provides the notification payload types, the `NotificationSource` seam the
//! resync coordinator subscribes through, and the in-process `EventBus` that
//! implements it.

mod notification;

pub use notification::{ChangeAction, ChangeNotification, SyncEvent};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Callback invoked for each notification on a subscribed topic
pub type NotificationHandler = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;

/// Opaque handle returned by [`NotificationSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Publish/subscribe seam for typed change notifications
///
/// Implementations must deliver notifications for a topic in publish order.
/// Handlers may call back into the source (e.g. to unsubscribe).
pub trait NotificationSource: Send + Sync {
    /// Register `handler` for `topic`
    fn subscribe(&self, topic: &str, handler: NotificationHandler) -> SubscriptionId;

    /// Remove a registration; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}

struct Registration {
    id: SubscriptionId,
    topic: String,
    handler: NotificationHandler,
}

/// In-process notification hub
///
/// Two ways to listen:
/// - [`NotificationSource::subscribe`]: per-topic handlers, invoked
///   synchronously on the publishing thread in registration order
/// - [`EventBus::tap`]: a tokio broadcast receiver seeing every event on every
///   topic, for observers that want to consume asynchronously
///
/// # Examples
///
/// ```
/// use bandsync_common::events::{ChangeNotification, EventBus, NotificationSource, SyncEvent};
/// use std::sync::Arc;
///
/// let bus = EventBus::new(100);
/// let _id = bus.subscribe("songs:changed", Arc::new(|n: &ChangeNotification| {
///     assert_eq!(n.band_id.as_deref(), Some("b1"));
/// }));
///
/// let delivered = bus.publish(SyncEvent::new(
///     "songs:changed",
///     ChangeNotification::default().with_band("b1"),
/// ));
/// assert_eq!(delivered, 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
    registrations: Arc<Mutex<Vec<Registration>>>,
}

impl EventBus {
    /// Creates a new EventBus whose broadcast tap buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            capacity,
            registrations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Receive every future event on every topic
    ///
    /// Events published before the tap was created are not received. A slow
    /// receiver sees `RecvError::Lagged` rather than blocking publishers.
    pub fn tap(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publish an event
    ///
    /// Topic handlers run synchronously before this returns; the event is
    /// then offered to taps, ignoring the case where nobody is tapping.
    /// Returns the number of topic handlers invoked.
    pub fn publish(&self, event: SyncEvent) -> usize {
        // Snapshot handlers so they can (un)subscribe without deadlocking
        let handlers: Vec<NotificationHandler> = self
            .registry()
            .iter()
            .filter(|registration| registration.topic == event.topic)
            .map(|registration| Arc::clone(&registration.handler))
            .collect();

        for handler in &handlers {
            handler(&event.notification);
        }

        let _ = self.tx.send(event);
        handlers.len()
    }

    /// Number of topic handler registrations
    pub fn handler_count(&self) -> usize {
        self.registry().len()
    }

    /// Number of live broadcast taps
    pub fn tap_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured tap capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn registry(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSource for EventBus {
    fn subscribe(&self, topic: &str, handler: NotificationHandler) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.registry().push(Registration {
            id,
            topic: topic.to_string(),
            handler,
        });
        debug!("EventBus: subscribed {:?} to '{}'", id, topic);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|registration| registration.id != id);
        if registry.len() == before {
            debug!("EventBus: unsubscribe of unknown {:?} ignored", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: &Arc<AtomicUsize>) -> NotificationHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &ChangeNotification| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.handler_count(), 0);
        assert_eq!(bus.tap_count(), 0);
    }

    #[test]
    fn test_publish_reaches_only_matching_topic() {
        let bus = EventBus::new(10);
        let songs = Arc::new(AtomicUsize::new(0));
        let shows = Arc::new(AtomicUsize::new(0));
        bus.subscribe("songs:changed", counting_handler(&songs));
        bus.subscribe("shows:changed", counting_handler(&shows));

        let delivered = bus.publish(SyncEvent::new("songs:changed", ChangeNotification::default()));

        assert_eq!(delivered, 1);
        assert_eq!(songs.load(Ordering::SeqCst), 1);
        assert_eq!(shows.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new(10);
        let counter = Arc::new(AtomicUsize::new(0));
        let id = bus.subscribe("songs:changed", counting_handler(&counter));

        bus.unsubscribe(id);
        bus.unsubscribe(id);
        bus.publish(SyncEvent::new("songs:changed", ChangeNotification::default()));

        assert_eq!(bus.handler_count(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let bus = EventBus::new(10);
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let bus_in_handler = bus.clone();
        let slot_in_handler = Arc::clone(&slot);
        let id = bus.subscribe(
            "setlists:changed",
            Arc::new(move |_: &ChangeNotification| {
                if let Some(id) = slot_in_handler.lock().unwrap().take() {
                    bus_in_handler.unsubscribe(id);
                }
            }),
        );
        *slot.lock().unwrap() = Some(id);

        bus.publish(SyncEvent::new("setlists:changed", ChangeNotification::default()));
        assert_eq!(bus.handler_count(), 0);
    }

    #[test]
    fn test_tap_sees_every_topic() {
        let bus = EventBus::new(10);
        let mut rx = bus.tap();

        bus.publish(SyncEvent::new(
            "shows:changed",
            ChangeNotification::default().with_record("sh1"),
        ));

        let received = rx.try_recv().expect("tap should receive event");
        assert_eq!(received.topic, "shows:changed");
        assert_eq!(received.notification.record_id.as_deref(), Some("sh1"));
    }

    #[test]
    fn test_publish_without_taps_does_not_panic() {
        let bus = EventBus::new(2);
        for _ in 0..10 {
            bus.publish(SyncEvent::new("songs:changed", ChangeNotification::default()));
        }
        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_notification_wire_shape() {
        let notification = ChangeNotification::default()
            .with_band("b1")
            .with_action(ChangeAction::Delete)
            .with_user("u1");
        let json = serde_json::to_value(&notification).expect("serialize");
        assert_eq!(json["bandId"], "b1");
        assert_eq!(json["action"], "DELETE");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("recordId").is_none());

        let parsed: ChangeNotification =
            serde_json::from_str(r#"{"recordId":"r9"}"#).expect("deserialize");
        assert_eq!(parsed.record_id.as_deref(), Some("r9"));
        assert!(parsed.band_id.is_none());
    }

    #[test]
    fn test_change_action_parse() {
        assert_eq!(ChangeAction::parse("insert"), Some(ChangeAction::Insert));
        assert_eq!(ChangeAction::parse(" DELETE "), Some(ChangeAction::Delete));
        assert_eq!(ChangeAction::parse("UPSERT"), None);
        assert_eq!(ChangeAction::Update.verb(), "updated");
    }
}
