//! Publish/subscribe channel contract and its in-process implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// An event as delivered to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

/// Exact-match predicate over one key of an object payload.
///
/// # Example
///
/// ```rust
/// use framestate::events::EventFilter;
/// use serde_json::json;
///
/// let filter = EventFilter::new("target", json!("door"));
/// assert!(filter.matches(&json!({ "target": "door", "force": 3 })));
/// assert!(!filter.matches(&json!({ "target": "window" })));
/// assert!(!filter.matches(&json!("door")));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub key: String,
    pub value: Value,
}

impl EventFilter {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, payload: &Value) -> bool {
        payload.get(&self.key) == Some(&self.value)
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked for each delivered event.
pub type EventCallback = Rc<dyn Fn(&Event)>;

/// The capability the runtime needs from a publish/subscribe bus.
///
/// Graphs and machines use [`EventChannel`] as their scoped channel; a host
/// can inject its own global bus wherever an `EventBus` is accepted.
pub trait EventBus {
    /// Register `callback` for `topic`, optionally restricted by `filter`.
    fn subscribe(
        &self,
        topic: &str,
        filter: Option<EventFilter>,
        callback: EventCallback,
    ) -> SubscriptionId;

    /// Remove a subscription. Returns whether it existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Deliver `payload` to every matching subscriber, synchronously.
    fn publish(&self, topic: &str, payload: &Value);
}

struct Subscription {
    id: SubscriptionId,
    topic: String,
    filter: Option<EventFilter>,
    callback: EventCallback,
}

/// Synchronous in-process [`EventBus`].
///
/// Delivery is direct: a subscriber that publishes from inside its callback
/// has that event delivered before its own `publish` returns. The
/// subscriber list is snapshotted per publish, so callbacks may subscribe or
/// unsubscribe while an event is being delivered: a subscription added
/// mid-delivery sees the next event, one removed mid-delivery is skipped.
///
/// # Example
///
/// ```rust
/// use framestate::events::{Event, EventBus, EventChannel};
/// use serde_json::json;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let channel = EventChannel::new("hud");
/// let hits = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&hits);
/// channel.subscribe("damage", None, Rc::new(move |_: &Event| counter.set(counter.get() + 1)));
///
/// channel.publish("damage", &json!({ "amount": 4 }));
/// channel.publish("heal", &json!({ "amount": 4 }));
/// assert_eq!(hits.get(), 1);
/// ```
pub struct EventChannel {
    name: String,
    next_id: Cell<u64>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl EventChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: Cell::new(0),
            subscriptions: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow().iter().any(|s| s.id == id)
    }

    pub fn clear(&self) {
        self.subscriptions.borrow_mut().clear();
    }
}

impl EventBus for EventChannel {
    fn subscribe(
        &self,
        topic: &str,
        filter: Option<EventFilter>,
        callback: EventCallback,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            topic: topic.to_string(),
            filter,
            callback,
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    fn publish(&self, topic: &str, payload: &Value) {
        let targets: Vec<(SubscriptionId, EventCallback)> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.topic == topic)
            .filter(|s| s.filter.as_ref().map_or(true, |f| f.matches(payload)))
            .map(|s| (s.id, Rc::clone(&s.callback)))
            .collect();

        if targets.is_empty() {
            return;
        }

        log::trace!(
            "channel '{}' delivering '{}' to {} subscriber(s)",
            self.name,
            topic,
            targets.len()
        );
        let event = Event {
            topic: topic.to_string(),
            payload: payload.clone(),
        };
        for (id, callback) in targets {
            if self.is_subscribed(id) {
                callback(&event);
            }
        }
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
