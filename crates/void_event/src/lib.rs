//! # void_event - Typed Event Delivery
//!
//! Two small pieces used to decouple event producers from consumers:
//! - [`EventChannel`]: a thread-safe FIFO one consumer drains at its own pace
//! - [`Subscribers`]: a publisher-side list of sinks, each addressed by a
//!   [`SubscriberId`] so it can be removed again
//!
//! A sink is either a channel (held weakly, so a dropped consumer is
//! pruned on the next publish) or a callback.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Trait for events
pub trait Event: Clone + Send + Sync + 'static {}

// Blanket implementation
impl<T: Clone + Send + Sync + 'static> Event for T {}

/// Event handler function type
pub type EventHandler<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

/// Channel for single-type events
pub struct EventChannel<E: Event> {
    queue: Mutex<VecDeque<E>>,
}

impl<E: Event> EventChannel<E> {
    /// Create a new channel
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a channel ready to be shared with a publisher
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Send an event
    pub fn send(&self, event: E) {
        self.queue.lock().push_back(event);
    }

    /// Receive the oldest event
    pub fn receive(&self) -> Option<E> {
        self.queue.lock().pop_front()
    }

    /// Drain all events in arrival order
    pub fn drain(&self) -> Vec<E> {
        self.queue.lock().drain(..).collect()
    }

    /// Drop pending events
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Get pending count
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

impl<E: Event> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

enum Sink<E: Event> {
    Channel(Weak<EventChannel<E>>),
    Handler(EventHandler<E>),
}

/// Publisher-side subscriber list
pub struct Subscribers<E: Event> {
    sinks: Vec<(SubscriberId, Sink<E>)>,
    next_id: u64,
}

impl<E: Event> Subscribers<E> {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Deliver future events into `channel`
    pub fn subscribe(&mut self, channel: &Arc<EventChannel<E>>) -> SubscriberId {
        let id = self.allocate();
        self.sinks.push((id, Sink::Channel(Arc::downgrade(channel))));
        id
    }

    /// Call `handler` for every future event
    pub fn subscribe_fn<F>(&mut self, handler: F) -> SubscriberId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.sinks.push((id, Sink::Handler(Box::new(handler))));
        id
    }

    /// Remove a subscriber. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sub_id, _)| *sub_id != id);
        before != self.sinks.len()
    }

    /// Deliver `event` to every live subscriber in subscription order
    pub fn publish(&mut self, event: &E) {
        let mut dropped = false;
        for (_, sink) in &self.sinks {
            match sink {
                Sink::Channel(weak) => match weak.upgrade() {
                    Some(channel) => channel.send(event.clone()),
                    None => dropped = true,
                },
                Sink::Handler(handler) => handler(event),
            }
        }
        if dropped {
            self.sinks.retain(|(_, sink)| match sink {
                Sink::Channel(weak) => weak.strong_count() > 0,
                Sink::Handler(_) => true,
            });
            log::trace!("pruned dropped event channels, {} subscribers left", self.sinks.len());
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn clear(&mut self) {
        self.sinks.clear();
    }
}

impl<E: Event> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> std::fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.sinks.len())
            .finish()
    }
}

/// Prelude
pub mod prelude {
    pub use crate::{Event, EventChannel, EventHandler, SubscriberId, Subscribers};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct TestEvent(i32);

    #[test]
    fn test_event_channel() {
        let channel: EventChannel<TestEvent> = EventChannel::new();

        channel.send(TestEvent(1));
        channel.send(TestEvent(2));
        channel.send(TestEvent(3));

        let events = channel.drain();
        assert_eq!(events, vec![TestEvent(1), TestEvent(2), TestEvent(3)]);
        assert!(channel.is_empty());
    }

    #[test]
    fn test_publish_reaches_channel_and_handler() {
        let mut subs = Subscribers::new();
        let channel = EventChannel::shared();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        subs.subscribe(&channel);
        subs.subscribe_fn(move |_: &TestEvent| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        subs.publish(&TestEvent(42));

        assert_eq!(channel.receive(), Some(TestEvent(42)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut subs = Subscribers::new();
        let channel = EventChannel::shared();
        let id = subs.subscribe(&channel);

        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        subs.publish(&TestEvent(7));
        assert!(channel.is_empty());
    }

    #[test]
    fn test_dropped_channel_is_pruned() {
        let mut subs = Subscribers::new();
        {
            let channel = EventChannel::shared();
            subs.subscribe(&channel);
        }
        assert_eq!(subs.len(), 1);
        subs.publish(&TestEvent(1));
        assert!(subs.is_empty());
    }
}
