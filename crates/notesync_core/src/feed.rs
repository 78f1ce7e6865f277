//! Live feeds for observing appended events and changing state.
//!
//! Two shapes are provided:
//! - [`ChangeFeed`] distributes every emitted item, in emit order, to all
//!   subscribers. Event stores use it for `event_updates`.
//! - [`StateFeed`] holds a current value, replays it to new subscribers and
//!   only publishes values that differ from the current one.
//!
//! # Usage
//!
//! ```rust
//! use notesync_core::ChangeFeed;
//!
//! let feed = ChangeFeed::new();
//! let receiver = feed.subscribe();
//! feed.emit(42u64);
//! assert_eq!(receiver.recv().unwrap(), 42);
//! ```

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// A fan-out feed of items.
///
/// The feed:
/// - Preserves emit order per subscriber
/// - Supports multiple subscribers
/// - Drops subscribers whose receiver was dropped
pub struct ChangeFeed<T: Clone> {
    subscribers: RwLock<Vec<Sender<T>>>,
}

impl<T: Clone> ChangeFeed<T> {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to the feed.
    ///
    /// The receiver gets every item emitted after this call. It is
    /// unbounded, so it should be drained regularly.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an item to all subscribers.
    pub fn emit(&self, item: T) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(item.clone()).is_ok());
    }

    /// Emits several items in order.
    pub fn emit_batch(&self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.emit(item);
        }
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<T: Clone> Default for ChangeFeed<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A current value plus a feed of its changes.
///
/// Updates run under one lock, so concurrent updaters are linearized and
/// subscribers observe values in the order they were stored.
pub struct StateFeed<T: Clone + PartialEq> {
    inner: RwLock<StateInner<T>>,
}

struct StateInner<T> {
    current: T,
    subscribers: Vec<Sender<T>>,
}

impl<T: Clone + PartialEq> StateFeed<T> {
    /// Creates a feed holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            inner: RwLock::new(StateInner {
                current: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.inner.read().current.clone()
    }

    /// Subscribes to the feed. The current value is delivered first.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.inner.write();
        if tx.send(inner.current.clone()).is_ok() {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Replaces the current value. Returns true if it changed.
    pub fn publish(&self, value: T) -> bool {
        self.update(|_| value).1
    }

    /// Computes a new value from the current one and stores it if it
    /// differs. Returns the stored value and whether it changed.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> (T, bool) {
        let mut inner = self.inner.write();
        let next = f(&inner.current);
        if next == inner.current {
            return (next, false);
        }
        inner.current = next.clone();
        inner
            .subscribers
            .retain(|tx| tx.send(next.clone()).is_ok());
        (next, true)
    }
}

impl<T: Clone + PartialEq + Default> Default for StateFeed<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn change_feed_fifo() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        feed.emit_batch([1, 2, 3]);

        let received: Vec<i32> = rx.try_iter().collect();
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[test]
    fn change_feed_multiple_subscribers() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        feed.emit("a");

        assert_eq!(rx1.recv().unwrap(), "a");
        assert_eq!(rx2.recv().unwrap(), "a");
    }

    #[test]
    fn change_feed_drops_disconnected() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit(1);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn change_feed_only_future_items() {
        let feed = ChangeFeed::new();
        feed.emit(1);
        let rx = feed.subscribe();
        feed.emit(2);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn state_feed_replays_current() {
        let feed = StateFeed::new(BTreeSet::<String>::new());
        let rx = feed.subscribe();
        assert_eq!(rx.recv().unwrap(), BTreeSet::new());
    }

    #[test]
    fn state_feed_publishes_only_changes() {
        let feed = StateFeed::new(0);
        let rx = feed.subscribe();

        assert!(feed.publish(1));
        assert!(!feed.publish(1));
        assert!(feed.publish(2));

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(feed.get(), 2);
    }

    #[test]
    fn state_feed_update() {
        let feed = StateFeed::new(vec![1]);
        let (value, changed) = feed.update(|v| {
            let mut next = v.clone();
            next.push(2);
            next
        });
        assert!(changed);
        assert_eq!(value, vec![1, 2]);

        let (_, changed) = feed.update(|v| v.clone());
        assert!(!changed);
    }
}
