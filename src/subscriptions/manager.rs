//! Subscription manager for broadcasting state changes.

use crate::types::State;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use super::types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// Callback invoked with every new state.
pub type Listener<C> = Arc<dyn Fn(&Arc<State<C>>) + Send + Sync>;

enum Sink<C> {
    Callback(Listener<C>),
    Channel(Sender<StoreEvent<C>>),
}

/// Internal subscription state.
struct Subscription<C> {
    sink: Sink<C>,
}

impl<C> Subscription<C> {
    /// Deliver a state. Returns the drop reason if the subscriber must go.
    fn deliver(&self, state: &Arc<State<C>>) -> Option<DropReason> {
        match &self.sink {
            Sink::Callback(listener) => {
                listener(state);
                None
            }
            Sink::Channel(sender) => match sender.try_send(StoreEvent::Changed {
                state: Arc::clone(state),
            }) {
                Ok(()) => None,
                Err(TrySendError::Full(_)) => Some(DropReason::BufferOverflow),
                Err(TrySendError::Disconnected(_)) => Some(DropReason::Disconnected),
            },
        }
    }

    fn notify_dropped(&self, reason: DropReason) {
        if let Sink::Channel(sender) = &self.sink {
            // Best effort: the buffer may still be full
            let _ = sender.try_send(StoreEvent::Dropped { reason });
        }
    }
}

/// Manages subscribers and broadcasts states to them in subscription order.
pub struct SubscriptionManager<C> {
    /// Active subscriptions, ordered by id (= subscription order).
    subscriptions: RwLock<BTreeMap<SubscriptionId, Arc<Subscription<C>>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl<C> SubscriptionManager<C> {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&self, sink: Sink<C>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscriptions
            .write()
            .insert(id, Arc::new(Subscription { sink }));
        id
    }

    /// Register a callback.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Arc<State<C>>) + Send + Sync + 'static,
    {
        self.insert(Sink::Callback(Arc::new(listener)))
    }

    /// Register a bounded channel. Slow receivers are dropped.
    pub fn subscribe_channel(&self, config: &SubscriptionConfig) -> SubscriptionHandle<C> {
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        let id = self.insert(Sink::Channel(sender));
        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.write().remove(&id);
        match removed {
            Some(sub) => {
                sub.notify_dropped(DropReason::Unsubscribed);
                true
            }
            None => false,
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Send a state to one subscription only (used for replay on subscribe).
    pub fn send_to(&self, id: SubscriptionId, state: &Arc<State<C>>) -> bool {
        let sub = self.subscriptions.read().get(&id).cloned();
        match sub {
            Some(sub) => sub.deliver(state).is_none(),
            None => false,
        }
    }

    /// Deliver `state` to every subscriber.
    ///
    /// Works on a snapshot of the subscriber list, so listeners may
    /// subscribe or unsubscribe while being called. Channel subscribers
    /// that cannot keep up are dropped.
    pub fn broadcast(&self, state: &Arc<State<C>>) {
        let snapshot: Vec<(SubscriptionId, Arc<Subscription<C>>)> = self
            .subscriptions
            .read()
            .iter()
            .map(|(id, sub)| (*id, Arc::clone(sub)))
            .collect();

        let mut to_remove = Vec::new();
        for (id, sub) in snapshot {
            if let Some(reason) = sub.deliver(state) {
                to_remove.push((id, reason));
            }
        }

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for (id, reason) in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    warn!(subscription = id.0, ?reason, "Dropping subscriber");
                    sub.notify_dropped(reason);
                }
            }
        }
    }
}

impl<C> Default for SubscriptionManager<C> {
    fn default() -> Self {
        Self::new()
    }
}
