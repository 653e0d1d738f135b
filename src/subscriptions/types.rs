//! Subscription types for live state updates.

use crate::error::HeraldError;
use crate::types::State;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for a channel subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 256
    pub buffer_size: usize,

    /// Deliver the current state as the first event.
    pub replay_current: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            replay_current: false,
        }
    }
}

/// Events delivered to channel subscribers.
#[derive(Clone, Debug)]
pub enum StoreEvent<C> {
    /// The store moved to a new state.
    Changed { state: Arc<State<C>> },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiver went away.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Handle to receive state changes over a channel.
pub struct SubscriptionHandle<C> {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent<C>>,
}

impl<C> SubscriptionHandle<C> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent<C>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent<C>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent<C>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Block until the next state arrives.
    ///
    /// Fails once the subscription has been dropped or the store is gone.
    pub fn next_state(&self) -> crate::Result<Arc<State<C>>> {
        match self.receiver.recv() {
            Ok(StoreEvent::Changed { state }) => Ok(state),
            Ok(StoreEvent::Dropped { .. }) | Err(_) => Err(HeraldError::SubscriptionDropped),
        }
    }

    /// Drain every event currently buffered.
    pub fn drain(&self) -> Vec<StoreEvent<C>> {
        self.receiver.try_iter().collect()
    }
}
