//! Pending-removal bookkeeping.
//!
//! Maps notification ids to the purge timer armed for them. At most one
//! purge is pending per id; scheduling again for the same id is a no-op.

use super::scheduler::{Scheduler, TimerId};
use crate::types::NotificationId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Proof that a purge timer fired. Redeemed with
/// [`TimeoutCoordinator::claim`] before the removal is carried out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovalTicket {
    pub id: NotificationId,
    token: u64,
}

struct PendingRemoval {
    token: u64,
    timer: TimerId,
}

/// Schedules and cancels delayed removals, keyed by notification id.
pub struct TimeoutCoordinator {
    scheduler: Arc<dyn Scheduler>,
    /// Grace delay between dismissal and removal.
    delay: Duration,
    pending: Mutex<HashMap<NotificationId, PendingRemoval>>,
    next_token: AtomicU64,
}

impl TimeoutCoordinator {
    pub fn new(scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        Self {
            scheduler,
            delay,
            pending: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm a purge timer for `id` unless one is already pending.
    ///
    /// When the timer fires, `purge` receives a ticket; the caller must
    /// [`claim`](Self::claim) it before removing anything, so that a
    /// cancellation racing with the firing wins.
    ///
    /// Returns true if a new timer was armed.
    pub fn schedule_removal<F>(&self, id: &NotificationId, purge: F) -> bool
    where
        F: FnOnce(RemovalTicket) + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if pending.contains_key(id) {
            trace!(id = %id, "Removal already scheduled");
            return false;
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let ticket = RemovalTicket {
            id: id.clone(),
            token,
        };
        let timer = self
            .scheduler
            .schedule(self.delay, Box::new(move || purge(ticket)));

        pending.insert(id.clone(), PendingRemoval { token, timer });
        debug!(id = %id, delay_ms = self.delay.as_millis() as u64, "Removal scheduled");
        true
    }

    /// Cancel the pending purge for `id`, if any.
    pub fn cancel_removal(&self, id: &NotificationId) -> bool {
        let removed = self.pending.lock().remove(id);
        match removed {
            Some(entry) => {
                self.scheduler.cancel(entry.timer);
                debug!(id = %id, "Removal cancelled");
                true
            }
            None => false,
        }
    }

    /// Redeem a fired ticket.
    ///
    /// Succeeds only if the ticket's timer is still the one on record for
    /// its id, and clears that record.
    pub fn claim(&self, ticket: &RemovalTicket) -> bool {
        let mut pending = self.pending.lock();
        match pending.get(&ticket.id) {
            Some(entry) if entry.token == ticket.token => {
                pending.remove(&ticket.id);
                true
            }
            _ => false,
        }
    }

    pub fn is_scheduled(&self, id: &NotificationId) -> bool {
        self.pending.lock().contains_key(id)
    }

    /// Number of ids with a pending purge.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
