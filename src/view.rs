//! Per-consumer derived view.
//!
//! A [`Toaster`] subscribes to a store, merges its presentation defaults
//! into each notification, and arms the auto-dismiss timers. It also gives
//! the rendering layer its handlers: pause on hover, height measurement
//! and stacking offsets.
//!
//! Timers armed by a toaster are torn down and re-armed on every state
//! change, so they never outlive the snapshot they were computed from.

use crate::options::DefaultOptions;
use crate::state::Command;
use crate::store::Store;
use crate::subscriptions::SubscriptionId;
use crate::timers::TimerId;
use crate::types::{
    duration_millis, Expiry, Notification, NotificationId, NotificationPatch, Position, State,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// Options for [`Toaster::calculate_offset`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetOptions {
    /// Stack newest at the far end instead of next to the anchor.
    pub reverse_order: bool,
    /// Lane for notifications without a position.
    pub default_position: Option<Position>,
}

/// Derived view over a [`Store`] for one consumer.
pub struct Toaster<C> {
    store: Arc<Store<C>>,
    options: DefaultOptions,
    subscription: Mutex<Option<SubscriptionId>>,
    /// Latest state seen from the store.
    snapshot: RwLock<Arc<State<C>>>,
    /// Auto-dismiss timers armed for the current snapshot.
    armed: Mutex<Vec<TimerId>>,
    /// Bumped on every re-arm; fired timers from older rounds are ignored.
    generation: AtomicU64,
    me: Weak<Toaster<C>>,
}

impl<C: Clone + Send + Sync + 'static> Toaster<C> {
    /// Subscribe to `store` and derive from its current state right away.
    pub fn mount(store: &Arc<Store<C>>, options: DefaultOptions) -> Arc<Self> {
        let toaster = Arc::new_cyclic(|me| Self {
            store: Arc::clone(store),
            options,
            subscription: Mutex::new(None),
            snapshot: RwLock::new(store.state()),
            armed: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            me: me.clone(),
        });

        let weak = Arc::downgrade(&toaster);
        store.exclusive(|| {
            let id = store.subscribe(move |state| {
                if let Some(toaster) = weak.upgrade() {
                    toaster.on_change(state);
                }
            });
            *toaster.subscription.lock() = Some(id);
            toaster.on_change(&store.state());
        });

        toaster
    }

    /// Stop listening and clear every armed timer. Idempotent.
    pub fn unmount(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.store.unsubscribe(id);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.disarm();
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn options(&self) -> &DefaultOptions {
        &self.options
    }

    /// Current notifications with this consumer's defaults merged in.
    ///
    /// Every returned notification has its effective `duration` set.
    pub fn notifications(&self) -> Vec<Notification<C>> {
        let snapshot = Arc::clone(&self.snapshot.read());
        snapshot
            .notifications
            .iter()
            .cloned()
            .map(|mut n| {
                self.options.merge_into(&mut n);
                n
            })
            .collect()
    }

    pub fn is_paused(&self) -> bool {
        self.snapshot.read().is_paused()
    }

    /// Number of auto-dismiss timers currently armed by this view.
    pub fn armed_timers(&self) -> usize {
        self.armed.lock().len()
    }

    // --- Handlers ---

    /// Freeze every countdown (e.g. pointer entered the container).
    pub fn pause(&self) {
        self.store.dispatch(Command::Pause(self.store.now()));
    }

    /// Resume countdowns. Does nothing unless currently paused.
    pub fn unpause(&self) {
        if self.store.state().is_paused() {
            self.store.dispatch(Command::Unpause(self.store.now()));
        }
    }

    pub fn dismiss(&self, id: impl Into<NotificationId>) {
        self.store.dispatch(Command::Dismiss(Some(id.into())));
    }

    pub fn remove(&self, id: impl Into<NotificationId>) {
        self.store.dispatch(Command::Remove(Some(id.into())));
    }

    /// Record the measured height of a rendered notification.
    pub fn update_height(&self, id: impl Into<NotificationId>, height: u32) {
        self.store
            .dispatch(Command::Update(NotificationPatch::new(id.into()).with_height(height)));
    }

    /// Pixel offset of a notification within its lane.
    ///
    /// Sums the heights of the visible, measured notifications in the same
    /// lane that come before it (or after it, with `reverse_order`).
    /// Unknown ids get 0.
    pub fn calculate_offset(&self, id: &NotificationId, options: &OffsetOptions) -> u32 {
        stacking_offset(&self.notifications(), id, options)
    }

    // --- Expiry scheduling ---

    fn on_change(&self, state: &Arc<State<C>>) {
        *self.snapshot.write() = Arc::clone(state);

        // Locks are released before dispatching: a dispatch from here may
        // run a full drain and call back into this view.
        let overdue = self.rearm(state);
        for id in overdue {
            self.store.dispatch(Command::Dismiss(Some(id)));
        }
    }

    /// Replace the armed timers with ones for `state`.
    ///
    /// Returns visible notifications whose time already ran out.
    fn rearm(&self, state: &State<C>) -> Vec<NotificationId> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let scheduler = self.store.scheduler();

        let mut armed = self.armed.lock();
        for timer in armed.drain(..) {
            scheduler.cancel(timer);
        }

        if state.is_paused() || !self.is_mounted() {
            return Vec::new();
        }

        let now = self.store.now();
        let mut overdue = Vec::new();

        for n in state.notifications.iter().filter(|n| n.visible) {
            let Expiry::After(duration) = self.options.effective_duration(n) else {
                continue;
            };

            let remaining = duration_millis(duration)
                .saturating_add(duration_millis(n.pause_duration))
                .saturating_sub(now.millis_since(n.created_at));

            if remaining < 0 {
                overdue.push(n.id.clone());
                continue;
            }

            let toaster = self.me.clone();
            let id = n.id.clone();
            trace!(id = %id, remaining_ms = remaining, "Auto-dismiss armed");
            let timer = scheduler.schedule(
                Duration::from_millis(remaining as u64),
                Box::new(move || {
                    if let Some(toaster) = toaster.upgrade() {
                        toaster.expire(generation, id);
                    }
                }),
            );
            armed.push(timer);
        }

        overdue
    }

    fn expire(&self, generation: u64, id: NotificationId) {
        self.store.exclusive(|| {
            if self.generation.load(Ordering::SeqCst) == generation {
                self.store.dispatch(Command::Dismiss(Some(id)));
            }
        });
    }

    fn disarm(&self) {
        let scheduler = self.store.scheduler();
        for timer in self.armed.lock().drain(..) {
            scheduler.cancel(timer);
        }
    }
}

impl<C> Drop for Toaster<C> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.get_mut().take() {
            self.store.unsubscribe(id);
        }
        let scheduler = self.store.scheduler();
        for timer in self.armed.get_mut().drain(..) {
            scheduler.cancel(timer);
        }
    }
}

/// Offset of `id` within its lane of `notifications`.
fn stacking_offset<C>(
    notifications: &[Notification<C>],
    id: &NotificationId,
    options: &OffsetOptions,
) -> u32 {
    let Some(target) = notifications.iter().find(|n| &n.id == id) else {
        return 0;
    };
    let lane = target.position.or(options.default_position);

    let relevant: Vec<&Notification<C>> = notifications
        .iter()
        .filter(|n| n.position.or(options.default_position) == lane && n.height.is_some())
        .collect();

    // An unmeasured target sits at the front of its lane
    let before = relevant
        .iter()
        .position(|n| &n.id == id)
        .map_or(0, |index| relevant[..index].iter().filter(|n| n.visible).count());

    let heights = relevant
        .iter()
        .filter(|n| n.visible)
        .map(|n| n.height.unwrap_or(0));

    if options.reverse_order {
        heights.skip(before + 1).sum()
    } else {
        heights.take(before).sum()
    }
}
