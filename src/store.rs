//! Main Store struct tying reducer, timers and subscribers together.

use crate::error::{HeraldError, Result};
use crate::state::{apply_command, Command, Effect, Transition};
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::timers::{Scheduler, TimeoutCoordinator};
use crate::types::{NotificationId, State, Timestamp};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Store configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Max active notifications. Adding beyond this evicts the oldest.
    pub limit: usize,

    /// Grace delay between dismissal and automatic removal.
    #[serde(rename = "removal_delay_ms", with = "millis")]
    pub removal_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            removal_delay: Duration::from_millis(1000),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(HeraldError::InvalidConfig(
                "limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Commands waiting to be applied.
struct DispatchQueue<C> {
    pending: VecDeque<Command<C>>,
    /// Set while some frame on the gate-holding thread is draining.
    draining: bool,
}

/// Resets the drain flag even if a subscriber panics.
///
/// Commands still queued after a panic stay queued and are applied, in
/// order, by the next dispatch.
struct DrainGuard<'a, C> {
    queue: &'a Mutex<DispatchQueue<C>>,
}

impl<C> Drop for DrainGuard<'_, C> {
    fn drop(&mut self) {
        let mut queue = self.queue.lock();
        queue.draining = false;
        if !queue.pending.is_empty() {
            warn!(
                queued = queue.pending.len(),
                "Drain interrupted, commands deferred to next dispatch"
            );
        }
    }
}

/// The notification store.
///
/// Holds the single authoritative [`State`], the subscriber list and the
/// pending-removal timers. All mutation goes through [`dispatch`](Self::dispatch).
///
/// Dispatch is serialized: callers on other threads wait for the current
/// drain to finish, and a subscriber that dispatches while being notified
/// has its command queued and applied right after the current broadcast.
pub struct Store<C> {
    /// Store configuration.
    config: StoreConfig,

    /// Current state; replaced wholesale on every transition.
    state: RwLock<Arc<State<C>>>,

    /// Serializes dispatchers across threads; re-entrant for subscribers.
    gate: ReentrantMutex<()>,

    queue: Mutex<DispatchQueue<C>>,

    subscriptions: SubscriptionManager<C>,

    /// Pending purges after dismissal.
    timeouts: TimeoutCoordinator,

    scheduler: Arc<dyn Scheduler>,

    /// Counter for generated notification ids.
    next_id: AtomicU64,

    me: Weak<Store<C>>,
}

impl<C: Clone + Send + Sync + 'static> Store<C> {
    /// Create a store with the given config and timer source.
    pub fn new(config: StoreConfig, scheduler: Arc<dyn Scheduler>) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Self::build(config, scheduler))
    }

    /// Create a store with the default config.
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Self::build(StoreConfig::default(), scheduler)
    }

    fn build(config: StoreConfig, scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            timeouts: TimeoutCoordinator::new(Arc::clone(&scheduler), config.removal_delay),
            config,
            state: RwLock::new(Arc::new(State::new())),
            gate: ReentrantMutex::new(()),
            queue: Mutex::new(DispatchQueue {
                pending: VecDeque::new(),
                draining: false,
            }),
            subscriptions: SubscriptionManager::new(),
            scheduler,
            next_id: AtomicU64::new(1),
            me: me.clone(),
        })
    }

    // --- Dispatch ---

    /// Apply a command and broadcast the resulting state.
    ///
    /// From outside a broadcast this returns only after the command (and
    /// anything subscribers dispatched in response) has been applied and
    /// broadcast. From inside a broadcast the command is queued.
    pub fn dispatch(&self, command: Command<C>) {
        let _gate = self.gate.lock();

        {
            let mut queue = self.queue.lock();
            queue.pending.push_back(command);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        let _drain = DrainGuard { queue: &self.queue };
        loop {
            let next = self.queue.lock().pending.pop_front();
            match next {
                Some(command) => self.apply(command),
                None => break,
            }
        }
    }

    fn apply(&self, command: Command<C>) {
        let name = command.name();
        let current = self.state();
        let Transition { state, effects } = apply_command(&current, command, self.config.limit);

        let state = Arc::new(state);
        *self.state.write() = Arc::clone(&state);

        for effect in effects {
            match effect {
                Effect::ScheduleRemoval(id) => {
                    self.schedule_removal(&id);
                }
                Effect::CancelRemoval(id) => {
                    self.timeouts.cancel_removal(&id);
                }
            }
        }

        debug!(
            command = name,
            active = state.len(),
            paused = state.is_paused(),
            "Command applied"
        );

        self.subscriptions.broadcast(&state);
    }

    fn schedule_removal(&self, id: &NotificationId) -> bool {
        let store = self.me.clone();
        self.timeouts.schedule_removal(id, move |ticket| {
            let Some(store) = store.upgrade() else {
                return;
            };
            store.exclusive(|| {
                if store.timeouts.claim(&ticket) {
                    store.dispatch(Command::Remove(Some(ticket.id.clone())));
                }
            });
        })
    }

    // --- Subscriptions ---

    /// Register a callback invoked with every new state.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Arc<State<C>>) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(listener)
    }

    /// Register a channel subscriber.
    pub fn subscribe_channel(&self, config: SubscriptionConfig) -> SubscriptionHandle<C> {
        let _gate = self.gate.lock();
        let handle = self.subscriptions.subscribe_channel(&config);
        if config.replay_current {
            self.subscriptions.send_to(handle.id, &self.state());
        }
        handle
    }
}

impl<C> Store<C> {
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Current time on the store's clock.
    pub fn now(&self) -> Timestamp {
        self.scheduler.now()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Arc<State<C>> {
        Arc::clone(&self.state.read())
    }

    /// Fresh id for a notification the caller did not name.
    pub fn generate_id(&self) -> NotificationId {
        NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    /// Run `f` while holding the dispatch gate.
    ///
    /// Timer callbacks use this to re-check their validity and dispatch
    /// without another dispatcher slipping in between.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _gate = self.gate.lock();
        f()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    // --- Removal Timers ---

    pub fn is_removal_scheduled(&self, id: &NotificationId) -> bool {
        self.timeouts.is_scheduled(id)
    }

    /// Number of notifications waiting for their purge.
    pub fn pending_removals(&self) -> usize {
        self.timeouts.pending_count()
    }
}
