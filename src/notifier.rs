//! Caller-facing API: emit, dismiss, remove and outcome tracking.

use crate::error::Result;
use crate::options::{DefaultOptions, ToastOptions};
use crate::state::Command;
use crate::store::Store;
use crate::timers::ThreadScheduler;
use crate::types::{Kind, Notification, NotificationId};
use crate::view::Toaster;
use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Contents shown while an operation runs and once it settles.
#[derive(Clone, Debug)]
pub struct OutcomeContents<C> {
    pub loading: C,
    pub success: C,
    pub error: C,
}

/// Emits notifications into a [`Store`].
pub struct Notifier<C> {
    store: Arc<Store<C>>,
}

impl<C> Clone for Notifier<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<C: Clone + Send + Sync + 'static> Notifier<C> {
    pub fn new(store: Arc<Store<C>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store<C>> {
        &self.store
    }

    /// Mount a view over this notifier's store.
    pub fn mount(&self, options: DefaultOptions) -> Arc<Toaster<C>> {
        Toaster::mount(&self.store, options)
    }

    /// Create or replace a notification and return its id.
    ///
    /// Without an id in `options` a fresh one is generated. With a known
    /// id the existing entry is updated in place and, since it keeps its
    /// creation time, its duration is extended by the time it has already
    /// been counting down. The replacement is shown for its full duration.
    pub fn emit(&self, content: C, kind: Kind, options: &ToastOptions) -> NotificationId {
        self.store.exclusive(|| {
            let mut notification = self.create(content, kind, options);
            let id = notification.id.clone();

            let served = self.store.state().active_time(&id, self.store.now());
            if let Some(served) = served.filter(|served| !served.is_zero()) {
                let base = notification.duration.unwrap_or_else(|| kind.default_expiry());
                notification.duration = Some(base.extended_by(served));
            }

            self.store.dispatch(Command::Upsert(notification));
            id
        })
    }

    pub fn info(&self, content: C, options: &ToastOptions) -> NotificationId {
        self.emit(content, Kind::Info, options)
    }

    pub fn success(&self, content: C, options: &ToastOptions) -> NotificationId {
        self.emit(content, Kind::Success, options)
    }

    pub fn error(&self, content: C, options: &ToastOptions) -> NotificationId {
        self.emit(content, Kind::Error, options)
    }

    pub fn loading(&self, content: C, options: &ToastOptions) -> NotificationId {
        self.emit(content, Kind::Loading, options)
    }

    pub fn dismiss(&self, id: impl Into<NotificationId>) {
        self.store.dispatch(Command::Dismiss(Some(id.into())));
    }

    pub fn dismiss_all(&self) {
        self.store.dispatch(Command::Dismiss(None));
    }

    pub fn remove(&self, id: impl Into<NotificationId>) {
        self.store.dispatch(Command::Remove(Some(id.into())));
    }

    pub fn remove_all(&self) {
        self.store.dispatch(Command::Remove(None));
    }

    fn create(&self, content: C, kind: Kind, options: &ToastOptions) -> Notification<C> {
        let id = options
            .id
            .clone()
            .filter(|id| !id.as_str().is_empty())
            .unwrap_or_else(|| self.store.generate_id());

        let mut notification = Notification::new(id, kind, content, self.store.now());
        notification.duration = options.duration;
        notification.position = options.position;
        notification.class_name = options.class_name.clone();
        if let Some(aria) = options.aria {
            notification.aria = aria;
        }
        notification
    }

    /// Show a loading notification while `operation` runs, then replace it
    /// with the success or error content under the same id.
    ///
    /// The operation's result is handed back untouched, errors included.
    /// A failure while updating the notification is logged and never
    /// reaches the caller.
    pub async fn track_outcome<F, T, E>(
        &self,
        operation: F,
        contents: OutcomeContents<C>,
        options: &DefaultOptions,
    ) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        let OutcomeContents {
            loading,
            success,
            error,
        } = contents;

        let id = self.loading(loading, &options.resolve(Kind::Loading));

        let result = operation.await;

        let (kind, content) = match &result {
            Ok(_) => (Kind::Success, success),
            Err(_) => (Kind::Error, error),
        };

        let mut settled = options.resolve(kind);
        settled.id = Some(id.clone());

        let emitted = catch_unwind(AssertUnwindSafe(|| self.emit(content, kind, &settled)));
        match emitted {
            Ok(_) => debug!(id = %id, outcome = %kind, "Tracked operation settled"),
            Err(_) => warn!(id = %id, outcome = %kind, "Failed to update tracked notification"),
        }

        result
    }

    /// Like [`track_outcome`](Self::track_outcome), but a failed operation
    /// is logged and absorbed instead of returned.
    pub async fn track_outcome_quiet<F, T, E>(
        &self,
        operation: F,
        contents: OutcomeContents<C>,
        options: &DefaultOptions,
    ) -> Option<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        match self.track_outcome(operation, contents, options).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Tracked operation failed");
                None
            }
        }
    }
}

static GLOBAL: OnceLock<Notifier<String>> = OnceLock::new();

/// Process-wide notifier, created on first use.
///
/// Backed by a wall-clock [`ThreadScheduler`] and the default config.
/// Lives until the process exits.
pub fn global() -> Result<&'static Notifier<String>> {
    if let Some(notifier) = GLOBAL.get() {
        return Ok(notifier);
    }

    let scheduler = Arc::new(ThreadScheduler::new()?);
    let notifier = Notifier::new(Store::with_scheduler(scheduler));
    Ok(GLOBAL.get_or_init(|| notifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use crate::timers::{ManualScheduler, Scheduler};
    use crate::types::{AriaLive, AriaProps, AriaRole, Expiry, Position, Timestamp};
    use futures::executor::block_on;
    use std::time::Duration;

    fn test_notifier() -> (Arc<ManualScheduler>, Notifier<String>) {
        let clock = Arc::new(ManualScheduler::new(Timestamp(10_000)));
        let store = Store::new(StoreConfig::default(), clock.clone()).unwrap();
        (clock, Notifier::new(store))
    }

    #[test]
    fn test_emit_creates_visible_notification() {
        let (_clock, notifier) = test_notifier();
        let id = notifier.success("Saved".to_string(), &ToastOptions::default());

        let state = notifier.store().state();
        let n = state.get(&id).unwrap();
        assert_eq!(n.kind, Kind::Success);
        assert_eq!(n.content, "Saved");
        assert!(n.visible);
        assert_eq!(n.created_at, Timestamp(10_000));
        assert_eq!(n.aria, AriaProps::default());
    }

    #[test]
    fn test_emit_applies_options() {
        let (_clock, notifier) = test_notifier();
        let aria = AriaProps {
            role: AriaRole::Alert,
            live: AriaLive::Assertive,
        };
        let options = ToastOptions::new()
            .with_id("upload")
            .with_duration(Expiry::from_millis(900))
            .with_position(Position::TopLeft)
            .with_aria(aria)
            .with_class_name("wide");

        let id = notifier.error("Boom".to_string(), &options);
        assert_eq!(id, NotificationId::from("upload"));

        let state = notifier.store().state();
        let n = state.get(&id).unwrap();
        assert_eq!(n.duration, Some(Expiry::from_millis(900)));
        assert_eq!(n.position, Some(Position::TopLeft));
        assert_eq!(n.aria, aria);
        assert_eq!(n.class_name.as_deref(), Some("wide"));
    }

    #[test]
    fn test_empty_id_is_generated() {
        let (_clock, notifier) = test_notifier();
        let id = notifier.info("x".to_string(), &ToastOptions::new().with_id(""));
        assert!(!id.as_str().is_empty());
    }

    #[test]
    fn test_emit_same_id_replaces() {
        let (_clock, notifier) = test_notifier();
        let options = ToastOptions::new().with_id("sync");
        notifier.loading("Syncing".to_string(), &options);
        notifier.success("Synced".to_string(), &options);

        let state = notifier.store().state();
        assert_eq!(state.len(), 1);
        assert_eq!(state.notifications[0].content, "Synced");
        assert_eq!(state.notifications[0].kind, Kind::Success);
    }

    #[test]
    fn test_track_outcome_success_reuses_id() {
        let (_clock, notifier) = test_notifier();
        let contents = OutcomeContents {
            loading: "Uploading".to_string(),
            success: "Uploaded".to_string(),
            error: "Upload failed".to_string(),
        };

        let result: std::result::Result<u32, String> = block_on(notifier.track_outcome(
            async { Ok(7) },
            contents,
            &DefaultOptions::default(),
        ));
        assert_eq!(result, Ok(7));

        let state = notifier.store().state();
        assert_eq!(state.len(), 1);
        assert_eq!(state.notifications[0].kind, Kind::Success);
        assert_eq!(state.notifications[0].content, "Uploaded");
        assert_eq!(state.notifications[0].id, NotificationId::from("1"));
    }

    #[test]
    fn test_track_outcome_error_passes_through() {
        let (_clock, notifier) = test_notifier();
        let contents = OutcomeContents {
            loading: "Uploading".to_string(),
            success: "Uploaded".to_string(),
            error: "Upload failed".to_string(),
        };

        let result: std::result::Result<(), String> = block_on(notifier.track_outcome(
            async { Err("disk full".to_string()) },
            contents,
            &DefaultOptions::default(),
        ));
        assert_eq!(result, Err("disk full".to_string()));

        let state = notifier.store().state();
        assert_eq!(state.notifications[0].kind, Kind::Error);
        assert_eq!(state.notifications[0].content, "Upload failed");
    }

    #[test]
    fn test_track_outcome_quiet_absorbs_error() {
        let (_clock, notifier) = test_notifier();
        let contents = OutcomeContents {
            loading: "a".to_string(),
            success: "b".to_string(),
            error: "c".to_string(),
        };

        let result = block_on(notifier.track_outcome_quiet(
            async { Err::<(), _>("nope") },
            contents,
            &DefaultOptions::default(),
        ));
        assert_eq!(result, None);
    }

    #[test]
    fn test_track_outcome_uses_kind_options() {
        let (_clock, notifier) = test_notifier();
        let options = DefaultOptions::new()
            .with_global(ToastOptions::new().with_position(Position::TopRight))
            .with_kind(
                Kind::Success,
                ToastOptions::new().with_duration(Expiry::from_millis(1500)),
            );
        let contents = OutcomeContents {
            loading: "a".to_string(),
            success: "b".to_string(),
            error: "c".to_string(),
        };

        let _: std::result::Result<(), ()> =
            block_on(notifier.track_outcome(async { Ok(()) }, contents, &options));

        let state = notifier.store().state();
        let n = &state.notifications[0];
        assert_eq!(n.position, Some(Position::TopRight));
        // Settled instantly on the manual clock: nothing to credit
        assert_eq!(n.duration, Some(Expiry::from_millis(1500)));
    }

    #[test]
    fn test_reemit_credits_active_time_only() {
        let (clock, notifier) = test_notifier();
        let store = notifier.store();
        let options = ToastOptions::new().with_id("sync");
        notifier.loading("Syncing".to_string(), &options);

        clock.advance(Duration::from_millis(1000));
        store.dispatch(Command::pause(clock.now()));
        clock.advance(Duration::from_millis(2000));
        store.dispatch(Command::unpause(clock.now()));
        clock.advance(Duration::from_millis(2000));

        notifier.success("Synced".to_string(), &options);

        let state = store.state();
        let n = state.get(&"sync".into()).unwrap();
        // 3s counted down, the 2s pause is already in pause_duration
        assert_eq!(n.duration, Some(Expiry::from_millis(7000)));
        assert_eq!(n.pause_duration, Duration::from_millis(2000));
        assert_eq!(n.created_at, Timestamp(10_000));
    }

    #[test]
    fn test_reemit_keeps_never() {
        let (clock, notifier) = test_notifier();
        let options = ToastOptions::new().with_id("job");
        notifier.loading("Step 1".to_string(), &options);
        clock.advance(Duration::from_millis(500));
        notifier.loading("Step 2".to_string(), &options);

        let state = notifier.store().state();
        assert_eq!(state.notifications[0].duration, Some(Expiry::Never));
    }
}
