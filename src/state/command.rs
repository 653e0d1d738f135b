//! Commands accepted by the store.

use crate::types::{Notification, NotificationId, NotificationPatch, Timestamp};

/// A state transition request.
///
/// Commands are the only way to change the store. `None` targets in
/// `Dismiss` and `Remove` apply to every notification.
#[derive(Clone)]
pub enum Command<C> {
    /// Prepend a notification, evicting the oldest beyond the limit.
    Add(Notification<C>),

    /// Merge fields into an existing notification.
    Update(NotificationPatch<C>),

    /// Update if the id is known, otherwise add.
    Upsert(Notification<C>),

    /// Hide and start the grace countdown to removal.
    Dismiss(Option<NotificationId>),

    /// Drop from the active set.
    Remove(Option<NotificationId>),

    /// Freeze every countdown.
    Pause(Timestamp),

    /// Resume countdowns, crediting the paused time to each notification.
    Unpause(Timestamp),
}

impl<C> Command<C> {
    pub fn add(notification: Notification<C>) -> Self {
        Command::Add(notification)
    }

    pub fn update(patch: NotificationPatch<C>) -> Self {
        Command::Update(patch)
    }

    pub fn upsert(notification: Notification<C>) -> Self {
        Command::Upsert(notification)
    }

    pub fn dismiss(id: impl Into<NotificationId>) -> Self {
        Command::Dismiss(Some(id.into()))
    }

    pub fn dismiss_all() -> Self {
        Command::Dismiss(None)
    }

    pub fn remove(id: impl Into<NotificationId>) -> Self {
        Command::Remove(Some(id.into()))
    }

    pub fn remove_all() -> Self {
        Command::Remove(None)
    }

    pub fn pause(time: Timestamp) -> Self {
        Command::Pause(time)
    }

    pub fn unpause(time: Timestamp) -> Self {
        Command::Unpause(time)
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Add(_) => "add",
            Command::Update(_) => "update",
            Command::Upsert(_) => "upsert",
            Command::Dismiss(_) => "dismiss",
            Command::Remove(_) => "remove",
            Command::Pause(_) => "pause",
            Command::Unpause(_) => "unpause",
        }
    }
}

impl<C> std::fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Add(n) | Command::Upsert(n) => write!(f, "{}({})", self.name(), n.id),
            Command::Update(p) => write!(f, "update({})", p.id),
            Command::Dismiss(id) | Command::Remove(id) => match id {
                Some(id) => write!(f, "{}({})", self.name(), id),
                None => write!(f, "{}(*)", self.name()),
            },
            Command::Pause(t) | Command::Unpause(t) => write!(f, "{}({:?})", self.name(), t),
        }
    }
}
