//! Presentation options and their merge order.
//!
//! Options layer from least to most specific: global defaults, per-kind
//! defaults, then whatever was set on the notification itself.

use crate::types::{AriaProps, Expiry, Kind, Notification, NotificationId, Position};
use serde::{Deserialize, Serialize};

/// Options recognised when emitting a notification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastOptions {
    /// Caller-chosen id. Re-emitting with the same id replaces the entry.
    pub id: Option<NotificationId>,
    pub duration: Option<Expiry>,
    pub position: Option<Position>,
    pub aria: Option<AriaProps>,
    pub class_name: Option<String>,
}

impl ToastOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<NotificationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_duration(mut self, duration: Expiry) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_aria(mut self, aria: AriaProps) -> Self {
        self.aria = Some(aria);
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Layer `self` over `base`. Fields set on `self` win.
    pub fn over(&self, base: &ToastOptions) -> ToastOptions {
        ToastOptions {
            id: self.id.clone().or_else(|| base.id.clone()),
            duration: self.duration.or(base.duration),
            position: self.position.or(base.position),
            aria: self.aria.or(base.aria),
            class_name: self.class_name.clone().or_else(|| base.class_name.clone()),
        }
    }
}

/// Global options plus per-kind overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultOptions {
    #[serde(flatten)]
    pub global: ToastOptions,
    pub info: ToastOptions,
    pub success: ToastOptions,
    pub error: ToastOptions,
    pub loading: ToastOptions,
}

impl DefaultOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_global(mut self, options: ToastOptions) -> Self {
        self.global = options;
        self
    }

    pub fn with_kind(mut self, kind: Kind, options: ToastOptions) -> Self {
        *self.for_kind_mut(kind) = options;
        self
    }

    pub fn for_kind(&self, kind: Kind) -> &ToastOptions {
        match kind {
            Kind::Info => &self.info,
            Kind::Success => &self.success,
            Kind::Error => &self.error,
            Kind::Loading => &self.loading,
        }
    }

    pub fn for_kind_mut(&mut self, kind: Kind) -> &mut ToastOptions {
        match kind {
            Kind::Info => &mut self.info,
            Kind::Success => &mut self.success,
            Kind::Error => &mut self.error,
            Kind::Loading => &mut self.loading,
        }
    }

    /// Per-kind options layered over the global ones.
    pub fn resolve(&self, kind: Kind) -> ToastOptions {
        self.for_kind(kind).over(&self.global)
    }

    /// Effective display duration for a notification.
    ///
    /// Explicit duration, then the kind's default, then the global default,
    /// then the built-in table.
    pub fn effective_duration<C>(&self, notification: &Notification<C>) -> Expiry {
        notification
            .duration
            .or(self.for_kind(notification.kind).duration)
            .or(self.global.duration)
            .unwrap_or_else(|| notification.kind.default_expiry())
    }

    /// Fill unset presentation fields of `notification` from these defaults.
    pub fn merge_into<C>(&self, notification: &mut Notification<C>) {
        let resolved = self.resolve(notification.kind);
        notification.duration = Some(self.effective_duration(notification));
        if notification.position.is_none() {
            notification.position = resolved.position;
        }
        if notification.class_name.is_none() {
            notification.class_name = resolved.class_name;
        }
    }
}
