//! Core types for the notification engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unique identifier for a notification within the active set.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        NotificationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotificationId({})", self.0)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        NotificationId(s.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        NotificationId(s)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    /// Signed milliseconds elapsed from `earlier` to `self`.
    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Duration elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.millis_since(earlier).max(0) as u64)
    }

    pub fn saturating_add(self, delay: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration_millis(delay)))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Whole milliseconds of a duration, saturating at `i64::MAX`.
pub(crate) fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Semantic category of a notification. Also keys the default-duration table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[default]
    Info,
    Success,
    Error,
    Loading,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Info, Kind::Success, Kind::Error, Kind::Loading];

    /// Built-in display duration used when no option overrides it.
    pub fn default_expiry(self) -> Expiry {
        match self {
            Kind::Info | Kind::Success | Kind::Error => Expiry::After(Duration::from_millis(4000)),
            Kind::Loading => Expiry::Never,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Info => "info",
            Kind::Success => "success",
            Kind::Error => "error",
            Kind::Loading => "loading",
        };
        f.write_str(name)
    }
}

/// Screen placement. Each value is an independent stacking lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Position {
    /// Top lanes grow downwards, bottom lanes upwards.
    pub fn is_top(self) -> bool {
        matches!(self, Position::TopLeft | Position::TopCenter | Position::TopRight)
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::BottomRight
    }
}

/// How long a notification stays visible before auto-dismissal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ExpiryRepr", into = "ExpiryRepr")]
pub enum Expiry {
    After(Duration),
    Never,
}

impl Expiry {
    pub fn from_millis(ms: u64) -> Self {
        Expiry::After(Duration::from_millis(ms))
    }

    pub fn is_finite(self) -> bool {
        matches!(self, Expiry::After(_))
    }

    /// Lengthen a finite expiry; `Never` stays `Never`.
    pub fn extended_by(self, extra: Duration) -> Self {
        match self {
            Expiry::After(d) => Expiry::After(d.saturating_add(extra)),
            Expiry::Never => Expiry::Never,
        }
    }
}

/// Wire form: a millisecond count or the string `"never"`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ExpiryRepr {
    Millis(u64),
    Never(NeverTag),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NeverTag {
    Never,
}

impl From<ExpiryRepr> for Expiry {
    fn from(repr: ExpiryRepr) -> Self {
        match repr {
            ExpiryRepr::Millis(ms) => Expiry::from_millis(ms),
            ExpiryRepr::Never(_) => Expiry::Never,
        }
    }
}

impl From<Expiry> for ExpiryRepr {
    fn from(expiry: Expiry) -> Self {
        match expiry {
            Expiry::After(d) => ExpiryRepr::Millis(d.as_millis() as u64),
            Expiry::Never => ExpiryRepr::Never(NeverTag::Never),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AriaRole {
    #[default]
    Status,
    Alert,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AriaLive {
    Assertive,
    Off,
    #[default]
    Polite,
}

/// Accessibility hints passed through to the view layer untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AriaProps {
    pub role: AriaRole,
    pub live: AriaLive,
}

/// A single transient message tracked by the engine.
///
/// `C` is the renderable payload. The engine only clones and moves it.
#[derive(Clone)]
pub struct Notification<C> {
    pub id: NotificationId,
    pub kind: Kind,
    pub content: C,

    /// Explicit display duration (None = use configured defaults).
    pub duration: Option<Expiry>,

    /// Time the countdown spent frozen. Only ever grows.
    pub pause_duration: Duration,

    /// Creation time. Never changes after insertion.
    pub created_at: Timestamp,

    /// False once dismissed; never becomes true again.
    pub visible: bool,

    pub position: Option<Position>,

    /// Measured by the view layer; only used for stacking offsets.
    pub height: Option<u32>,

    pub aria: AriaProps,
    pub class_name: Option<String>,
}

impl<C> Notification<C> {
    /// Create a visible notification with no pause time and default aria props.
    pub fn new(id: NotificationId, kind: Kind, content: C, created_at: Timestamp) -> Self {
        Self {
            id,
            kind,
            content,
            duration: None,
            pause_duration: Duration::ZERO,
            created_at,
            visible: true,
            position: None,
            height: None,
            aria: AriaProps::default(),
            class_name: None,
        }
    }

    pub fn with_duration(mut self, duration: Expiry) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }
}

impl<C> fmt::Debug for Notification<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("duration", &self.duration)
            .field("pause_duration", &self.pause_duration)
            .field("created_at", &self.created_at)
            .field("visible", &self.visible)
            .field("position", &self.position)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Partial update keyed by id.
///
/// Only caller-facing fields are patchable. `created_at`, `pause_duration`
/// and `visible` belong to the engine.
#[derive(Clone)]
pub struct NotificationPatch<C> {
    pub id: NotificationId,
    pub kind: Option<Kind>,
    pub content: Option<C>,
    pub duration: Option<Expiry>,
    pub position: Option<Position>,
    pub height: Option<u32>,
    pub aria: Option<AriaProps>,
    pub class_name: Option<String>,
}

impl<C> NotificationPatch<C> {
    pub fn new(id: NotificationId) -> Self {
        Self {
            id,
            kind: None,
            content: None,
            duration: None,
            position: None,
            height: None,
            aria: None,
            class_name: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_content(mut self, content: C) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_duration(mut self, duration: Expiry) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Merge set fields into `target`.
    pub fn apply_to(self, target: &mut Notification<C>) {
        if let Some(kind) = self.kind {
            target.kind = kind;
        }
        if let Some(content) = self.content {
            target.content = content;
        }
        if let Some(duration) = self.duration {
            target.duration = Some(duration);
        }
        if let Some(position) = self.position {
            target.position = Some(position);
        }
        if let Some(height) = self.height {
            target.height = Some(height);
        }
        if let Some(aria) = self.aria {
            target.aria = aria;
        }
        if let Some(class_name) = self.class_name {
            target.class_name = Some(class_name);
        }
    }
}

impl<C> From<Notification<C>> for NotificationPatch<C> {
    /// Full record as a patch (used by upsert on an existing id).
    fn from(n: Notification<C>) -> Self {
        Self {
            id: n.id,
            kind: Some(n.kind),
            content: Some(n.content),
            duration: n.duration,
            position: n.position,
            height: n.height,
            aria: Some(n.aria),
            class_name: n.class_name,
        }
    }
}

/// The authoritative engine state.
#[derive(Clone, Debug)]
pub struct State<C> {
    /// Active notifications, most recent first.
    pub notifications: Vec<Notification<C>>,

    /// Set while the global pause is active.
    pub paused_at: Option<Timestamp>,
}

impl<C> State<C> {
    pub fn new() -> Self {
        Self {
            notifications: Vec::new(),
            paused_at: None,
        }
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification<C>> {
        self.notifications.iter().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Time `id` has spent counting down as of `now`, leaving out every
    /// frozen stretch including a pause still in progress.
    pub fn active_time(&self, id: &NotificationId, now: Timestamp) -> Option<Duration> {
        let n = self.get(id)?;
        let ongoing = self.paused_at.map_or(Duration::ZERO, |at| now.duration_since(at));
        let frozen = n.pause_duration.saturating_add(ongoing);
        Some(now.duration_since(n.created_at).saturating_sub(frozen))
    }
}

impl<C> Default for State<C> {
    fn default() -> Self {
        Self::new()
    }
}
