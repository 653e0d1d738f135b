//! # Herald
//!
//! An in-memory notification engine: transient messages that appear,
//! auto-dismiss after a per-kind duration, pause while the user hovers,
//! and stack in screen lanes.
//!
//! ## Core Concepts
//!
//! - **Store**: Single authoritative list of notifications, changed only by commands
//! - **Reducer**: Pure state transitions with the timer effects they imply
//! - **Timers**: Pluggable clock; a manual one for tests, a thread-backed one for apps
//! - **Toaster**: Per-consumer view that arms auto-dismiss and computes stacking offsets
//! - **Notifier**: Caller API for emitting, dismissing and tracking async outcomes
//!
//! ## Example
//!
//! ```ignore
//! use herald::{DefaultOptions, Notifier, Store, ThreadScheduler, ToastOptions};
//! use std::sync::Arc;
//!
//! let store = Store::with_scheduler(Arc::new(ThreadScheduler::new()?));
//! let notifier = Notifier::new(store);
//! let toaster = notifier.mount(DefaultOptions::default());
//!
//! let id = notifier.success("Saved".to_string(), &ToastOptions::default());
//!
//! // Pointer entered the stack
//! toaster.pause();
//! let offset = toaster.calculate_offset(&id, &Default::default());
//! toaster.unpause();
//! ```

pub mod error;
pub mod notifier;
pub mod options;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod timers;
pub mod types;
pub mod view;

// Re-exports
pub use error::{HeraldError, Result};
pub use notifier::{global, Notifier, OutcomeContents};
pub use options::{DefaultOptions, ToastOptions};
pub use state::{apply_command, Command, Effect, Transition};
pub use store::{Store, StoreConfig};
pub use subscriptions::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};
pub use timers::{
    ManualScheduler, RemovalTicket, Scheduler, Task, ThreadScheduler, TimeoutCoordinator, TimerId,
};
pub use types::*;
pub use view::{OffsetOptions, Toaster};
