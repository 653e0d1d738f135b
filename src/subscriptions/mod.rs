//! Subscription system for live state updates.
//!
//! Two kinds of subscribers are supported:
//! - Callbacks, invoked synchronously during dispatch
//! - Bounded channels, with slow-subscriber dropping
//!
//! Both see every state in dispatch order.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe_channel(SubscriptionConfig::default());
//!
//! loop {
//!     match handle.recv() {
//!         Ok(StoreEvent::Changed { state }) => println!("{} active", state.len()),
//!         Ok(StoreEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::{Listener, SubscriptionManager};
pub use types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
