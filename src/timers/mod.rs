//! Timers: the clock/scheduler abstraction and the removal coordinator.
//!
//! Every timer the engine arms goes through a [`Scheduler`], so tests can
//! swap the wall-clock [`ThreadScheduler`] for a deterministic
//! [`ManualScheduler`] and drive time explicitly.
//!
//! # Example
//!
//! ```ignore
//! let clock = Arc::new(ManualScheduler::new(Timestamp(0)));
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&fired);
//! clock.schedule(Duration::from_millis(50), Box::new(move || flag.store(true, Ordering::SeqCst)));
//!
//! clock.advance(Duration::from_millis(50));
//! assert!(fired.load(Ordering::SeqCst));
//! ```

mod coordinator;
mod scheduler;

pub use coordinator::{RemovalTicket, TimeoutCoordinator};
pub use scheduler::{ManualScheduler, Scheduler, Task, ThreadScheduler, TimerId};
