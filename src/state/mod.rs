//! Notification state machine.
//!
//! The reducer is pure: it maps a state and a command to a fresh state plus
//! the timer effects the store must carry out. Nothing here touches timers
//! or subscribers directly.

mod command;
mod reducer;

pub use command::Command;
pub use reducer::{apply_command, Effect, Transition};
