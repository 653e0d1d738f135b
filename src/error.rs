//! Error types for the notification engine.

use thiserror::Error;

/// Main error type for engine setup and bookkeeping.
///
/// Commands themselves are total: dispatching never fails. Errors only
/// come from configuration, scheduler start-up and subscriptions.
#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscription was dropped")]
    SubscriptionDropped,
}

impl From<serde_json::Error> for HeraldError {
    fn from(e: serde_json::Error) -> Self {
        HeraldError::Serialization(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, HeraldError>;
