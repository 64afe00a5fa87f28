//! Error types for the notification layer

use siteflow_store::StoreError;

/// Errors from outbox persistence and draining
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("outbox entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for notification operations
pub type NotifyResult<T> = Result<T, NotifyError>;
