//! Error types for the service layer

use siteflow_notify::NotifyError;
use siteflow_store::{StoreError, StorePath};
use siteflow_types::EngineError;

/// Everything an action submission can fail with
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The engine refused the action; the entity is unchanged
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no entity at '{0}'")]
    NotFound(StorePath),

    /// Another writer committed between our read and our write. The
    /// caller should re-read and retry deliberately.
    #[error("concurrent conflict: the entity changed since it was read")]
    ConcurrentConflict,

    #[error("entity serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(_) => ServiceError::ConcurrentConflict,
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
