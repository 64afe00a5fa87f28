//! Error types for the store boundary

use crate::StorePath;

/// Errors a store operation can produce
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A guarded update found the guard document changed since it was
    /// read. The whole change set was discarded.
    #[error("conflict at '{0}': guard value changed since read")]
    Conflict(StorePath),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
