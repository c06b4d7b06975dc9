//! Error types for the session layer.

use parlor_store::StoreError;

/// Errors from identity handling and presence startup.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A display name is outside the 2–20 character bounds after trimming.
    #[error("invalid display name: {0:?}")]
    InvalidName(String),

    /// The store rejected a presence write.
    #[error(transparent)]
    Store(#[from] StoreError),
}
