//! Error types for the store layer.

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A create hit a key that already holds a live document.
    #[error("document {0} already exists")]
    AlreadyExists(String),

    /// An update addressed a document that does not exist.
    #[error("document {0} does not exist")]
    Missing(String),

    /// A conditional update lost the race: the document moved past the
    /// expected version. The caller should re-read and retry.
    #[error("conditional update of {key} lost: expected version {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    /// A patch addressed an empty or malformed field path.
    #[error("invalid field path: {0:?}")]
    InvalidPath(String),

    /// The backend is unreachable or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
