//! Error types for the protocol layer.

/// Errors raised while converting between typed documents and the store's
/// JSON representation, or while parsing user-entered identifiers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization of a document fragment failed.
    #[error("failed to encode document: {0}")]
    Encode(serde_json::Error),

    /// A stored document does not match the expected shape.
    #[error("failed to decode document: {0}")]
    Decode(serde_json::Error),

    /// A room code is not 6 base-36 characters.
    #[error("invalid room code: {0:?}")]
    InvalidCode(String),
}
