//! Error types for the room layer.

use parlor_protocol::{CodecError, RoomCode};
use parlor_store::StoreError;

/// Errors that can occur during room lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The code does not name a live room (never existed, or expired).
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// Both seats are already taken.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Creation kept colliding with live codes.
    #[error("could not allocate an unused room code")]
    CodesExhausted,

    /// A conditional write lost the race on every retry.
    #[error("room {0} is too contended, giving up")]
    Contended(RoomCode),

    /// A stored document did not decode as a room.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The store failed or is unreachable.
    #[error(transparent)]
    Store(#[from] StoreError),
}
