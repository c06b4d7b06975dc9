//! Error type for the client facade.

use parlor_room::{RoomError, SubmitError, TurnError};
use parlor_session::SessionError;

/// Everything that can go wrong at the client surface.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An intent needs an attached room first.
    #[error("not attached to a room")]
    NotAttached,

    /// A move was rejected locally; nothing was written.
    #[error(transparent)]
    Rejected(#[from] TurnError),

    /// A lifecycle or store operation failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Identity or presence failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<SubmitError> for ClientError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Rejected(err) => Self::Rejected(err),
            SubmitError::Room(err) => Self::Room(err),
        }
    }
}
