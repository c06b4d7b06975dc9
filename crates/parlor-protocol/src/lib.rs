//! Room document model for Parlor.
//!
//! This crate defines every type that lives "in the store": the shared
//! room document two clients read and mutate, plus the codec between the
//! typed model and the store's JSON representation.
//!
//! # Key types
//!
//! - [`Room`] — the root aggregate, one document per room code
//! - [`RoomCode`] / [`PlayerId`] — identity newtypes
//! - [`GameData`] — tagged union over the two game variants
//! - [`RoomPatch`] — typed builder for the atomic field-path merges the
//!   room layer writes

mod codec;
mod error;
mod types;

pub use codec::{RoomPatch, decode_room, decode_snapshot, encode_room, paths};
pub use error::CodecError;
pub use types::{
    EliminationData, EliminationSeat, GameData, GameType, Guess, GuessPhase, GuessingData,
    GuessingSeat, Hint, Outcome, Player, PlayerId, Room, RoomCode, RoomStatus, now_ms,
};
