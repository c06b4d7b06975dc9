//! Codec between typed room documents and the store's JSON values.
//!
//! All knowledge of field paths lives here: the room layer describes
//! mutations through [`RoomPatch`]'s typed methods and never spells a
//! path string itself.

use serde::Serialize;
use serde_json::Value;

use parlor_store::{Patch, Snapshot};

use crate::{CodecError, GameData, Outcome, Player, PlayerId, Room, RoomStatus};

/// Field paths within a room document.
pub mod paths {
    use crate::PlayerId;

    pub const PLAYERS: &str = "players";
    pub const STATUS: &str = "status";
    pub const LAST_ACTIVITY: &str = "lastActivity";
    pub const GAME_DATA: &str = "gameData";
    pub const WINNER: &str = "gameData/winner";

    /// The heartbeat slot for one player.
    pub fn ping(id: &PlayerId) -> String {
        format!("pings/{id}")
    }
}

/// Serializes a whole room for `create`/`set`.
pub fn encode_room(room: &Room) -> Result<Value, CodecError> {
    serde_json::to_value(room).map_err(CodecError::Encode)
}

/// Decodes a stored document back into a typed room.
pub fn decode_room(value: &Value) -> Result<Room, CodecError> {
    serde_json::from_value(value.clone()).map_err(CodecError::Decode)
}

/// Decodes a subscription snapshot; `None` passes through untouched.
pub fn decode_snapshot(snapshot: &Snapshot) -> Result<Option<Room>, CodecError> {
    snapshot.as_ref().map(decode_room).transpose()
}

/// Serializes a closed document type.
///
/// Infallible for the types in this crate: string-keyed maps only, no
/// non-finite numbers.
fn val<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("document types serialize to JSON")
}

// ---------------------------------------------------------------------------
// RoomPatch
// ---------------------------------------------------------------------------

/// Typed builder for the atomic merges the room layer writes.
///
/// Each method adds one field-path operation; [`into_patch`]
/// (`RoomPatch::into_patch`) yields the raw [`Patch`] handed to the store.
#[derive(Debug, Default)]
pub struct RoomPatch {
    patch: Patch,
}

impl RoomPatch {
    /// Starts an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the seated-player list.
    pub fn players(mut self, players: &[Player]) -> Self {
        self.patch = self.patch.set(paths::PLAYERS, val(&players));
        self
    }

    /// Sets the lifecycle status.
    pub fn status(mut self, status: RoomStatus) -> Self {
        self.patch = self.patch.set(paths::STATUS, val(&status));
        self
    }

    /// Bumps the activity timestamp.
    pub fn last_activity(mut self, now: u64) -> Self {
        self.patch = self.patch.set(paths::LAST_ACTIVITY, val(&now));
        self
    }

    /// Replaces the whole game-state fragment.
    pub fn game_data(mut self, data: &GameData) -> Self {
        self.patch = self.patch.set(paths::GAME_DATA, val(data));
        self
    }

    /// Clears game state back to absent (reset to waiting).
    pub fn clear_game_data(mut self) -> Self {
        self.patch = self.patch.delete(paths::GAME_DATA);
        self
    }

    /// Declares an elimination outcome in place.
    pub fn winner_outcome(mut self, outcome: &Outcome) -> Self {
        self.patch = self.patch.set(paths::WINNER, val(outcome));
        self
    }

    /// Declares a guessing-game winner in place.
    pub fn winner_player(mut self, id: &PlayerId) -> Self {
        self.patch = self.patch.set(paths::WINNER, val(id));
        self
    }

    /// Writes a heartbeat timestamp for one player.
    pub fn ping(mut self, id: &PlayerId, now: u64) -> Self {
        self.patch = self.patch.set(paths::ping(id), val(&now));
        self
    }

    /// Removes a player's heartbeat slot.
    pub fn clear_ping(mut self, id: &PlayerId) -> Self {
        self.patch = self.patch.delete(paths::ping(id));
        self
    }

    /// The raw patch for the store.
    pub fn into_patch(self) -> Patch {
        self.patch
    }
}

impl From<RoomPatch> for Patch {
    fn from(value: RoomPatch) -> Self {
        value.into_patch()
    }
}
