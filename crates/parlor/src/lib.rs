//! # Parlor
//!
//! Two-player game lobby synchronization over a shared realtime document
//! store. Players create or join a 6-character coded room; the room
//! document is the only shared state, and every client converges on it
//! through conditional read-modify-write updates.
//!
//! The UI layer is an external collaborator: it consumes [`Room`]
//! snapshots (plus the derived [`RoomView`]) and emits intents through
//! [`RoomClient`]. The backing store is likewise external, reached only
//! through the `parlor_store::Store` trait.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parlor::prelude::*;
//!
//! # async fn demo() -> Result<(), ClientError> {
//! let vault = MemoryVault::new();
//! let session = SessionContext::restore_or_create(&vault, "Ana")?;
//! let store = Arc::new(MemoryStore::new());
//!
//! let mut client = RoomClient::new(
//!     store,
//!     session,
//!     DisconnectPresence::default(),
//!     LobbyConfig::default(),
//! );
//! let code = client.create_room(GameType::Guessing).await?;
//! println!("share this code: {code}");
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod telemetry;
mod view;

pub use client::RoomClient;
pub use error::ClientError;
pub use view::RoomView;

pub use parlor_protocol::Room;

/// The common imports for embedding the client.
pub mod prelude {
    pub use crate::{ClientError, RoomClient, RoomView};
    pub use parlor_protocol::{
        EliminationData, GameData, GameType, Guess, GuessPhase, GuessingData, Hint, Outcome,
        Player, PlayerId, Room, RoomCode, RoomStatus,
    };
    pub use parlor_room::{LobbyConfig, Turn, TurnError};
    pub use parlor_session::{
        DisconnectPresence, HeartbeatPresence, IdentityVault, MemoryVault, Presence,
        SessionContext,
    };
    pub use parlor_store::{MemoryStore, Store};
}
