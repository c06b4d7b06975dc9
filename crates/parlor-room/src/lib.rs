//! Room lifecycle and turn synchronization for Parlor.
//!
//! This is the heart of the system: the rules by which two untrusted,
//! concurrently writing clients converge on one consistent room. Every
//! mutation is a conditional read-modify-write against the shared
//! document; there is no server-side authority beyond the store's
//! atomicity.
//!
//! # Key types
//!
//! - [`Lobby`] — create / join / leave / abandon against a shared store
//! - [`Turn`] + [`apply_turn`] — the single serializable interface every
//!   game-state mutation funnels through
//! - [`sweep`] / [`spawn_sweeper`] — best-effort reclamation of idle and
//!   abandoned rooms, run opportunistically by any client
//! - [`LobbyConfig`] — timing knobs (heartbeat, sweep, expiry windows)

mod config;
mod error;
mod manager;
mod sweep;
mod turn;

pub use config::LobbyConfig;
pub use error::RoomError;
pub use manager::Lobby;
pub use sweep::{StaleReason, SweeperHandle, is_stale, spawn_sweeper, sweep};
pub use turn::{SubmitError, Turn, TurnError, apply_turn, should_auto_start, submit_turn};
