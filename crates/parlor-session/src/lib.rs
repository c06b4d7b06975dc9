//! Player identity and presence for Parlor.
//!
//! Two concerns live here, both local to one client:
//!
//! - **Identity** — a stable per-browser player token plus a display name,
//!   restored from a local vault so the same person keeps the same id
//!   across visits. No network, no verification.
//! - **Presence** — the periodic liveness heartbeat written into the room
//!   document while a client is attached, with an optional store-armed
//!   cleanup for ungraceful disconnects.

#![allow(async_fn_in_trait)]

mod error;
mod identity;
mod presence;

pub use error::SessionError;
pub use identity::{
    IdentityVault, MemoryVault, PLAYER_ID_KEY, PLAYER_NAME_KEY, SessionContext,
};
pub use presence::{DisconnectPresence, HeartbeatPresence, Presence, PresenceHandle};
