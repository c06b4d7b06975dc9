//! Room lifecycle: create, join, leave, abandon.
//!
//! Every operation is a read followed by a conditional write against the
//! shared document, retried with a fresh read while it loses to
//! concurrent writers. The sweep runs opportunistically before create and
//! join to thin out dead codes first.

use std::sync::Arc;

use parlor_protocol::{
    GameData, GameType, Outcome, Player, PlayerId, Room, RoomCode, RoomPatch,
    RoomStatus, decode_room, decode_snapshot, encode_room, now_ms,
};
use parlor_session::SessionContext;
use parlor_store::{Store, StoreError};

use crate::{LobbyConfig, RoomError, sweep};

/// Lifecycle operations against the shared store.
///
/// Cheap to clone; clones share the store handle and config.
#[derive(Clone)]
pub struct Lobby<S: Store> {
    store: Arc<S>,
    config: LobbyConfig,
}

impl<S: Store> Lobby<S> {
    /// Creates a lobby over a store.
    pub fn new(store: Arc<S>, config: LobbyConfig) -> Self {
        Self { store, config }
    }

    /// The shared store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The timing configuration.
    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    /// Reads and decodes a room, or `None` if the code is dead.
    pub async fn fetch(&self, code: &RoomCode) -> Result<Option<Room>, RoomError> {
        let snapshot = self.store.get(&code.storage_key()).await?;
        Ok(decode_snapshot(&snapshot)?)
    }

    /// Creates a fresh waiting room with the session's player as host and
    /// returns it.
    ///
    /// Runs an opportunistic sweep first to lower live-code density, then
    /// writes create-if-absent, regenerating the code on a collision.
    pub async fn create(
        &self,
        game_type: GameType,
        session: &SessionContext,
    ) -> Result<Room, RoomError> {
        self.opportunistic_sweep().await;

        for _ in 0..self.config.create_retries {
            let code = RoomCode::generate();
            let room = Room::new(code.clone(), game_type, session.as_player(true), now_ms());
            match self
                .store
                .create(&code.storage_key(), encode_room(&room)?)
                .await
            {
                Ok(()) => {
                    tracing::info!(%code, %game_type, host = %session.player_id, "room created");
                    return Ok(room);
                }
                Err(StoreError::AlreadyExists(_)) => {
                    tracing::debug!(%code, "room code collision, regenerating");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(RoomError::CodesExhausted)
    }

    /// Joins an existing room.
    ///
    /// Idempotent for a player already seated (their heartbeat is
    /// refreshed, `players` untouched). The second seat is taken with a
    /// conditional write, so two racing joiners resolve deterministically:
    /// one wins, the other re-reads and sees [`RoomError::RoomFull`].
    pub async fn join(
        &self,
        code: &RoomCode,
        session: &SessionContext,
    ) -> Result<Room, RoomError> {
        self.opportunistic_sweep().await;

        let key = code.storage_key();
        for _ in 0..=self.config.write_retries {
            let Some(value) = self.store.get(&key).await? else {
                return Err(RoomError::NotFound(code.clone()));
            };
            let room = decode_room(&value)?;

            if room.contains(&session.player_id) {
                let patch = RoomPatch::new()
                    .ping(&session.player_id, now_ms())
                    .into_patch();
                match self.store.update(&key, patch).await {
                    Ok(()) => return Ok(room),
                    Err(StoreError::Missing(_)) => {
                        return Err(RoomError::NotFound(code.clone()));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            if room.is_full() {
                return Err(RoomError::RoomFull(code.clone()));
            }

            let mut players = room.players.clone();
            players.push(session.as_player(false));
            let now = now_ms();
            let patch = RoomPatch::new()
                .players(&players)
                .ping(&session.player_id, now)
                .last_activity(now)
                .into_patch();
            match self.store.update_if(&key, room.version, patch).await {
                Ok(()) => {
                    tracing::info!(%code, player = %session.player_id, "player joined");
                    return self
                        .fetch(code)
                        .await?
                        .ok_or_else(|| RoomError::NotFound(code.clone()));
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(StoreError::Missing(_)) => {
                    return Err(RoomError::NotFound(code.clone()));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(RoomError::Contended(code.clone()))
    }

    /// Removes the player from the room; deletes the room when the last
    /// seat empties. Leaves `status` and `gameData` untouched.
    ///
    /// Leaving a room that no longer exists (or was never joined) is a
    /// quiet success.
    pub async fn leave(&self, code: &RoomCode, player: &PlayerId) -> Result<(), RoomError> {
        let key = code.storage_key();
        for _ in 0..=self.config.write_retries {
            let Some(value) = self.store.get(&key).await? else {
                return Ok(());
            };
            let room = decode_room(&value)?;
            if !room.contains(player) {
                return Ok(());
            }

            let remaining: Vec<Player> = room
                .players
                .iter()
                .filter(|p| &p.id != player)
                .cloned()
                .collect();
            if remaining.is_empty() {
                self.store.remove(&key).await?;
                tracing::info!(%code, %player, "last player left, room deleted");
                return Ok(());
            }

            let patch = RoomPatch::new()
                .players(&remaining)
                .clear_ping(player)
                .into_patch();
            match self.store.update_if(&key, room.version, patch).await {
                Ok(()) => {
                    tracing::info!(%code, %player, "player left");
                    return Ok(());
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(StoreError::Missing(_)) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
        Err(RoomError::Contended(code.clone()))
    }

    /// Forfeits a running game: in one atomic update the opponent is
    /// declared winner, the game is finished, and the abandoning player is
    /// unseated, so the survivor observes "game over, I won" and
    /// "opponent left" simultaneously.
    ///
    /// Outside a running game (or without an opponent) this is just
    /// [`leave`](Lobby::leave).
    pub async fn abandon(&self, code: &RoomCode, player: &PlayerId) -> Result<(), RoomError> {
        let key = code.storage_key();
        for _ in 0..=self.config.write_retries {
            let Some(value) = self.store.get(&key).await? else {
                return Ok(());
            };
            let room = decode_room(&value)?;

            if !(room.status.is_playing() && room.contains(player)) {
                return self.leave(code, player).await;
            }
            let (Some(data), Some(opponent)) = (&room.game_data, room.opponent_of(player))
            else {
                return self.leave(code, player).await;
            };

            let remaining: Vec<Player> = room
                .players
                .iter()
                .filter(|p| &p.id != player)
                .cloned()
                .collect();
            let patch = RoomPatch::new()
                .status(RoomStatus::Finished)
                .players(&remaining)
                .clear_ping(player)
                .last_activity(now_ms());
            let patch = match data {
                GameData::Elimination(_) => {
                    patch.winner_outcome(&Outcome::winner(opponent.id.clone()))
                }
                GameData::Guessing(_) => patch.winner_player(&opponent.id),
            };

            match self
                .store
                .update_if(&key, room.version, patch.into_patch())
                .await
            {
                Ok(()) => {
                    tracing::info!(%code, %player, winner = %opponent.id, "game abandoned");
                    return Ok(());
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(StoreError::Missing(_)) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
        Err(RoomError::Contended(code.clone()))
    }

    /// One reclamation pass over all rooms.
    pub async fn sweep(&self) -> Result<usize, RoomError> {
        sweep::sweep(&*self.store, &self.config).await
    }

    /// Best-effort sweep before create/join; failures only warn.
    async fn opportunistic_sweep(&self) {
        if let Err(err) = self.sweep().await {
            tracing::warn!(%err, "opportunistic sweep failed");
        }
    }
}
