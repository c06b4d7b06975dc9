//! The room client: one player's live connection to a shared room.
//!
//! A [`RoomClient`] ties the pieces together: lifecycle operations go
//! through the lobby, game intents through the turn synchronizer, and a
//! background pump mirrors every store snapshot into a `watch` cell the
//! UI observes. Heartbeat and sweeper tasks run for as long as the client
//! is attached and are cancelled on detach, room change, or drop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use parlor_games as games;
use parlor_protocol::{GameType, PlayerId, Room, RoomCode, decode_snapshot, now_ms};
use parlor_room::{
    Lobby, LobbyConfig, SubmitError, SweeperHandle, Turn, should_auto_start, spawn_sweeper,
    submit_turn,
};
use parlor_session::{Presence, PresenceHandle, SessionContext};
use parlor_store::Store;

use crate::{ClientError, RoomView};

/// Background machinery for one attached room. Dropping it cancels the
/// pump; the presence and sweeper handles cancel themselves.
struct Attachment {
    code: RoomCode,
    pump: JoinHandle<()>,
    _presence: PresenceHandle,
    _sweeper: SweeperHandle,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// One player's client for the shared lobby.
pub struct RoomClient<S: Store, P: Presence> {
    lobby: Lobby<S>,
    session: SessionContext,
    presence: P,
    snapshots: watch::Sender<Option<Room>>,
    attachment: Option<Attachment>,
}

impl<S: Store, P: Presence> RoomClient<S, P> {
    /// Builds a client over a shared store for one local session.
    pub fn new(
        store: Arc<S>,
        session: SessionContext,
        presence: P,
        config: LobbyConfig,
    ) -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            lobby: Lobby::new(store, config),
            session,
            presence,
            snapshots,
            attachment: None,
        }
    }

    /// The local session identity.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// The code of the currently attached room, if any.
    pub fn room_code(&self) -> Option<&RoomCode> {
        self.attachment.as_ref().map(|a| &a.code)
    }

    /// A feed of authoritative room snapshots (`None` = no room).
    pub fn watch(&self) -> watch::Receiver<Option<Room>> {
        self.snapshots.subscribe()
    }

    /// The latest observed snapshot.
    pub fn current_room(&self) -> Option<Room> {
        self.snapshots.borrow().clone()
    }

    /// The derived UI projection of the latest snapshot.
    pub fn view(&self) -> Option<RoomView> {
        let room = self.current_room()?;
        RoomView::project(
            &room,
            &self.session.player_id,
            now_ms(),
            self.lobby.config().presence_window,
        )
    }

    /// Creates a room, attaches to it, and returns its code.
    pub async fn create_room(&mut self, game_type: GameType) -> Result<RoomCode, ClientError> {
        self.detach();
        let room = self.lobby.create(game_type, &self.session).await?;
        let code = room.code.clone();
        self.snapshots.send_replace(Some(room));
        self.attach(code.clone()).await?;
        Ok(code)
    }

    /// Joins a room by code and attaches to it.
    pub async fn join_room(&mut self, code: &RoomCode) -> Result<(), ClientError> {
        self.detach();
        let room = self.lobby.join(code, &self.session).await?;
        let code = room.code.clone();
        self.snapshots.send_replace(Some(room));
        self.attach(code).await?;
        Ok(())
    }

    /// Submits a game intent against the attached room.
    pub async fn submit(&self, turn: Turn) -> Result<(), ClientError> {
        let code = self.attached_code()?;
        submit_turn(
            &**self.lobby.store(),
            self.lobby.config(),
            &code,
            &self.session.player_id,
            turn,
        )
        .await
        .map_err(ClientError::from)
    }

    /// Rolls two dice locally and submits the total.
    ///
    /// Game logic runs on whichever client mutates the document, so the
    /// roll happens here, not on a server.
    pub async fn roll(&self) -> Result<u8, ClientError> {
        let (d1, d2) = {
            let mut rng = rand::rng();
            games::roll_dice(&mut rng)
        };
        let total = d1 + d2;
        self.submit(Turn::Roll { total }).await?;
        Ok(total)
    }

    /// Leaves the room and tears down the attachment.
    pub async fn leave(&mut self) -> Result<(), ClientError> {
        if let Some(attachment) = self.attachment.take() {
            let code = attachment.code.clone();
            drop(attachment); // stop heartbeat/pump before unseating
            self.lobby.leave(&code, &self.session.player_id).await?;
        }
        self.snapshots.send_replace(None);
        Ok(())
    }

    /// Forfeits a running game to the opponent and leaves.
    pub async fn abandon(&mut self) -> Result<(), ClientError> {
        if let Some(attachment) = self.attachment.take() {
            let code = attachment.code.clone();
            drop(attachment);
            self.lobby.abandon(&code, &self.session.player_id).await?;
        }
        self.snapshots.send_replace(None);
        Ok(())
    }

    /// Cancels the subscription, heartbeat, and sweeper without touching
    /// the shared document.
    pub fn detach(&mut self) {
        self.attachment = None;
    }

    fn attached_code(&self) -> Result<RoomCode, ClientError> {
        self.attachment
            .as_ref()
            .map(|a| a.code.clone())
            .ok_or(ClientError::NotAttached)
    }

    async fn attach(&mut self, code: RoomCode) -> Result<(), ClientError> {
        let store = Arc::clone(self.lobby.store());
        let presence = self
            .presence
            .start(Arc::clone(&store), &code, &self.session.player_id)
            .await?;
        let sweeper = spawn_sweeper(Arc::clone(&store), self.lobby.config().clone());
        let pump = tokio::spawn(pump(
            store,
            self.lobby.config().clone(),
            code.clone(),
            self.session.player_id.clone(),
            self.snapshots.clone(),
        ));

        self.attachment = Some(Attachment {
            code,
            pump,
            _presence: presence,
            _sweeper: sweeper,
        });
        Ok(())
    }
}

/// Mirrors store snapshots into the watch cell and auto-starts the game
/// when this client is the host observing a full waiting room.
async fn pump<S: Store>(
    store: Arc<S>,
    config: LobbyConfig,
    code: RoomCode,
    me: PlayerId,
    snapshots: watch::Sender<Option<Room>>,
) {
    let mut sub = match store.subscribe(&code.storage_key()).await {
        Ok(sub) => sub,
        Err(err) => {
            tracing::warn!(%code, %err, "room subscription failed");
            snapshots.send_replace(None);
            return;
        }
    };

    while let Some(snapshot) = sub.recv().await {
        match decode_snapshot(&snapshot) {
            Ok(Some(room)) => {
                let auto_start = should_auto_start(&room, &me);
                snapshots.send_replace(Some(room));
                if auto_start {
                    match submit_turn(&*store, &config, &code, &me, Turn::Start).await {
                        Ok(()) => tracing::info!(%code, "game auto-started"),
                        Err(SubmitError::Rejected(err)) => {
                            // Another observer beat us to it.
                            tracing::debug!(%code, %err, "auto-start superseded");
                        }
                        Err(SubmitError::Room(err)) => {
                            tracing::warn!(%code, %err, "auto-start failed");
                        }
                    }
                }
            }
            Ok(None) => {
                // Expired or deleted: forget the room locally.
                tracing::info!(%code, "room disappeared");
                snapshots.send_replace(None);
                break;
            }
            Err(err) => {
                tracing::warn!(%code, %err, "undecodable room snapshot");
            }
        }
    }
}
