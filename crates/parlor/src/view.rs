//! The UI-facing projection of a room snapshot.
//!
//! A [`RoomView`] is derived on demand from (snapshot, session, now) and
//! never cached, so nothing in it can go stale independently of the
//! authoritative document. The UI reads the raw [`Room`] for game boards;
//! the view answers the cross-cutting questions (whose turn, is the
//! opponent still here, can I vote).

use std::time::Duration;

use parlor_protocol::{GameType, Player, PlayerId, Room, RoomCode, RoomStatus};

/// Derived, display-ready facts about a room from one player's seat.
#[derive(Debug, Clone)]
pub struct RoomView {
    pub code: RoomCode,
    pub game_type: GameType,
    pub status: RoomStatus,
    /// Positional hostship: am I `players[0]` right now.
    pub am_host: bool,
    pub me: Player,
    pub opponent: Option<Player>,
    /// The opponent has a heartbeat inside the presence window.
    pub opponent_online: bool,
    pub my_turn: bool,
    /// A rematch vote is possible: game finished, both players still
    /// seated, and I have not voted yet.
    pub can_vote_rematch: bool,
}

impl RoomView {
    /// Projects a snapshot from `me`'s seat. `None` if `me` is not
    /// seated (the room moved on without this client).
    pub fn project(
        room: &Room,
        me: &PlayerId,
        now: u64,
        presence_window: Duration,
    ) -> Option<Self> {
        let my_seat = room.player(me)?.clone();
        let opponent = room.opponent_of(me).cloned();

        let window = presence_window.as_millis() as u64;
        let opponent_online = opponent.as_ref().is_some_and(|op| {
            room.pings
                .get(&op.id)
                .is_some_and(|ping| now.saturating_sub(*ping) <= window)
        });

        let my_turn = room.status.is_playing()
            && room
                .game_data
                .as_ref()
                .is_some_and(|data| data.current_turn() == me);

        let can_vote_rematch = room.status.is_finished()
            && room.is_full()
            && room
                .game_data
                .as_ref()
                .is_some_and(|data| !data.play_again_votes().contains(me));

        Some(Self {
            code: room.code.clone(),
            game_type: room.game_type,
            status: room.status,
            am_host: room.is_host(me),
            me: my_seat,
            opponent,
            opponent_online,
            my_turn,
            can_vote_rematch,
        })
    }
}
