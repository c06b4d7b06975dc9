//! Integration tests: lifecycle, reclamation, and full game flows against
//! the in-process store.

use std::collections::BTreeSet;
use std::sync::Arc;

use parlor_protocol::{
    GameData, GameType, Hint, PlayerId, RoomCode, RoomStatus, now_ms,
};
use parlor_room::{Lobby, LobbyConfig, RoomError, SubmitError, Turn, TurnError, submit_turn};
use parlor_session::SessionContext;
use parlor_store::{MemoryStore, Patch, Store};
use serde_json::json;

const MINUTE: u64 = 60 * 1_000;

fn session(id: &str, name: &str) -> SessionContext {
    SessionContext {
        player_id: PlayerId::new(id),
        name: name.to_string(),
    }
}

fn lobby() -> Lobby<MemoryStore> {
    Lobby::new(Arc::new(MemoryStore::new()), LobbyConfig::default())
}

async fn submit(
    lobby: &Lobby<MemoryStore>,
    code: &RoomCode,
    actor: &SessionContext,
    turn: Turn,
) -> Result<(), SubmitError> {
    submit_turn(
        &**lobby.store(),
        lobby.config(),
        code,
        &actor.player_id,
        turn,
    )
    .await
}

/// Creates a room, seats both players, and starts the game.
async fn started_room(
    lobby: &Lobby<MemoryStore>,
    game_type: GameType,
) -> (RoomCode, SessionContext, SessionContext) {
    let host = session("host-token", "Ana");
    let guest = session("guest-token", "Bo");
    let room = lobby.create(game_type, &host).await.unwrap();
    lobby.join(&room.code, &guest).await.unwrap();
    submit(lobby, &room.code, &host, Turn::Start).await.unwrap();
    (room.code, host, guest)
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_create_seats_host_with_ping() {
    let lobby = lobby();
    let host = session("host-token", "Ana");

    let room = lobby.create(GameType::Elimination, &host).await.unwrap();

    assert_eq!(room.status, RoomStatus::Waiting);
    assert_eq!(room.players.len(), 1);
    assert!(room.is_host(&host.player_id));
    assert!(room.pings.contains_key(&host.player_id));
    assert!(room.game_data.is_none());

    let stored = lobby.fetch(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.players, room.players);
}

#[tokio::test]
async fn test_join_seats_second_player_and_bumps_activity() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let guest = session("guest-token", "Bo");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();

    let joined = lobby.join(&room.code, &guest).await.unwrap();

    assert_eq!(joined.players.len(), 2);
    assert!(joined.is_host(&host.player_id), "host stays at seat 0");
    assert!(!joined.players[1].is_host);
    assert!(joined.pings.contains_key(&guest.player_id));
    assert!(joined.last_activity >= room.last_activity);
}

#[tokio::test]
async fn test_join_unknown_code_is_not_found() {
    let lobby = lobby();
    let guest = session("guest-token", "Bo");
    let code: RoomCode = "ZZZZZZ".parse().unwrap();

    let result = lobby.join(&code, &guest).await;
    assert!(matches!(result, Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_join_is_idempotent_for_seated_player() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let guest = session("guest-token", "Bo");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    lobby.join(&room.code, &guest).await.unwrap();

    let again = lobby.join(&room.code, &guest).await.unwrap();

    assert_eq!(again.players.len(), 2, "no duplicate seat");
    let stored = lobby.fetch(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 2);
}

#[tokio::test]
async fn test_third_distinct_joiner_is_rejected() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    lobby.join(&room.code, &session("b", "Bo")).await.unwrap();

    let result = lobby.join(&room.code, &session("c", "Cy")).await;

    assert!(matches!(result, Err(RoomError::RoomFull(_))));
    let stored = lobby.fetch(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 2, "capacity invariant holds");
}

#[tokio::test]
async fn test_racing_joiners_fill_exactly_one_seat() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();

    let racer_b = session("b", "Bo");
    let racer_c = session("c", "Cy");
    let (left, right) = tokio::join!(
        lobby.join(&room.code, &racer_b),
        lobby.join(&room.code, &racer_c),
    );

    let winners = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one racer takes the last seat");
    assert!(
        matches!(left, Err(RoomError::RoomFull(_))) || matches!(right, Err(RoomError::RoomFull(_)))
    );
    let stored = lobby.fetch(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 2);
}

#[tokio::test]
async fn test_leave_unseats_player_and_clears_ping() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let guest = session("guest-token", "Bo");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    lobby.join(&room.code, &guest).await.unwrap();

    lobby.leave(&room.code, &guest.player_id).await.unwrap();

    let stored = lobby.fetch(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 1);
    assert!(!stored.pings.contains_key(&guest.player_id));
    assert_eq!(stored.status, RoomStatus::Waiting, "leave never touches status");
}

#[tokio::test]
async fn test_last_player_leaving_deletes_the_room() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();

    lobby.leave(&room.code, &host.player_id).await.unwrap();

    assert!(lobby.fetch(&room.code).await.unwrap().is_none());
    // Leaving again is a quiet success.
    lobby.leave(&room.code, &host.player_id).await.unwrap();
}

#[tokio::test]
async fn test_abandon_mid_game_forfeits_in_one_update() {
    let lobby = lobby();
    let (code, host, guest) = started_room(&lobby, GameType::Guessing).await;

    lobby.abandon(&code, &host.player_id).await.unwrap();

    let stored = lobby.fetch(&code).await.unwrap().unwrap();
    assert_eq!(stored.status, RoomStatus::Finished);
    assert_eq!(stored.players.len(), 1);
    assert_eq!(stored.players[0].id, guest.player_id);
    match stored.game_data.unwrap() {
        GameData::Guessing(data) => assert_eq!(data.winner, Some(guest.player_id)),
        GameData::Elimination(_) => panic!("wrong game data"),
    }
}

#[tokio::test]
async fn test_abandon_before_start_behaves_like_leave() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let guest = session("guest-token", "Bo");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    lobby.join(&room.code, &guest).await.unwrap();

    lobby.abandon(&room.code, &guest.player_id).await.unwrap();

    let stored = lobby.fetch(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.status, RoomStatus::Waiting);
    assert_eq!(stored.players.len(), 1);
    assert!(stored.game_data.is_none());
}

// =========================================================================
// Reclamation
// =========================================================================

/// Rewrites a room's timing fields to simulate age.
async fn doctor_timestamps(
    store: &MemoryStore,
    code: &RoomCode,
    created_at: u64,
    last_activity: u64,
    ping: Option<u64>,
) {
    let mut patch = Patch::new()
        .set("createdAt", json!(created_at))
        .set("lastActivity", json!(last_activity));
    patch = match ping {
        Some(at) => patch.set("pings", json!({ "host-token": at })),
        None => patch.set("pings", json!({})),
    };
    store.update(&code.storage_key(), patch).await.unwrap();
}

#[tokio::test]
async fn test_sweep_reclaims_idle_room_despite_fresh_pings() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    let now = now_ms();
    doctor_timestamps(
        lobby.store(),
        &room.code,
        now - 20 * MINUTE,
        now - 16 * MINUTE,
        Some(now), // heartbeats still fresh: the idle cap wins anyway
    )
    .await;

    let deleted = lobby.sweep().await.unwrap();

    assert_eq!(deleted, 1);
    assert!(lobby.fetch(&room.code).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_reclaims_silent_room_past_grace() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    let now = now_ms();
    doctor_timestamps(lobby.store(), &room.code, now - 3 * MINUTE, now - MINUTE, None).await;

    assert_eq!(lobby.sweep().await.unwrap(), 1);
    assert!(lobby.fetch(&room.code).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_spares_young_room_without_pings() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    let now = now_ms();
    doctor_timestamps(lobby.store(), &room.code, now - MINUTE, now - MINUTE, None).await;

    assert_eq!(lobby.sweep().await.unwrap(), 0);
    assert!(lobby.fetch(&room.code).await.unwrap().is_some());
}

#[tokio::test]
async fn test_join_after_expiry_finds_nothing() {
    let lobby = lobby();
    let host = session("host-token", "Ana");
    let room = lobby.create(GameType::Guessing, &host).await.unwrap();
    let now = now_ms();
    doctor_timestamps(
        lobby.store(),
        &room.code,
        now - 20 * MINUTE,
        now - 16 * MINUTE,
        None,
    )
    .await;

    // Join sweeps opportunistically first, so the dead room is gone by
    // the time the code is resolved.
    let result = lobby.join(&room.code, &session("b", "Bo")).await;
    assert!(matches!(result, Err(RoomError::NotFound(_))));
}

// =========================================================================
// Game flows through the synchronizer
// =========================================================================

#[tokio::test]
async fn test_elimination_flow_roll_and_play() {
    let lobby = lobby();
    let (code, host, guest) = started_room(&lobby, GameType::Elimination).await;

    submit(&lobby, &code, &host, Turn::Roll { total: 9 }).await.unwrap();
    let numbers: BTreeSet<u8> = [4, 5].into();
    submit(&lobby, &code, &host, Turn::Play { numbers }).await.unwrap();

    let stored = lobby.fetch(&code).await.unwrap().unwrap();
    match stored.game_data.unwrap() {
        GameData::Elimination(data) => {
            let seat = &data.players[&host.player_id];
            assert_eq!(seat.score, 69);
            assert_eq!(seat.numbers.len(), 10);
            assert_eq!(data.current_turn, guest.player_id);
            assert_eq!(data.last_roll, None);
        }
        GameData::Guessing(_) => panic!("wrong game data"),
    }
}

#[tokio::test]
async fn test_out_of_turn_move_is_rejected_without_a_write() {
    let lobby = lobby();
    let (code, _host, guest) = started_room(&lobby, GameType::Elimination).await;
    let before = lobby.fetch(&code).await.unwrap().unwrap();

    let result = submit(&lobby, &code, &guest, Turn::Roll { total: 9 }).await;

    assert!(matches!(
        result,
        Err(SubmitError::Rejected(TurnError::NotYourTurn))
    ));
    let after = lobby.fetch(&code).await.unwrap().unwrap();
    assert_eq!(after.version, before.version, "no write was attempted");
}

#[tokio::test]
async fn test_guessing_flow_hints_turns_and_victory() {
    let lobby = lobby();
    let (code, host, guest) = started_room(&lobby, GameType::Guessing).await;

    // Setup: host's secret is 42, guest's is 17.
    submit(&lobby, &code, &host, Turn::SetSecret { number: 42 }).await.unwrap();
    submit(&lobby, &code, &guest, Turn::SetSecret { number: 17 }).await.unwrap();

    // Host guesses 50 against the guest's 17: hint says lower, turn flips.
    submit(&lobby, &code, &host, Turn::Guess { number: 50 }).await.unwrap();
    let stored = lobby.fetch(&code).await.unwrap().unwrap();
    let data = match stored.game_data.unwrap() {
        GameData::Guessing(data) => data,
        GameData::Elimination(_) => panic!("wrong game data"),
    };
    assert_eq!(data.players[&host.player_id].guesses[0].hint, Hint::Lower);
    assert_eq!(data.current_turn, guest.player_id);

    // Guest hits the host's 42 exactly and wins.
    submit(&lobby, &code, &guest, Turn::Guess { number: 42 }).await.unwrap();
    let stored = lobby.fetch(&code).await.unwrap().unwrap();
    assert_eq!(stored.status, RoomStatus::Finished);
    match stored.game_data.unwrap() {
        GameData::Guessing(data) => {
            assert_eq!(data.winner, Some(guest.player_id.clone()));
            assert_eq!(
                data.players[&guest.player_id].guesses[0].hint,
                Hint::Correct
            );
        }
        GameData::Elimination(_) => panic!("wrong game data"),
    }
}

#[tokio::test]
async fn test_rematch_gating_resets_on_second_distinct_vote() {
    let lobby = lobby();
    let (code, host, guest) = started_room(&lobby, GameType::Guessing).await;
    submit(&lobby, &code, &host, Turn::SetSecret { number: 42 }).await.unwrap();
    submit(&lobby, &code, &guest, Turn::SetSecret { number: 17 }).await.unwrap();
    // Host guesses the guest's secret outright to finish the game.
    submit(&lobby, &code, &host, Turn::Guess { number: 17 }).await.unwrap();

    // First vote: still finished, one recorded vote.
    submit(&lobby, &code, &guest, Turn::VoteRematch).await.unwrap();
    let stored = lobby.fetch(&code).await.unwrap().unwrap();
    assert_eq!(stored.status, RoomStatus::Finished);
    assert_eq!(
        stored.game_data.as_ref().unwrap().play_again_votes().len(),
        1
    );

    // Second distinct vote: fresh play-through.
    submit(&lobby, &code, &host, Turn::VoteRematch).await.unwrap();
    let stored = lobby.fetch(&code).await.unwrap().unwrap();
    assert_eq!(stored.status, RoomStatus::Waiting);
    assert!(stored.game_data.is_none(), "game data and votes cleared");
    assert_eq!(stored.players.len(), 2, "both players stay seated");
}

#[tokio::test]
async fn test_rematch_unavailable_after_opponent_leaves() {
    let lobby = lobby();
    let (code, host, guest) = started_room(&lobby, GameType::Guessing).await;
    submit(&lobby, &code, &host, Turn::SetSecret { number: 42 }).await.unwrap();
    submit(&lobby, &code, &guest, Turn::SetSecret { number: 17 }).await.unwrap();
    submit(&lobby, &code, &host, Turn::Guess { number: 17 }).await.unwrap();

    lobby.leave(&code, &guest.player_id).await.unwrap();

    let result = submit(&lobby, &code, &host, Turn::VoteRematch).await;
    assert!(matches!(
        result,
        Err(SubmitError::Rejected(TurnError::RematchUnavailable))
    ));
}
