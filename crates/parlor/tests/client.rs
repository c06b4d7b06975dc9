//! End-to-end tests: two clients on one shared store playing full games.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use parlor::prelude::*;
use parlor_store::Store;

type Client = RoomClient<MemoryStore, DisconnectPresence>;

fn client(store: &Arc<MemoryStore>, name: &str) -> Client {
    let vault = MemoryVault::new();
    let session = SessionContext::restore_or_create(&vault, name).unwrap();
    RoomClient::new(
        Arc::clone(store),
        session,
        DisconnectPresence::default(),
        LobbyConfig::default(),
    )
}

/// Waits until the feed shows a room satisfying the predicate.
async fn wait_for(
    rx: &mut watch::Receiver<Option<Room>>,
    pred: impl Fn(&Room) -> bool,
) -> Room {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let hit = rx.borrow_and_update().as_ref().is_some_and(&pred);
            if hit {
                return rx.borrow().clone().expect("just observed");
            }
            rx.changed().await.expect("snapshot feed closed");
        }
    })
    .await
    .expect("condition not reached in time")
}

fn guessing(room: &Room) -> &GuessingData {
    match room.game_data.as_ref().expect("game data present") {
        GameData::Guessing(data) => data,
        GameData::Elimination(_) => panic!("expected guessing data"),
    }
}

#[tokio::test]
async fn test_two_clients_play_a_full_guessing_game() {
    let store = Arc::new(MemoryStore::new());
    let mut host = client(&store, "Ana");
    let mut guest = client(&store, "Bo");

    let code = host.create_room(GameType::Guessing).await.unwrap();
    guest.join_room(&code).await.unwrap();

    // The host's pump observes the full waiting room and seeds the game.
    let mut host_rx = host.watch();
    let mut guest_rx = guest.watch();
    let room = wait_for(&mut host_rx, |room| room.status.is_playing()).await;
    assert_eq!(guessing(&room).phase, GuessPhase::Setup);

    // Both players lock their secrets; the second lock starts play.
    host.submit(Turn::SetSecret { number: 42 }).await.unwrap();
    guest.submit(Turn::SetSecret { number: 17 }).await.unwrap();
    let room = wait_for(&mut host_rx, |room| {
        guessing(room).phase == GuessPhase::Playing
    })
    .await;
    assert_eq!(guessing(&room).current_turn, host.session().player_id);

    // Host guesses 50 against the guest's 17: hint lower, turn flips.
    host.submit(Turn::Guess { number: 50 }).await.unwrap();
    let room = wait_for(&mut guest_rx, |room| {
        guessing(room).current_turn == guest.session().player_id
    })
    .await;
    let host_guesses = &guessing(&room).players[&host.session().player_id].guesses;
    assert_eq!(host_guesses.last().unwrap().hint, Hint::Lower);

    // Guest hits the host's 42 and wins.
    guest.submit(Turn::Guess { number: 42 }).await.unwrap();
    let room = wait_for(&mut host_rx, |room| room.status.is_finished()).await;
    assert_eq!(guessing(&room).winner, Some(guest.session().player_id.clone()));

    // The loser may still see their own turn flag off.
    let view = guest.view().expect("guest still seated");
    assert!(view.can_vote_rematch);
    assert!(!view.my_turn);
}

#[tokio::test]
async fn test_rematch_votes_reset_and_auto_start_a_fresh_game() {
    let store = Arc::new(MemoryStore::new());
    let mut host = client(&store, "Ana");
    let mut guest = client(&store, "Bo");

    let code = host.create_room(GameType::Guessing).await.unwrap();
    guest.join_room(&code).await.unwrap();
    let mut host_rx = host.watch();
    wait_for(&mut host_rx, |room| room.status.is_playing()).await;

    host.submit(Turn::SetSecret { number: 42 }).await.unwrap();
    guest.submit(Turn::SetSecret { number: 17 }).await.unwrap();
    wait_for(&mut host_rx, |room| {
        guessing(room).phase == GuessPhase::Playing
    })
    .await;
    // Host ends it immediately by guessing the guest's secret.
    host.submit(Turn::Guess { number: 17 }).await.unwrap();
    wait_for(&mut host_rx, |room| room.status.is_finished()).await;

    guest.submit(Turn::VoteRematch).await.unwrap();
    host.submit(Turn::VoteRematch).await.unwrap();

    // The reset flips the room to waiting; the host pump immediately
    // auto-starts a fresh play-through with clean game data.
    let room = wait_for(&mut host_rx, |room| {
        room.status.is_playing() && guessing(room).phase == GuessPhase::Setup
    })
    .await;
    let data = guessing(&room);
    assert_eq!(data.winner, None);
    assert!(data.play_again_votes.is_empty());
    assert!(data.players.values().all(|seat| !seat.has_set_number));
}

#[tokio::test]
async fn test_abandon_hands_victory_and_departure_in_one_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let mut host = client(&store, "Ana");
    let mut guest = client(&store, "Bo");

    let code = host.create_room(GameType::Guessing).await.unwrap();
    guest.join_room(&code).await.unwrap();
    let mut guest_rx = guest.watch();
    wait_for(&mut guest_rx, |room| room.status.is_playing()).await;

    host.abandon().await.unwrap();

    let room = wait_for(&mut guest_rx, |room| room.status.is_finished()).await;
    assert_eq!(room.players.len(), 1, "abandoner unseated in the same update");
    assert_eq!(
        guessing(&room).winner,
        Some(guest.session().player_id.clone())
    );
    assert!(host.current_room().is_none(), "abandoner forgot the room");
}

#[tokio::test]
async fn test_leaving_last_player_deletes_the_room() {
    let store = Arc::new(MemoryStore::new());
    let mut host = client(&store, "Ana");
    let code = host.create_room(GameType::Guessing).await.unwrap();
    let key = code.storage_key();
    assert!(store.get(&key).await.unwrap().is_some());

    host.leave().await.unwrap();

    assert!(store.get(&key).await.unwrap().is_none());
    assert!(host.current_room().is_none());
    assert!(host.room_code().is_none());
}

#[tokio::test]
async fn test_both_players_heartbeat_into_the_document() {
    let store = Arc::new(MemoryStore::new());
    let mut host = client(&store, "Ana");
    let mut guest = client(&store, "Bo");

    let code = host.create_room(GameType::Guessing).await.unwrap();
    guest.join_room(&code).await.unwrap();

    let doc = store.get(&code.storage_key()).await.unwrap().unwrap();
    assert!(doc["pings"][host.session().player_id.as_str()].is_u64());
    assert!(doc["pings"][guest.session().player_id.as_str()].is_u64());
}

#[tokio::test]
async fn test_pump_forgets_a_deleted_room() {
    let store = Arc::new(MemoryStore::new());
    let mut host = client(&store, "Ana");
    let code = host.create_room(GameType::Guessing).await.unwrap();
    let mut rx = host.watch();
    wait_for(&mut rx, |room| room.code == code).await;

    // The room expires out from under the client (sweep on another
    // machine, for instance).
    store.remove(&code.storage_key()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if rx.borrow_and_update().is_none() {
                break;
            }
            rx.changed().await.expect("snapshot feed closed");
        }
    })
    .await
    .expect("client should observe the deletion");
    assert!(host.current_room().is_none());
}

#[tokio::test]
async fn test_submit_without_a_room_is_rejected_locally() {
    let store = Arc::new(MemoryStore::new());
    let host = client(&store, "Ana");

    let result = host.submit(Turn::VoteRematch).await;
    assert!(matches!(result, Err(ClientError::NotAttached)));
}
