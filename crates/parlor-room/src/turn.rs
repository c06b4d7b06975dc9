//! The turn synchronizer: every game-state mutation funnels through here.
//!
//! [`apply_turn`] is pure: it validates an intent against a room snapshot
//! and returns the atomic patch that advances the shared document, or a
//! [`TurnError`] that dies locally without a write ever being attempted.
//! [`submit_turn`] wraps it in the read, conditional-write, retry loop
//! that actually lands the patch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use parlor_games as games;
use parlor_games::RuleError;
use parlor_protocol::{
    EliminationData, GameData, GuessPhase, GuessingData, Hint, Outcome, PlayerId, Room,
    RoomCode, RoomPatch, RoomStatus, decode_room, now_ms,
};
use parlor_store::{Patch, Store, StoreError};

use crate::{LobbyConfig, RoomError};

/// A player intent against the shared game state.
///
/// Serializable so a future transport can ship intents as data; today it
/// is simply the one interface all mutation paths share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "camelCase")]
pub enum Turn {
    /// Seed initial game state once both seats are filled (host only).
    Start,
    /// Record a dice roll (elimination game).
    Roll { total: u8 },
    /// Knock down a subset of numbers matching the pending roll.
    Play { numbers: BTreeSet<u8> },
    /// Give up the turn: no subset of the remaining numbers matches the
    /// pending roll, which finishes this player.
    EndTurn,
    /// Choose a secret number during setup (guessing game).
    SetSecret { number: u8 },
    /// Unlock the chosen secret while the game is still in setup.
    ClearSecret,
    /// Guess the opponent's secret.
    Guess { number: u8 },
    /// Vote to play again once the game is finished.
    VoteRematch,
}

/// Why an intent was rejected locally.
///
/// These never reach the store; the caller surfaces them (or drops them)
/// as it sees fit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    /// The actor holds no seat in this room.
    #[error("you are not seated in this room")]
    NotSeated,

    /// A game move arrived while the room is still waiting.
    #[error("the game has not started")]
    NotStarted,

    /// A game move arrived after the game finished.
    #[error("the game is already over")]
    GameOver,

    /// Start arrived while a game is already running or finished.
    #[error("the game has already started")]
    AlreadyStarted,

    /// Only the player at seat 0 may seed game state.
    #[error("only the host can start the game")]
    NotHost,

    /// Start needs both seats filled.
    #[error("both seats must be filled to start")]
    NotEnoughPlayers,

    /// It is the opponent's turn.
    #[error("not your turn")]
    NotYourTurn,

    /// A roll is already waiting to be played.
    #[error("a roll is already pending")]
    RollPending,

    /// The move needs a pending roll first.
    #[error("roll the dice first")]
    NoPendingRoll,

    /// The actor's secret is already locked in.
    #[error("your number is already locked in")]
    SecretLocked,

    /// The move needs a secret that has not been chosen yet.
    #[error("no secret number has been chosen")]
    SecretNotSet,

    /// The intent is not legal in the current phase.
    #[error("wrong phase for this move")]
    WrongPhase,

    /// There is no opponent seated to play against.
    #[error("no opponent seated")]
    NoOpponent,

    /// Rematch voting needs a finished game with both players present.
    #[error("rematch is not available")]
    RematchUnavailable,

    /// The intent belongs to the other game variant.
    #[error("this move belongs to the other game")]
    WrongGame,

    /// The rule engine rejected the move.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Failure of a submitted turn: either a local rejection (no write
/// attempted) or an infrastructure failure around the write.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(#[from] TurnError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

/// True when this client should seed initial game state: both seats
/// filled, still waiting, and the actor sits at index 0 (hostship is
/// positional, never the stored flag).
pub fn should_auto_start(room: &Room, actor: &PlayerId) -> bool {
    room.status.is_waiting() && room.is_full() && room.is_host(actor)
}

/// Validates an intent against a snapshot and computes the patch that
/// advances the room. Pure; the caller owns the conditional write.
pub fn apply_turn(
    room: &Room,
    actor: &PlayerId,
    turn: Turn,
    now: u64,
) -> Result<Patch, TurnError> {
    if !room.contains(actor) {
        return Err(TurnError::NotSeated);
    }

    match turn {
        Turn::Start => start(room, actor, now),
        Turn::VoteRematch => vote_rematch(room, actor, now),
        game_move => {
            match room.status {
                RoomStatus::Waiting => return Err(TurnError::NotStarted),
                RoomStatus::Finished => return Err(TurnError::GameOver),
                RoomStatus::Playing => {}
            }
            let data = room.game_data.as_ref().ok_or(TurnError::NotStarted)?;
            if data.is_decided() {
                return Err(TurnError::GameOver);
            }
            match (data, game_move) {
                (GameData::Elimination(data), Turn::Roll { total }) => {
                    roll(data, actor, total, now)
                }
                (GameData::Elimination(data), Turn::Play { numbers }) => {
                    play(room, data, actor, &numbers, now)
                }
                (GameData::Elimination(data), Turn::EndTurn) => {
                    end_turn(room, data, actor, now)
                }
                (GameData::Guessing(data), Turn::SetSecret { number }) => {
                    set_secret(data, actor, number, now)
                }
                (GameData::Guessing(data), Turn::ClearSecret) => {
                    clear_secret(data, actor, now)
                }
                (GameData::Guessing(data), Turn::Guess { number }) => {
                    guess(room, data, actor, number, now)
                }
                _ => Err(TurnError::WrongGame),
            }
        }
    }
}

/// Reads, applies, and conditionally writes a turn, retrying with a fresh
/// snapshot while the write keeps losing to concurrent updates.
pub async fn submit_turn<S: Store>(
    store: &S,
    config: &LobbyConfig,
    code: &RoomCode,
    actor: &PlayerId,
    turn: Turn,
) -> Result<(), SubmitError> {
    let key = code.storage_key();
    for _ in 0..=config.write_retries {
        let Some(value) = store.get(&key).await.map_err(RoomError::from)? else {
            return Err(RoomError::NotFound(code.clone()).into());
        };
        let room = decode_room(&value).map_err(RoomError::from)?;
        let patch = apply_turn(&room, actor, turn.clone(), now_ms())?;

        match store.update_if(&key, room.version, patch).await {
            Ok(()) => {
                tracing::debug!(%code, %actor, "turn applied");
                return Ok(());
            }
            Err(StoreError::Conflict { .. }) => continue,
            Err(StoreError::Missing(_)) => {
                return Err(RoomError::NotFound(code.clone()).into());
            }
            Err(err) => return Err(RoomError::from(err).into()),
        }
    }
    Err(RoomError::Contended(code.clone()).into())
}

// ---------------------------------------------------------------------------
// Lifecycle intents
// ---------------------------------------------------------------------------

fn start(room: &Room, actor: &PlayerId, now: u64) -> Result<Patch, TurnError> {
    if !room.status.is_waiting() {
        return Err(TurnError::AlreadyStarted);
    }
    if !room.is_full() {
        return Err(TurnError::NotEnoughPlayers);
    }
    if !room.is_host(actor) {
        return Err(TurnError::NotHost);
    }

    let data = GameData::initial(room.game_type, &room.players);
    Ok(RoomPatch::new()
        .status(RoomStatus::Playing)
        .game_data(&data)
        .last_activity(now)
        .into_patch())
}

fn vote_rematch(room: &Room, actor: &PlayerId, now: u64) -> Result<Patch, TurnError> {
    if !room.status.is_finished() || !room.is_full() {
        // The opponent left (or the game never ended): the only way out
        // is back to the lobby.
        return Err(TurnError::RematchUnavailable);
    }
    let data = room.game_data.as_ref().ok_or(TurnError::NotStarted)?;

    let opponent_voted = room
        .opponent_of(actor)
        .is_some_and(|op| data.play_again_votes().contains(&op.id));
    if opponent_voted {
        // Second distinct vote: reset for a fresh play-through. Votes
        // clear with the game data.
        return Ok(RoomPatch::new()
            .status(RoomStatus::Waiting)
            .clear_game_data()
            .last_activity(now)
            .into_patch());
    }

    let mut data = data.clone();
    match &mut data {
        GameData::Elimination(inner) => {
            inner.play_again_votes.insert(actor.clone());
        }
        GameData::Guessing(inner) => {
            inner.play_again_votes.insert(actor.clone());
        }
    }
    Ok(RoomPatch::new()
        .game_data(&data)
        .last_activity(now)
        .into_patch())
}

// ---------------------------------------------------------------------------
// Elimination intents
// ---------------------------------------------------------------------------

fn ensure_turn(data_turn: &PlayerId, actor: &PlayerId) -> Result<(), TurnError> {
    if data_turn != actor {
        return Err(TurnError::NotYourTurn);
    }
    Ok(())
}

/// Passes the turn to the opponent unless they are already finished; a
/// sole unfinished player keeps rolling.
fn pass_elimination_turn(data: &mut EliminationData, room: &Room, actor: &PlayerId) {
    if let Some(opponent) = room.opponent_of(actor) {
        let opponent_active = data
            .players
            .get(&opponent.id)
            .is_some_and(|seat| !seat.is_finished);
        if opponent_active {
            data.current_turn = opponent.id.clone();
        }
    }
}

fn roll(
    data: &EliminationData,
    actor: &PlayerId,
    total: u8,
    now: u64,
) -> Result<Patch, TurnError> {
    ensure_turn(&data.current_turn, actor)?;
    if data.last_roll.is_some() {
        return Err(TurnError::RollPending);
    }
    games::validate_roll_total(total)?;

    let mut data = data.clone();
    data.last_roll = Some(total);
    Ok(RoomPatch::new()
        .game_data(&GameData::Elimination(data))
        .last_activity(now)
        .into_patch())
}

fn play(
    room: &Room,
    data: &EliminationData,
    actor: &PlayerId,
    numbers: &BTreeSet<u8>,
    now: u64,
) -> Result<Patch, TurnError> {
    ensure_turn(&data.current_turn, actor)?;
    let roll = data.last_roll.ok_or(TurnError::NoPendingRoll)?;

    let mut data = data.clone();
    let seat = data.players.get_mut(actor).ok_or(TurnError::NotSeated)?;
    games::apply_move(seat, roll, numbers)?;
    let board_cleared = seat.numbers.is_empty();
    data.last_roll = None;

    let mut patch = RoomPatch::new().last_activity(now);
    if board_cleared {
        data.winner = Some(Outcome::winner(actor.clone()));
        patch = patch.status(RoomStatus::Finished);
    } else {
        pass_elimination_turn(&mut data, room, actor);
    }
    Ok(patch.game_data(&GameData::Elimination(data)).into_patch())
}

fn end_turn(
    room: &Room,
    data: &EliminationData,
    actor: &PlayerId,
    now: u64,
) -> Result<Patch, TurnError> {
    ensure_turn(&data.current_turn, actor)?;
    let roll = data.last_roll.ok_or(TurnError::NoPendingRoll)?;

    let seat = data.players.get(actor).ok_or(TurnError::NotSeated)?;
    games::mark_stuck_allowed(roll, &seat.numbers)?;

    let mut data = data.clone();
    if let Some(seat) = data.players.get_mut(actor) {
        seat.is_finished = true;
    }
    data.last_roll = None;

    let mut patch = RoomPatch::new().last_activity(now);
    if data.players.values().all(|seat| seat.is_finished) {
        // Both exhausted: the lower remaining score wins.
        data.winner = Some(decide_by_score(&data));
        patch = patch.status(RoomStatus::Finished);
    } else {
        pass_elimination_turn(&mut data, room, actor);
    }
    Ok(patch.game_data(&GameData::Elimination(data)).into_patch())
}

fn decide_by_score(data: &EliminationData) -> Outcome {
    let best = data.players.values().map(|seat| seat.score).min();
    let Some(best) = best else {
        return Outcome::Tie;
    };
    let mut leaders = data
        .players
        .iter()
        .filter(|(_, seat)| seat.score == best)
        .map(|(id, _)| id);
    match (leaders.next(), leaders.next()) {
        (Some(id), None) => Outcome::winner(id.clone()),
        _ => Outcome::Tie,
    }
}

// ---------------------------------------------------------------------------
// Guessing intents
// ---------------------------------------------------------------------------

fn set_secret(
    data: &GuessingData,
    actor: &PlayerId,
    number: u8,
    now: u64,
) -> Result<Patch, TurnError> {
    if data.phase != GuessPhase::Setup {
        return Err(TurnError::WrongPhase);
    }
    let seat = data.players.get(actor).ok_or(TurnError::NotSeated)?;
    if seat.has_set_number {
        return Err(TurnError::SecretLocked);
    }
    games::validate_secret(number)?;

    let mut data = data.clone();
    if let Some(seat) = data.players.get_mut(actor) {
        seat.secret_number = Some(number);
        seat.has_set_number = true;
    }
    // The second lock starts the guessing.
    let everyone_locked =
        data.players.len() == 2 && data.players.values().all(|s| s.has_set_number);
    if everyone_locked {
        data.phase = GuessPhase::Playing;
    }

    Ok(RoomPatch::new()
        .game_data(&GameData::Guessing(data))
        .last_activity(now)
        .into_patch())
}

fn clear_secret(
    data: &GuessingData,
    actor: &PlayerId,
    now: u64,
) -> Result<Patch, TurnError> {
    if data.phase != GuessPhase::Setup {
        return Err(TurnError::WrongPhase);
    }
    let seat = data.players.get(actor).ok_or(TurnError::NotSeated)?;
    if !seat.has_set_number {
        return Err(TurnError::SecretNotSet);
    }

    let mut data = data.clone();
    if let Some(seat) = data.players.get_mut(actor) {
        seat.secret_number = None;
        seat.has_set_number = false;
    }
    Ok(RoomPatch::new()
        .game_data(&GameData::Guessing(data))
        .last_activity(now)
        .into_patch())
}

fn guess(
    room: &Room,
    data: &GuessingData,
    actor: &PlayerId,
    number: u8,
    now: u64,
) -> Result<Patch, TurnError> {
    if data.phase != GuessPhase::Playing {
        return Err(TurnError::WrongPhase);
    }
    ensure_turn(&data.current_turn, actor)?;
    games::validate_secret(number)?;

    let opponent = room.opponent_of(actor).ok_or(TurnError::NoOpponent)?;
    let secret = data
        .players
        .get(&opponent.id)
        .and_then(|seat| seat.secret_number)
        .ok_or(TurnError::SecretNotSet)?;

    let hint = games::hint_for(number, secret);
    let mut data = data.clone();
    if let Some(seat) = data.players.get_mut(actor) {
        games::record_guess(seat, number, hint);
    }
    // Turn passes regardless of the hint.
    data.current_turn = opponent.id.clone();

    let mut patch = RoomPatch::new().last_activity(now);
    if hint == Hint::Correct {
        data.winner = Some(actor.clone());
        patch = patch.status(RoomStatus::Finished);
    }
    Ok(patch.game_data(&GameData::Guessing(data)).into_patch())
}

// =========================================================================
// Tests
// =========================================================================
