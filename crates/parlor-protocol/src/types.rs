//! The persisted room document and its building blocks.
//!
//! Field names follow the stored layout (`camelCase`, one document per
//! room under `rooms/<code>`), so a document written by one client decodes
//! identically on the other side of the store.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Document timestamps (`createdAt`, `lastActivity`, pings) are wall-clock
/// values because they are compared across machines by the reclamation
/// sweep.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable, opaque per-browser player token.
///
/// Generated locally and never verified; player identity is not an
/// authentication concern here. Serializes as the bare string so it can
/// key JSON maps (`pings`, per-player game seats).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps an existing token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 6-character room code: base-36 digits, normalized to uppercase.
///
/// Codes are what players type to join each other, so parsing accepts any
/// case and surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

/// Code length in characters.
const CODE_LEN: usize = 6;

/// Base-36 digit set codes are drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

impl RoomCode {
    /// Generates a fresh random code.
    ///
    /// Uniqueness is not checked here; creation handles collisions by
    /// regenerating when the store reports the code as live.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// The normalized code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The store key this room's document lives under.
    pub fn storage_key(&self) -> String {
        format!("rooms/{}", self.0)
    }

    /// Recovers a code from a store key, if the key is in the rooms
    /// namespace.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        key.strip_prefix("rooms/")
            .and_then(|code| code.parse().ok())
    }
}

impl FromStr for RoomCode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.trim().to_ascii_uppercase();
        let valid = normalized.len() == CODE_LEN
            && normalized.bytes().all(|b| CODE_ALPHABET.contains(&b));
        if !valid {
            return Err(CodecError::InvalidCode(s.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Players and room lifecycle
// ---------------------------------------------------------------------------

/// A seated player as stored in the room document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    /// Display name (2–20 characters, validated at the session layer).
    pub name: String,
    /// Written once at creation/join time and never recomputed, so it
    /// goes stale when the host leaves. Display metadata only; derive
    /// hostship through [`Room::is_host`] instead.
    pub is_host: bool,
}

/// The lifecycle state of a room.
///
/// Monotonic within a single play-through:
///
/// ```text
/// Waiting → Playing → Finished
///    ↑                    │
///    └──────(reset)───────┘
/// ```
///
/// The `Finished → Waiting` edge is the rematch reset: same room, same
/// players, a fresh play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting its second player.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if a game is in progress.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Returns `true` if the current play-through has ended.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Playing)
                | (Self::Playing, Self::Finished)
                | (Self::Finished, Self::Waiting)
        )
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Which of the two games a room plays. Set at creation, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Elimination,
    Guessing,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elimination => write!(f, "elimination"),
            Self::Guessing => write!(f, "guessing"),
        }
    }
}

// ---------------------------------------------------------------------------
// Game data: elimination variant
// ---------------------------------------------------------------------------

/// How a finished elimination game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    /// One player won.
    Winner { id: PlayerId },
    /// Both players exhausted their rolls on equal scores.
    Tie,
}

impl Outcome {
    /// Shorthand for a decided winner.
    pub fn winner(id: PlayerId) -> Self {
        Self::Winner { id }
    }

    /// The winning player, if the outcome is not a tie.
    pub fn winner_id(&self) -> Option<&PlayerId> {
        match self {
            Self::Winner { id } => Some(id),
            Self::Tie => None,
        }
    }
}

/// One player's side of the elimination board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationSeat {
    /// Numbers still up, drawn from 1..=12.
    pub numbers: BTreeSet<u8>,
    /// Cached sum of `numbers`. Recomputed on every accepted move, never
    /// settable independently.
    pub score: u8,
    /// Set once this player has no legal move for a rolled total.
    pub is_finished: bool,
}

impl EliminationSeat {
    /// The full starting board: 1..=12 up, score 78.
    pub fn starting() -> Self {
        let numbers: BTreeSet<u8> = (1..=12).collect();
        let score = numbers.iter().sum();
        Self {
            numbers,
            score,
            is_finished: false,
        }
    }
}

/// Shared state of an elimination game in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationData {
    pub current_turn: PlayerId,
    /// Total of the two dice, present only between a roll and the move
    /// (or end-of-turn) that consumes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_roll: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Outcome>,
    #[serde(default)]
    pub play_again_votes: BTreeSet<PlayerId>,
    pub players: BTreeMap<PlayerId, EliminationSeat>,
}

impl EliminationData {
    /// Fresh game state for two seated players; the host rolls first.
    pub fn initial(players: &[Player]) -> Self {
        Self {
            current_turn: players[0].id.clone(),
            last_roll: None,
            winner: None,
            play_again_votes: BTreeSet::new(),
            players: players
                .iter()
                .map(|p| (p.id.clone(), EliminationSeat::starting()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Game data: guessing variant
// ---------------------------------------------------------------------------

/// The two stages of a guessing game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuessPhase {
    /// Both players are choosing their secret numbers.
    Setup,
    /// Alternating guesses until someone hits the opponent's secret.
    Playing,
}

/// The answer a guess receives, relative to the opponent's secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hint {
    /// The secret is higher than the guess.
    Higher,
    /// The secret is lower than the guess.
    Lower,
    /// The guess is the secret; the guesser wins.
    Correct,
}

/// One submitted guess with its hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    pub number: u8,
    pub hint: Hint,
}

/// One player's side of the guessing game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuessingSeat {
    /// 1..=100 once chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_number: Option<u8>,
    /// Locked in: the seat's secret can no longer be changed once the
    /// game leaves setup.
    #[serde(default)]
    pub has_set_number: bool,
    /// This player's guesses against the opponent's secret, in order.
    #[serde(default)]
    pub guesses: Vec<Guess>,
}

/// Shared state of a guessing game in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessingData {
    pub current_turn: PlayerId,
    pub phase: GuessPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    #[serde(default)]
    pub play_again_votes: BTreeSet<PlayerId>,
    pub players: BTreeMap<PlayerId, GuessingSeat>,
}

impl GuessingData {
    /// Fresh game state: empty secrets, setup phase, host guesses first.
    pub fn initial(players: &[Player]) -> Self {
        Self {
            current_turn: players[0].id.clone(),
            phase: GuessPhase::Setup,
            winner: None,
            play_again_votes: BTreeSet::new(),
            players: players
                .iter()
                .map(|p| (p.id.clone(), GuessingSeat::default()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// The tagged union and the room aggregate
// ---------------------------------------------------------------------------

/// Game state, discriminated by the room's game type.
///
/// Every mutation path pattern-matches this tag; no code may assume a
/// shape without checking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gameType", rename_all = "lowercase")]
pub enum GameData {
    Elimination(EliminationData),
    Guessing(GuessingData),
}

impl GameData {
    /// Builds the initial state for a starting game.
    pub fn initial(game_type: GameType, players: &[Player]) -> Self {
        match game_type {
            GameType::Elimination => Self::Elimination(EliminationData::initial(players)),
            GameType::Guessing => Self::Guessing(GuessingData::initial(players)),
        }
    }

    /// Which game this data belongs to.
    pub fn game_type(&self) -> GameType {
        match self {
            Self::Elimination(_) => GameType::Elimination,
            Self::Guessing(_) => GameType::Guessing,
        }
    }

    /// The player currently on turn.
    pub fn current_turn(&self) -> &PlayerId {
        match self {
            Self::Elimination(data) => &data.current_turn,
            Self::Guessing(data) => &data.current_turn,
        }
    }

    /// Returns `true` once the game has a decided outcome.
    pub fn is_decided(&self) -> bool {
        match self {
            Self::Elimination(data) => data.winner.is_some(),
            Self::Guessing(data) => data.winner.is_some(),
        }
    }

    /// Rematch votes cast so far.
    pub fn play_again_votes(&self) -> &BTreeSet<PlayerId> {
        match self {
            Self::Elimination(data) => &data.play_again_votes,
            Self::Guessing(data) => &data.play_again_votes,
        }
    }
}

/// The root aggregate: one shared document per room code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub code: RoomCode,
    pub game_type: GameType,
    /// 0–2 seated players; index 0 is the host. A room observed with 0
    /// players is garbage awaiting deletion.
    pub players: Vec<Player>,
    pub status: RoomStatus,
    /// Creation timestamp in ms. Fixed.
    pub created_at: u64,
    /// Bumped on every accepted game-state mutation; drives idle expiry.
    pub last_activity: u64,
    /// Last heartbeat per player in ms; drives presence expiry.
    #[serde(default)]
    pub pings: BTreeMap<PlayerId, u64>,
    /// Present exactly while `status != Waiting`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_data: Option<GameData>,
    /// Store-managed write counter for conditional updates.
    #[serde(default)]
    pub version: u64,
}

impl Room {
    /// A fresh waiting room with the host seated and pinged.
    pub fn new(code: RoomCode, game_type: GameType, host: Player, now: u64) -> Self {
        let pings = BTreeMap::from([(host.id.clone(), now)]);
        Self {
            code,
            game_type,
            players: vec![host],
            status: RoomStatus::Waiting,
            created_at: now,
            last_activity: now,
            pings,
            game_data: None,
            version: 0,
        }
    }

    /// The authoritative host: whoever sits at index 0 right now.
    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    /// Derives hostship positionally. The stored `isHost` flag is not
    /// consulted; it goes stale when the original host leaves.
    pub fn is_host(&self, id: &PlayerId) -> bool {
        self.host().is_some_and(|p| &p.id == id)
    }

    /// Looks up a seated player.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// The other seated player, if any.
    pub fn opponent_of(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id != id)
    }

    /// Returns `true` if `id` holds a seat.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Returns `true` when both seats are taken.
    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    /// The freshest heartbeat timestamp across all seated players.
    pub fn freshest_ping(&self) -> Option<u64> {
        self.pings.values().copied().max()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s)
    }

    fn player(id: &str, name: &str, is_host: bool) -> Player {
        Player {
            id: pid(id),
            name: name.to_string(),
            is_host,
        }
    }

    // =====================================================================
    // RoomCode
    // =====================================================================

    #[test]
    fn test_room_code_generate_is_six_uppercase_base36() {
        for _ in 0..50 {
            let code = RoomCode::generate();
            assert_eq!(code.as_str().len(), 6);
            assert!(
                code.as_str()
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
            );
        }
    }

    #[test]
    fn test_room_code_parse_normalizes_case_and_whitespace() {
        let code: RoomCode = " ab12cd ".parse().unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_room_code_parse_rejects_bad_input() {
        assert!("".parse::<RoomCode>().is_err());
        assert!("ABC".parse::<RoomCode>().is_err());
        assert!("ABCDEFG".parse::<RoomCode>().is_err());
        assert!("AB-12C".parse::<RoomCode>().is_err());
    }

    #[test]
    fn test_room_code_storage_key_round_trip() {
        let code: RoomCode = "AB12CD".parse().unwrap();
        assert_eq!(code.storage_key(), "rooms/AB12CD");
        assert_eq!(RoomCode::from_storage_key("rooms/AB12CD"), Some(code));
        assert_eq!(RoomCode::from_storage_key("other/AB12CD"), None);
    }

    // =====================================================================
    // RoomStatus
    // =====================================================================

    #[test]
    fn test_room_status_transitions_are_monotonic_with_reset() {
        use RoomStatus::*;
        assert!(Waiting.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Finished));
        assert!(Finished.can_transition_to(Waiting)); // rematch reset
        assert!(!Waiting.can_transition_to(Finished));
        assert!(!Playing.can_transition_to(Waiting));
        assert!(!Finished.can_transition_to(Playing));
    }

    #[test]
    fn test_room_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RoomStatus::Waiting).unwrap(),
            json!("waiting")
        );
        assert_eq!(
            serde_json::to_value(RoomStatus::Playing).unwrap(),
            json!("playing")
        );
    }

    // =====================================================================
    // Document shapes
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        assert_eq!(serde_json::to_value(pid("abc123")).unwrap(), json!("abc123"));
    }

    #[test]
    fn test_game_data_is_tagged_by_game_type() {
        let data = GameData::initial(
            GameType::Guessing,
            &[player("a", "Ana", true), player("b", "Bo", false)],
        );
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["gameType"], "guessing");
        assert_eq!(value["phase"], "setup");
        assert_eq!(value["currentTurn"], "a");

        let decoded: GameData = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_elimination_initial_state_matches_starting_board() {
        let data = EliminationData::initial(&[
            player("a", "Ana", true),
            player("b", "Bo", false),
        ]);
        assert_eq!(data.current_turn, pid("a"));
        assert_eq!(data.last_roll, None);
        for seat in data.players.values() {
            assert_eq!(seat.numbers.len(), 12);
            assert_eq!(seat.score, 78);
            assert!(!seat.is_finished);
        }
    }

    #[test]
    fn test_outcome_serde_shapes() {
        let winner = serde_json::to_value(Outcome::winner(pid("a"))).unwrap();
        assert_eq!(winner, json!({ "kind": "winner", "id": "a" }));
        let tie = serde_json::to_value(Outcome::Tie).unwrap();
        assert_eq!(tie, json!({ "kind": "tie" }));
    }

    #[test]
    fn test_room_document_uses_camel_case_fields() {
        let code: RoomCode = "AB12CD".parse().unwrap();
        let room = Room::new(code, GameType::Elimination, player("a", "Ana", true), 1_000);
        let value = serde_json::to_value(&room).unwrap();

        assert_eq!(value["gameType"], "elimination");
        assert_eq!(value["createdAt"], 1_000);
        assert_eq!(value["lastActivity"], 1_000);
        assert_eq!(value["pings"]["a"], 1_000);
        assert!(value.get("gameData").is_none(), "absent while waiting");
    }

    #[test]
    fn test_room_decodes_without_optional_fields() {
        let value = json!({
            "code": "AB12CD",
            "gameType": "guessing",
            "players": [],
            "status": "waiting",
            "createdAt": 5,
            "lastActivity": 9,
        });
        let room: Room = serde_json::from_value(value).unwrap();
        assert!(room.pings.is_empty());
        assert!(room.game_data.is_none());
        assert_eq!(room.version, 0);
    }

    // =====================================================================
    // Room helpers
    // =====================================================================

    #[test]
    fn test_is_host_is_positional_even_when_flags_are_stale() {
        let code: RoomCode = "AB12CD".parse().unwrap();
        let mut room = Room::new(code, GameType::Guessing, player("a", "Ana", true), 0);
        room.players.push(player("b", "Bo", false));

        // Original host leaves; the stored flag on "b" stays false.
        room.players.remove(0);
        assert!(!room.players[0].is_host, "stored flag is stale by design");
        assert!(room.is_host(&pid("b")), "position decides hostship");
        assert!(!room.is_host(&pid("a")));
    }

    #[test]
    fn test_opponent_of_and_capacity_helpers() {
        let code: RoomCode = "AB12CD".parse().unwrap();
        let mut room = Room::new(code, GameType::Guessing, player("a", "Ana", true), 0);
        assert!(room.opponent_of(&pid("a")).is_none());
        assert!(!room.is_full());

        room.players.push(player("b", "Bo", false));
        assert_eq!(room.opponent_of(&pid("a")).unwrap().id, pid("b"));
        assert_eq!(room.opponent_of(&pid("b")).unwrap().id, pid("a"));
        assert!(room.is_full());
    }

    #[test]
    fn test_freshest_ping_takes_the_maximum() {
        let code: RoomCode = "AB12CD".parse().unwrap();
        let mut room = Room::new(code, GameType::Guessing, player("a", "Ana", true), 100);
        room.pings.insert(pid("b"), 250);
        assert_eq!(room.freshest_ping(), Some(250));
    }
}
