//! Core value types shared by every Pokeduel layer.
//!
//! Identifiers, cards, and the small battle vocabulary (sides, outcomes,
//! round records, scores). Everything here travels on the wire, so the
//! serde attributes are part of the client contract.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a user, as issued by the identity service.
///
/// This is a "newtype wrapper": the inner `String` is opaque to us (the
/// identity service mints document ids), but wrapping it means a `RoomId`
/// can never be passed where a `UserId` is expected.
///
/// `#[serde(transparent)]` serializes it as the bare string, not
/// `{ "0": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a user id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a battle room.
///
/// Generated by the registry at creation (`room_<millis>_<suffix>`) and
/// immutable afterwards. Also used as the channel name for broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a room id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short human-shareable room code (a friend types it in).
///
/// Codes are case-insensitive; [`RoomCode::new`] trims and uppercases its
/// input so `" abc12x"` and `"ABC12X"` name the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Creates a normalized (trimmed, uppercase) room code.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a persisted match record, issued by the match store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog identifier of a card (the Pokédex number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque identifier for a live transport connection.
///
/// Seats hold this as a back-reference only: losing the connection never
/// destroys the seat it was bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// A stat-card as defined by the catalog.
///
/// `attack` is always the catalog's value; clients only ever send a
/// [`CardId`] and the server looks the rest up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub attack: u32,
}

impl Card {
    pub fn new(id: u32, name: impl Into<String>, attack: u32) -> Self {
        Self {
            id: CardId(id),
            name: name.into(),
            attack,
        }
    }
}

// ---------------------------------------------------------------------------
// Sides, outcomes, rounds
// ---------------------------------------------------------------------------

/// One of the two seats in a room. The first entrant is `Player1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    /// Both sides, in seat order.
    pub const BOTH: [Side; 2] = [Side::Player1, Side::Player2];

    /// Index into two-element seat arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Player1 => 0,
            Self::Player2 => 1,
        }
    }

    /// The opposing side.
    pub fn other(self) -> Self {
        match self {
            Self::Player1 => Self::Player2,
            Self::Player2 => Self::Player1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => f.write_str("player1"),
            Self::Player2 => f.write_str("player2"),
        }
    }
}

/// Result of a round or of a whole match.
///
/// Serialized as `"player1"`, `"player2"` or `"draw"`, the tags the match
/// store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Player1,
    Player2,
    Draw,
}

impl Outcome {
    /// Compares two attack values. Strictly higher wins; equal is a draw.
    pub fn decide(player1_attack: u32, player2_attack: u32) -> Self {
        match player1_attack.cmp(&player2_attack) {
            std::cmp::Ordering::Greater => Self::Player1,
            std::cmp::Ordering::Less => Self::Player2,
            std::cmp::Ordering::Equal => Self::Draw,
        }
    }

    /// The winning side, or `None` for a draw.
    pub fn winner(self) -> Option<Side> {
        match self {
            Self::Player1 => Some(Side::Player1),
            Self::Player2 => Some(Side::Player2),
            Self::Draw => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => f.write_str("player1"),
            Self::Player2 => f.write_str("player2"),
            Self::Draw => f.write_str("draw"),
        }
    }
}

/// A completed, revealed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number.
    pub round: u8,
    pub player1: Card,
    pub player2: Card,
    pub winner: Outcome,
}

impl RoundRecord {
    /// Builds a record, deciding the winner from the two attack values.
    pub fn new(round: u8, player1: Card, player2: Card) -> Self {
        let winner = Outcome::decide(player1.attack, player2.attack);
        Self {
            round,
            player1,
            player2,
            winner,
        }
    }

    /// The card the given side played this round.
    pub fn card(&self, side: Side) -> &Card {
        match side {
            Side::Player1 => &self.player1,
            Side::Player2 => &self.player2,
        }
    }
}

/// Rounds won by each side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub player1: u8,
    pub player2: u8,
}

impl FinalScore {
    /// Counts round wins from a battle history. Draws score for nobody.
    pub fn tally(history: &[RoundRecord]) -> Self {
        history.iter().fold(Self::default(), |mut score, record| {
            match record.winner {
                Outcome::Player1 => score.player1 += 1,
                Outcome::Player2 => score.player2 += 1,
                Outcome::Draw => {}
            }
            score
        })
    }

    /// Overall winner: more rounds won; equal counts are a draw.
    pub fn outcome(self) -> Outcome {
        Outcome::decide(u32::from(self.player1), u32::from(self.player2))
    }
}

// ---------------------------------------------------------------------------
// Room-level display state
// ---------------------------------------------------------------------------

/// Advisory room state shown to clients.
///
/// ```text
/// Waiting ──(second player connects)──→ Ready ──(round 6 revealed)──→ GameOver
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameState {
    #[default]
    Waiting,
    Ready,
    GameOver,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("waiting"),
            Self::Ready => f.write_str("ready"),
            Self::GameOver => f.write_str("gameOver"),
        }
    }
}

/// Public view of a seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub user_id: UserId,
    pub username: String,
    /// `false` while the player has no live connection.
    pub online: bool,
}

/// Cumulative per-user statistics kept by the identity service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub milestone_points: u32,
}
