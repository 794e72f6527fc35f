//! Messages exchanged over the real-time battle channel.
//!
//! Both enums use `#[serde(tag = "type", rename_all = "kebab-case")]`, so
//! a variant like `SelectCard { room_id, card_id }` goes on the wire as:
//!
//! ```json
//! { "type": "select-card", "room_id": "room_...", "card_id": 25 }
//! ```
//!
//! The event names match what browser clients already listen for
//! (`room-update`, `round-revealed`, ...).

use serde::{Deserialize, Serialize};

use crate::{
    Card, CardId, FinalScore, GameState, MatchId, Outcome, PlayerSummary,
    RoomCode, RoomId, RoundRecord, UserId, UserStats,
};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Everything a client can ask of the server.
///
/// The acting user is never part of the payload: it is the identity the
/// connection authenticated as during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// First frame on every connection.
    Handshake { version: u32, token: String },

    /// Keep-alive. `client_time` is echoed back for RTT measurement.
    Heartbeat { client_time: u64 },

    /// Open a new room with the sender in the first seat.
    CreateRoom,

    /// Take a seat in the room a friend shared the code of.
    JoinByCode { room_code: RoomCode },

    /// Bind this connection to a seat the sender already holds.
    JoinRoom { room_id: RoomId },

    /// Give up the seat. Only allowed before the battle starts.
    LeaveRoom { room_id: RoomId },

    /// Submit (or, before the battle starts, replace) a 6-card team.
    SubmitTeam { room_id: RoomId, cards: Vec<CardId> },

    /// Pick the card to play in the current round.
    SelectCard { room_id: RoomId, card_id: CardId },

    /// Room snapshot by id.
    GetRoom { room_id: RoomId },

    /// Room snapshot by shareable code.
    GetRoomByCode { room_code: RoomCode },

    /// The opponent's team, once both teams are in.
    GetOpponentTeam { room_id: RoomId },

    /// Retry persisting a finished match (finalizer only).
    FinalizeMatch { room_id: RoomId },

    /// "I'm leaving." Closes the connection.
    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Full room view returned by `get-room` / `get-room-by-code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    pub player_count: usize,
    pub game_state: GameState,
    pub players: Vec<PlayerSummary>,
    pub player1_ready: bool,
    pub player2_ready: bool,
    pub current_round: u8,
}

/// Error category, mirrored from the engine's error taxonomy so clients
/// can decide whether to retry without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    Validation,
    UpstreamFailure,
    Exhausted,
    Protocol,
}

/// Everything the server can send to a client: direct replies to a
/// request plus room broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    // -- Connection lifecycle --
    HandshakeAck {
        user_id: UserId,
        username: String,
        server_time: u64,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    // -- Replies --
    RoomCreated {
        room_id: RoomId,
        room_code: RoomCode,
    },
    RoomJoined {
        room_id: RoomId,
        room_code: RoomCode,
        player_count: usize,
        game_state: GameState,
    },
    TeamAccepted {
        room_id: RoomId,
        accepted: bool,
        both_teams_ready: bool,
    },
    RoomSnapshot(RoomSnapshot),
    /// `team` is `None` while the opponent has not submitted yet.
    OpponentTeam {
        room_id: RoomId,
        opponent: Option<PlayerSummary>,
        team: Option<Vec<Card>>,
    },

    // -- Room broadcasts --
    RoomUpdate {
        room_id: RoomId,
        player_count: usize,
        players: Vec<PlayerSummary>,
        game_state: GameState,
    },
    BattleReady {
        room_id: RoomId,
    },
    TeamsReady {
        room_id: RoomId,
    },
    /// The opponent has locked in a card. Which card stays hidden until
    /// the round is revealed.
    OpponentSelected {
        room_id: RoomId,
        user_id: UserId,
        round: u8,
    },
    RoundRevealed {
        room_id: RoomId,
        record: RoundRecord,
        current_round: u8,
    },
    /// Sent to a connection that re-attaches to a battle in progress.
    BattleResumed {
        room_id: RoomId,
        current_round: u8,
        history: Vec<RoundRecord>,
        your_selection: Option<CardId>,
        opponent_selected: bool,
    },
    GameOver {
        room_id: RoomId,
        final_round: u8,
        final_score: FinalScore,
        winner: Outcome,
    },
    PlayerOffline {
        room_id: RoomId,
        user_id: UserId,
    },
    PlayerLeft {
        room_id: RoomId,
        user_id: UserId,
    },

    // -- Finalization --
    /// To the non-finalizing player: the persisted record both sides share.
    MatchInitialized {
        room_id: RoomId,
        match_id: MatchId,
    },
    /// To the finalizer: its write went through.
    MatchSaved {
        room_id: RoomId,
        match_id: MatchId,
    },
    StatsUpdated {
        stats: UserStats,
    },

    // -- Errors --
    /// `code` follows HTTP conventions (400, 401, 403, 404, 409, 502, 503).
    Error {
        code: u16,
        kind: ErrorKind,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame. Every message on the wire is wrapped in one.
///
/// ```text
/// ┌──────────────────────────────┐
/// │ seq: 42                      │  ← per-connection ordering
/// │ timestamp: 15000             │  ← ms since server start
/// │ message: { "type": ... }     │  ← the actual event
/// └──────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    /// Auto-incrementing sequence number. Each side keeps its own counter.
    #[serde(default)]
    pub seq: u64,

    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,

    pub message: M,
}

impl<M> Envelope<M> {
    pub fn new(seq: u64, timestamp: u64, message: M) -> Self {
        Self {
            seq,
            timestamp,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    //! The browser client matches on these exact JSON shapes, so the tests
    //! pin the serde attributes rather than round-tripping every variant.

    use super::*;

    #[test]
    fn test_client_message_uses_kebab_case_tags() {
        let msg = ClientMessage::SelectCard {
            room_id: RoomId::new("room_1_abc"),
            card_id: CardId(25),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "select-card");
        assert_eq!(json["room_id"], "room_1_abc");
        assert_eq!(json["card_id"], 25);
    }

    #[test]
    fn test_client_message_unit_variant_has_only_tag() {
        let json = serde_json::to_string(&ClientMessage::CreateRoom).unwrap();
        assert_eq!(json, r#"{"type":"create-room"}"#);
    }

    #[test]
    fn test_join_by_code_parses_from_browser_frame() {
        let raw = r#"{"type":"join-by-code","room_code":"ABC123"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinByCode {
                room_code: RoomCode::new("abc123")
            }
        );
    }

    #[test]
    fn test_round_revealed_json_shape() {
        let msg = ServerMessage::RoundRevealed {
            room_id: RoomId::new("r"),
            record: RoundRecord::new(1, Card::new(6, "charizard", 84), Card::new(9, "blastoise", 83)),
            current_round: 1,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "round-revealed");
        assert_eq!(json["record"]["winner"], "player1");
        assert_eq!(json["record"]["player2"]["attack"], 83);
    }

    #[test]
    fn test_room_snapshot_newtype_variant_is_flattened_with_tag() {
        let snapshot = RoomSnapshot {
            room_id: RoomId::new("r"),
            room_code: RoomCode::new("ABCDEF"),
            player_count: 1,
            game_state: GameState::Waiting,
            players: vec![],
            player1_ready: false,
            player2_ready: false,
            current_round: 0,
        };
        let json = serde_json::to_value(ServerMessage::RoomSnapshot(snapshot)).unwrap();
        assert_eq!(json["type"], "room-snapshot");
        assert_eq!(json["game_state"], "waiting");
    }

    #[test]
    fn test_error_kind_json_format() {
        let msg = ServerMessage::Error {
            code: 409,
            kind: ErrorKind::Conflict,
            message: "room is full".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "conflict");
        assert_eq!(json["code"], 409);
    }

    #[test]
    fn test_envelope_seq_defaults_when_missing() {
        let raw = r#"{"message":{"type":"heartbeat","client_time":5}}"#;
        let env: Envelope<ClientMessage> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.seq, 0);
        assert_eq!(env.message, ClientMessage::Heartbeat { client_time: 5 });
    }

    #[test]
    fn test_unknown_client_message_type_is_rejected() {
        let raw = r#"{"type":"fly-to-moon","speed":9000}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
