//! Error types for the room engine.

use pokeduel_protocol::{CardId, ErrorKind, RoomCode, RoomId, UserId};
use pokeduel_services::ServiceError;

/// Errors that can occur during room operations.
///
/// Every variant is recoverable at the request boundary: the caller gets
/// an error, the room and the other player's session are untouched.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this id.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// No live room uses this code.
    #[error("room not found, check the code {0}")]
    CodeNotFound(RoomCode),

    /// Both seats are taken by other users.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The user acts on a room they have no seat in.
    #[error("user {0} is not seated in room {1}")]
    NotSeated(UserId, RoomId),

    /// A team must hold exactly six cards.
    #[error("a team needs exactly {expected} cards, got {got}")]
    InvalidTeamSize { expected: usize, got: usize },

    /// The same card appears twice in one team.
    #[error("card {0} appears more than once in the team")]
    DuplicateCard(CardId),

    /// The catalog has no such card.
    #[error("unknown card {0}")]
    UnknownCard(CardId),

    /// Teams cannot change once the battle has started.
    #[error("teams are locked once the battle has started")]
    TeamLocked,

    /// Card selection before both teams are in.
    #[error("battle has not started yet")]
    BattleNotStarted,

    /// Card selection after round six.
    #[error("all rounds have been played")]
    MatchAlreadyComplete,

    /// A second pick for the same round.
    #[error("user {user} already selected a card for round {round}")]
    DuplicateSelection { user: UserId, round: u8 },

    /// The picked card is not part of the player's team.
    #[error("card {0} is not in your team")]
    CardNotInTeam(CardId),

    /// Each team card battles exactly once.
    #[error("card {0} was already played")]
    CardAlreadyUsed(CardId),

    /// Seats can only be given up before the battle starts.
    #[error("cannot leave room {0} while the battle is in progress")]
    BattleInProgress(RoomId),

    /// Finalization before the match has been concluded.
    #[error("match in room {0} is not complete")]
    MatchNotComplete(RoomId),

    /// Only the elected finalizer may persist the match.
    #[error("user {0} is not the finalizer of this match")]
    NotFinalizer(UserId),

    /// The match is already persisted, or a write is in flight.
    #[error("match in room {0} is already being finalized")]
    AlreadyFinalized(RoomId),

    /// An external collaborator failed.
    #[error(transparent)]
    Upstream(#[from] ServiceError),

    /// Every generated room code collided with a live one.
    #[error("could not allocate a unique room code after {0} attempts")]
    CodeSpaceExhausted(u32),
}

impl RoomError {
    /// Category of this error, as reported to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomNotFound(_) | Self::CodeNotFound(_) => ErrorKind::NotFound,
            Self::RoomFull(_)
            | Self::TeamLocked
            | Self::BattleNotStarted
            | Self::MatchAlreadyComplete
            | Self::DuplicateSelection { .. }
            | Self::CardAlreadyUsed(_)
            | Self::BattleInProgress(_)
            | Self::MatchNotComplete(_)
            | Self::AlreadyFinalized(_) => ErrorKind::Conflict,
            Self::NotSeated(..) | Self::NotFinalizer(_) => ErrorKind::Unauthorized,
            Self::InvalidTeamSize { .. }
            | Self::DuplicateCard(_)
            | Self::UnknownCard(_)
            | Self::CardNotInTeam(_) => ErrorKind::Validation,
            Self::Upstream(_) => ErrorKind::UpstreamFailure,
            Self::CodeSpaceExhausted(_) => ErrorKind::Exhausted,
        }
    }

    /// HTTP-style status code for this error.
    pub fn code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unauthorized => 403,
            ErrorKind::Validation | ErrorKind::Protocol => 400,
            ErrorKind::UpstreamFailure => 502,
            ErrorKind::Exhausted => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_code_follow_taxonomy() {
        let full = RoomError::RoomFull(RoomId::new("r"));
        assert_eq!((full.kind(), full.code()), (ErrorKind::Conflict, 409));

        let missing = RoomError::CodeNotFound(RoomCode::new("zzzzzz"));
        assert_eq!(missing.code(), 404);
        assert!(missing.to_string().contains("ZZZZZZ"));

        let outsider = RoomError::NotSeated(UserId::new("eve"), RoomId::new("r"));
        assert_eq!(outsider.kind(), ErrorKind::Unauthorized);

        let size = RoomError::InvalidTeamSize { expected: 6, got: 5 };
        assert_eq!(size.code(), 400);

        let upstream: RoomError = ServiceError::Unavailable("down".into()).into();
        assert_eq!(upstream.code(), 502);

        assert_eq!(RoomError::CodeSpaceExhausted(32).kind(), ErrorKind::Exhausted);
    }
}
