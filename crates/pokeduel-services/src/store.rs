//! Persistence of finished matches.

use std::future::Future;

use pokeduel_protocol::{Card, FinalScore, MatchId, Outcome, RoomId, RoundRecord, UserId};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// How a match was played. Stored as `vs-friend` for room battles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    VsFriend,
}

/// One side of a persisted match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub username: String,
    pub team: Vec<Card>,
}

/// The document written once per completed match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub room_id: RoomId,
    pub match_type: MatchType,
    pub player1: Participant,
    pub player2: Participant,
    /// All six rounds, in order.
    pub rounds: Vec<RoundRecord>,
    pub final_score: FinalScore,
    pub winner: Outcome,
}

/// Writes finished matches and applies the resulting stat changes.
pub trait MatchStore: Send + Sync + 'static {
    /// Persists a match and recalculates both users' statistics and
    /// milestones. Returns the id of the stored record.
    ///
    /// # Errors
    /// [`ServiceError::Unavailable`] if the store cannot take the write.
    fn record_match(
        &self,
        record: MatchRecord,
    ) -> impl Future<Output = Result<MatchId, ServiceError>> + Send;
}
