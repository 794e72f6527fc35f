//! Match finalization: persisting a finished battle exactly once.
//!
//! One player, the *finalizer*, owns the write. The room tracks the
//! write as a small state machine so a retry after a failed write is
//! allowed, while a second write after a successful one is not:
//!
//! ```text
//! NotStarted ──begin──▶ InFlight ──ok──▶ Persisted(match_id)
//!      ▲                   │
//!      └──── Failed ◀──err─┘   (Failed may begin again)
//! ```

use pokeduel_protocol::{FinalScore, GameState, MatchId, Side, UserId};
use pokeduel_services::{MatchRecord, MatchType, Participant, ServiceError};

use crate::{Room, RoomError};

/// Progress of the match write for one room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Finalization {
    #[default]
    NotStarted,
    InFlight { finalizer: UserId },
    Persisted { match_id: MatchId, finalizer: UserId },
    Failed { reason: String },
}

/// A write the caller must hand to the match store, outside any lock.
#[derive(Debug, Clone)]
pub struct PendingMatch {
    pub finalizer: UserId,
    pub record: MatchRecord,
}

impl Room {
    /// The player responsible for persisting the match.
    ///
    /// That is the room creator while they still hold a seat, otherwise
    /// whoever sits in `Player1`.
    pub fn finalizer(&self) -> Option<&UserId> {
        if self.side_of(&self.created_by).is_some() {
            return Some(&self.created_by);
        }
        self.seat(Side::Player1).map(|seat| &seat.user_id)
    }

    /// The id of the persisted match, once there is one.
    pub fn match_id(&self) -> Option<&MatchId> {
        match &self.finalization {
            Finalization::Persisted { match_id, .. } => Some(match_id),
            _ => None,
        }
    }

    /// Builds the record of a concluded match from the round history.
    pub fn match_record(&self) -> Result<MatchRecord, RoomError> {
        let incomplete = || RoomError::MatchNotComplete(self.id.clone());
        if self.game_state != GameState::GameOver || !self.battle.is_complete() {
            return Err(incomplete());
        }

        let participant = |side: Side| -> Result<Participant, RoomError> {
            let seat = self.seat(side).ok_or_else(incomplete)?;
            let team = self.team(side).ok_or_else(incomplete)?;
            Ok(Participant {
                user_id: seat.user_id.clone(),
                username: seat.username.clone(),
                team: team.cards().to_vec(),
            })
        };

        let rounds = self.battle.history().to_vec();
        let final_score = FinalScore::tally(&rounds);
        Ok(MatchRecord {
            room_id: self.id.clone(),
            match_type: MatchType::VsFriend,
            player1: participant(Side::Player1)?,
            player2: participant(Side::Player2)?,
            rounds,
            final_score,
            winner: final_score.outcome(),
        })
    }

    /// Claims the match write for `requester`.
    ///
    /// # Errors
    /// - [`RoomError::MatchNotComplete`] before the game is over
    /// - [`RoomError::NotFinalizer`] if `requester` is not the finalizer
    /// - [`RoomError::AlreadyFinalized`] if a write is in flight or done
    pub(crate) fn begin_finalization(&mut self, requester: &UserId) -> Result<PendingMatch, RoomError> {
        let record = self.match_record()?;

        if self.finalizer() != Some(requester) {
            return Err(RoomError::NotFinalizer(requester.clone()));
        }
        if matches!(
            self.finalization,
            Finalization::InFlight { .. } | Finalization::Persisted { .. }
        ) {
            return Err(RoomError::AlreadyFinalized(self.id.clone()));
        }

        self.finalization = Finalization::InFlight {
            finalizer: requester.clone(),
        };
        Ok(PendingMatch {
            finalizer: requester.clone(),
            record,
        })
    }

    /// Applies the store's answer to an in-flight write.
    pub(crate) fn complete_finalization(
        &mut self,
        result: Result<MatchId, ServiceError>,
    ) -> Result<(UserId, MatchId), RoomError> {
        let Finalization::InFlight { finalizer } = &self.finalization else {
            return Err(RoomError::AlreadyFinalized(self.id.clone()));
        };
        let finalizer = finalizer.clone();

        match result {
            Ok(match_id) => {
                self.finalization = Finalization::Persisted {
                    match_id: match_id.clone(),
                    finalizer: finalizer.clone(),
                };
                Ok((finalizer, match_id))
            }
            Err(err) => {
                self.finalization = Finalization::Failed {
                    reason: err.to_string(),
                };
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pokeduel_protocol::{Card, CardId, ConnectionId, Outcome, RoomCode, RoomId};
    use pokeduel_services::Identity;

    use super::*;
    use crate::Team;

    fn finished_room() -> Room {
        let mut room = Room::new(
            RoomId::new("room_1_abcdefg"),
            RoomCode::new("ABCDEF"),
            &Identity::new("alice", "Alice"),
            Instant::now(),
        );
        room.seat_player(&Identity::new("bob", "Bob"), Instant::now()).unwrap();
        room.attach(&UserId::new("alice"), ConnectionId::new(1)).unwrap();
        room.attach(&UserId::new("bob"), ConnectionId::new(2)).unwrap();

        let t1 = Team::new((1..=6).map(|id| Card::new(id, "a", 60)).collect()).unwrap();
        let t2 = Team::new((101..=106).map(|id| Card::new(id, "b", 50)).collect()).unwrap();
        room.submit_team(&UserId::new("alice"), t1.clone()).unwrap();
        room.submit_team(&UserId::new("bob"), t2.clone()).unwrap();

        for i in 0..6 {
            room.battle
                .select(Side::Player1, &UserId::new("alice"), CardId(1 + i), &t1)
                .unwrap();
            room.battle
                .select(Side::Player2, &UserId::new("bob"), CardId(101 + i), &t2)
                .unwrap();
        }
        room.game_state = GameState::GameOver;
        room
    }

    #[test]
    fn test_match_record_from_history() {
        let room = finished_room();
        let record = room.match_record().unwrap();
        assert_eq!(record.rounds.len(), 6);
        assert_eq!(record.final_score, FinalScore { player1: 6, player2: 0 });
        assert_eq!(record.winner, Outcome::Player1);
        assert_eq!(record.player2.user_id, UserId::new("bob"));
        assert_eq!(record.player1.team.len(), 6);
    }

    #[test]
    fn test_only_finalizer_may_begin() {
        let mut room = finished_room();
        let err = room.begin_finalization(&UserId::new("bob")).unwrap_err();
        assert!(matches!(err, RoomError::NotFinalizer(_)));
    }

    #[test]
    fn test_finalization_exactly_once() {
        let mut room = finished_room();
        let alice = UserId::new("alice");

        room.begin_finalization(&alice).unwrap();
        assert!(matches!(
            room.begin_finalization(&alice),
            Err(RoomError::AlreadyFinalized(_))
        ));

        let (finalizer, id) = room
            .complete_finalization(Ok(MatchId("match-1".into())))
            .unwrap();
        assert_eq!(finalizer, alice);
        assert_eq!(id, MatchId("match-1".into()));
        assert_eq!(room.match_id(), Some(&MatchId("match-1".into())));

        assert!(matches!(
            room.begin_finalization(&alice),
            Err(RoomError::AlreadyFinalized(_))
        ));
    }

    #[test]
    fn test_failed_write_can_be_retried() {
        let mut room = finished_room();
        let alice = UserId::new("alice");

        room.begin_finalization(&alice).unwrap();
        let err = room
            .complete_finalization(Err(ServiceError::Unavailable("store down".into())))
            .unwrap_err();
        assert!(matches!(err, RoomError::Upstream(_)));
        assert!(matches!(room.finalization(), Finalization::Failed { .. }));

        assert!(room.begin_finalization(&alice).is_ok());
    }

    #[test]
    fn test_not_complete_before_game_over() {
        let mut room = finished_room();
        room.game_state = GameState::Ready;
        assert!(matches!(
            room.begin_finalization(&UserId::new("alice")),
            Err(RoomError::MatchNotComplete(_))
        ));
    }
}
