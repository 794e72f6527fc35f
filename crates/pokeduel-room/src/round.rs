//! The round engine: six blind rounds of simultaneous card picks.
//!
//! Each round both players lock in one card from their team without
//! seeing the other's choice. When the second pick arrives the round is
//! revealed in one step: winner decided, record appended, picks cleared.
//! There is no in-between state where a record exists but the picks are
//! still pending, so a round can never be recorded twice.

use pokeduel_protocol::{Card, CardId, RoundRecord, Side, UserId};

use crate::{RoomError, TEAM_SIZE, Team};

/// Rounds in a match: every team card battles exactly once.
pub const MATCH_ROUNDS: u8 = TEAM_SIZE as u8;

/// Where the battle currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoundPhase {
    /// Waiting for both teams.
    #[default]
    Drafting,

    /// Round `round` (1-based) is open. `picks` is indexed by
    /// [`Side::index`] and is only ever visible server-side.
    AwaitingSelections { round: u8, picks: [Option<Card>; 2] },

    /// All six rounds have been revealed.
    MatchComplete,
}

/// Result of a single card pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The pick was recorded; the opponent has not picked yet.
    Pending { round: u8 },

    /// This pick completed the round.
    Revealed {
        record: RoundRecord,
        /// `true` if this was the last round.
        match_complete: bool,
    },
}

/// Battle progress of one room.
#[derive(Debug, Clone, Default)]
pub struct Battle {
    phase: RoundPhase,
    history: Vec<RoundRecord>,
}

impl Battle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &RoundPhase {
        &self.phase
    }

    /// Revealed rounds, oldest first.
    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    /// Number of revealed rounds. Always equals `history().len()`.
    pub fn current_round(&self) -> u8 {
        self.history.len() as u8
    }

    /// `true` once both teams were submitted.
    pub fn has_started(&self) -> bool {
        !matches!(self.phase, RoundPhase::Drafting)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, RoundPhase::MatchComplete)
    }

    /// The card `side` locked in for the open round, if any.
    pub fn pending_pick(&self, side: Side) -> Option<&Card> {
        match &self.phase {
            RoundPhase::AwaitingSelections { picks, .. } => picks[side.index()].as_ref(),
            _ => None,
        }
    }

    /// Whether `card` was already played by `side` in an earlier round.
    pub fn was_played(&self, side: Side, card: CardId) -> bool {
        self.history.iter().any(|record| record.card(side).id == card)
    }

    /// Opens round one. Has no effect once the battle is running.
    pub(crate) fn start(&mut self) {
        if matches!(self.phase, RoundPhase::Drafting) {
            self.phase = RoundPhase::AwaitingSelections {
                round: 1,
                picks: Default::default(),
            };
        }
    }

    /// Records `user`'s pick for the open round, revealing the round if
    /// the opponent already picked.
    ///
    /// # Errors
    /// - [`RoomError::BattleNotStarted`] before both teams are in
    /// - [`RoomError::MatchAlreadyComplete`] after round six
    /// - [`RoomError::DuplicateSelection`] on a second pick in one round
    /// - [`RoomError::CardNotInTeam`] if the card is not in `team`
    /// - [`RoomError::CardAlreadyUsed`] if the card was played before
    pub(crate) fn select(
        &mut self,
        side: Side,
        user: &UserId,
        card_id: CardId,
        team: &Team,
    ) -> Result<Selection, RoomError> {
        let (round, picks) = match &mut self.phase {
            RoundPhase::Drafting => return Err(RoomError::BattleNotStarted),
            RoundPhase::MatchComplete => return Err(RoomError::MatchAlreadyComplete),
            RoundPhase::AwaitingSelections { round, picks } => (*round, picks),
        };

        if picks[side.index()].is_some() {
            return Err(RoomError::DuplicateSelection {
                user: user.clone(),
                round,
            });
        }
        let card = team.get(card_id).ok_or(RoomError::CardNotInTeam(card_id))?;
        if self.history.iter().any(|record| record.card(side).id == card_id) {
            return Err(RoomError::CardAlreadyUsed(card_id));
        }

        picks[side.index()] = Some(card.clone());

        let [Some(player1), Some(player2)] = picks.clone() else {
            return Ok(Selection::Pending { round });
        };

        let record = RoundRecord::new(round, player1, player2);
        self.history.push(record.clone());

        let match_complete = self.current_round() >= MATCH_ROUNDS;
        self.phase = if match_complete {
            RoundPhase::MatchComplete
        } else {
            RoundPhase::AwaitingSelections {
                round: round + 1,
                picks: Default::default(),
            }
        };

        Ok(Selection::Revealed {
            record,
            match_complete,
        })
    }
}
