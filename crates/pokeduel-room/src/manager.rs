//! Battle room manager: the single owner of every room and of the
//! per-connection outboxes.
//!
//! All methods are synchronous. The server keeps the manager behind one
//! `tokio::sync::Mutex`, so each operation runs start to finish without
//! interleaving; anything slow (catalog lookups, match writes) happens
//! before or after, never while the lock is held.
//!
//! Broadcasts are pushed into unbounded channels, one per connection.
//! A connection whose receiver is gone is skipped silently: the drop
//! guard in the server will detach it shortly.

use std::collections::HashMap;
use std::time::Instant;

use pokeduel_protocol::{
    Card, CardId, ConnectionId, FinalScore, GameState, MatchId, PlayerSummary, RoomCode, RoomId,
    RoomSnapshot, ServerMessage, Side, UserId,
};
use pokeduel_services::{Identity, ServiceError};
use tokio::sync::mpsc;

use crate::{
    Attachment, PendingMatch, Room, RoomConfig, RoomError, RoomRegistry, Seat, Selection, Team,
    TeamSubmission,
};

/// Outbound channel of one connection.
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

/// Who in a room should receive a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every seated player with a live connection.
    All,
    /// A single player.
    User(UserId),
    /// Everyone but this player.
    AllExcept(UserId),
}

impl Recipient {
    fn includes(&self, user: &UserId) -> bool {
        match self {
            Self::All => true,
            Self::User(target) => target == user,
            Self::AllExcept(excluded) => excluded != user,
        }
    }
}

/// Reply data for a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRoom {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    pub side: Side,
    pub player_count: usize,
    pub game_state: GameState,
}

/// What a player may see of the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpponentView {
    pub opponent: Option<PlayerSummary>,
    /// `None` until both teams are in.
    pub team: Option<Vec<Card>>,
}

/// Owns every live room and routes room events to connections.
pub struct BattleRoomManager {
    registry: RoomRegistry,
    outboxes: HashMap<ConnectionId, ConnectionSender>,
    config: RoomConfig,
}

impl BattleRoomManager {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            registry: RoomRegistry::new(),
            outboxes: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.registry.get(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.registry.len()
    }

    // -- Connections --------------------------------------------------------

    /// Makes `connection` reachable for room broadcasts.
    pub fn register_connection(&mut self, connection: ConnectionId, sender: ConnectionSender) {
        self.outboxes.insert(connection, sender);
    }

    /// Forgets a closed connection and marks its seats offline.
    ///
    /// Seats are kept: the player can reattach with a new connection.
    /// Returns the rooms the connection was bound in.
    pub fn detach_connection(&mut self, connection: ConnectionId) -> Vec<RoomId> {
        self.outboxes.remove(&connection);

        let now = Instant::now();
        let mut affected = Vec::new();
        for room in self.registry.iter_mut() {
            let Some(user_id) = room.detach(connection, now) else {
                continue;
            };
            tracing::info!(room_id = %room.id, %user_id, %connection, "player went offline");

            let offline = ServerMessage::PlayerOffline {
                room_id: room.id.clone(),
                user_id: user_id.clone(),
            };
            deliver(&self.outboxes, room, &Recipient::AllExcept(user_id), offline);
            deliver(&self.outboxes, room, &Recipient::All, room_update(room));
            affected.push(room.id.clone());
        }
        affected
    }

    /// Sends `message` to one player of a room. Returns `false` if the
    /// room is gone; an offline player simply misses the message.
    pub fn send_to_user(&self, room_id: &RoomId, user: &UserId, message: ServerMessage) -> bool {
        match self.registry.get(room_id) {
            Some(room) => {
                deliver(&self.outboxes, room, &Recipient::User(user.clone()), message);
                true
            }
            None => false,
        }
    }

    // -- Seats ----------------------------------------------------------------

    /// Opens a new room with `creator` in the first seat.
    pub fn create_room(&mut self, creator: &Identity) -> Result<(RoomId, RoomCode), RoomError> {
        let room = self.registry.create_room(creator, &self.config)?;
        Ok((room.id.clone(), room.code.clone()))
    }

    /// Seats `identity` in the room behind `code`.
    ///
    /// Joining a room you already sit in is not an error; it returns the
    /// existing seat so a client can safely retry.
    pub fn join_by_code(&mut self, code: &RoomCode, identity: &Identity) -> Result<JoinedRoom, RoomError> {
        let room_id = self
            .registry
            .room_id_by_code(code.as_str())
            .cloned()
            .ok_or_else(|| RoomError::CodeNotFound(code.clone()))?;
        let outboxes = &self.outboxes;
        let room = self
            .registry
            .get_mut(&room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let (side, fresh) = room.seat_player(identity, Instant::now())?;
        if fresh {
            tracing::info!(%room_id, user_id = %identity.user_id, ?side, "player joined");
            deliver(outboxes, room, &Recipient::All, room_update(room));
        }

        Ok(JoinedRoom {
            room_id,
            room_code: room.code.clone(),
            side,
            player_count: room.player_count(),
            game_state: room.game_state,
        })
    }

    /// Binds a connection to `user`'s seat and tells the room.
    ///
    /// A connection arriving mid-battle also gets a `BattleResumed` with
    /// the history and its own pending pick.
    pub fn attach_connection(
        &mut self,
        room_id: &RoomId,
        user: &UserId,
        connection: ConnectionId,
    ) -> Result<Attachment, RoomError> {
        let outboxes = &self.outboxes;
        let room = self
            .registry
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let attachment = room.attach(user, connection)?;
        tracing::debug!(%room_id, user_id = %user, %connection, "connection attached");

        deliver(outboxes, room, &Recipient::All, room_update(room));
        if attachment.became_ready {
            tracing::info!(%room_id, "both players online, room ready");
            let ready = ServerMessage::BattleReady {
                room_id: room_id.clone(),
            };
            deliver(outboxes, room, &Recipient::All, ready);
        }
        if attachment.resumed {
            let side = attachment.side;
            let resumed = ServerMessage::BattleResumed {
                room_id: room_id.clone(),
                current_round: room.battle.current_round(),
                history: room.battle.history().to_vec(),
                your_selection: room.battle.pending_pick(side).map(|card| card.id),
                opponent_selected: room.battle.pending_pick(side.other()).is_some(),
            };
            deliver(outboxes, room, &Recipient::User(user.clone()), resumed);
        }

        Ok(attachment)
    }

    /// Gives up `user`'s seat before the battle starts. A room left with
    /// nobody in it is removed.
    pub fn leave_room(&mut self, room_id: &RoomId, user: &UserId) -> Result<(), RoomError> {
        let outboxes = &self.outboxes;
        let room = self
            .registry
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        room.vacate(user)?;
        tracing::info!(%room_id, user_id = %user, "player left");

        let left = ServerMessage::PlayerLeft {
            room_id: room_id.clone(),
            user_id: user.clone(),
        };
        deliver(outboxes, room, &Recipient::All, left);
        deliver(outboxes, room, &Recipient::All, room_update(room));

        if room.is_empty() {
            self.registry.remove(room_id);
        }
        Ok(())
    }

    // -- Battle ---------------------------------------------------------------

    /// Stores a resolved team. The second team opens round one.
    pub fn submit_team(&mut self, room_id: &RoomId, user: &UserId, team: Team) -> Result<TeamSubmission, RoomError> {
        let outboxes = &self.outboxes;
        let room = self
            .registry
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let submission = room.submit_team(user, team)?;
        tracing::info!(%room_id, user_id = %user, side = ?submission.side, "team submitted");

        if submission.battle_started {
            tracing::info!(%room_id, "both teams in, battle started");
            let ready = ServerMessage::TeamsReady {
                room_id: room_id.clone(),
            };
            deliver(outboxes, room, &Recipient::All, ready);
        }
        Ok(submission)
    }

    /// Locks in `user`'s card for the open round.
    ///
    /// The opponent only learns *that* a pick happened. Both cards are
    /// broadcast together once the round is revealed.
    pub fn select_card(&mut self, room_id: &RoomId, user: &UserId, card_id: CardId) -> Result<Selection, RoomError> {
        let outboxes = &self.outboxes;
        let room = self
            .registry
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let side = room
            .side_of(user)
            .ok_or_else(|| RoomError::NotSeated(user.clone(), room_id.clone()))?;
        let team = room.teams[side.index()]
            .as_ref()
            .ok_or(RoomError::BattleNotStarted)?;
        let selection = room.battle.select(side, user, card_id, team)?;

        match &selection {
            Selection::Pending { round } => {
                tracing::debug!(%room_id, user_id = %user, round, "card selected");
                let picked = ServerMessage::OpponentSelected {
                    room_id: room_id.clone(),
                    user_id: user.clone(),
                    round: *round,
                };
                deliver(outboxes, room, &Recipient::AllExcept(user.clone()), picked);
            }
            Selection::Revealed { record, .. } => {
                tracing::info!(%room_id, round = record.round, winner = %record.winner, "round revealed");
                let revealed = ServerMessage::RoundRevealed {
                    room_id: room_id.clone(),
                    record: record.clone(),
                    current_round: room.battle.current_round(),
                };
                deliver(outboxes, room, &Recipient::All, revealed);
            }
        }
        Ok(selection)
    }

    /// Announces the result of a finished battle.
    ///
    /// Returns `true` if this call moved the room to `gameOver`; later
    /// calls are no-ops returning `false`.
    pub fn conclude_match(&mut self, room_id: &RoomId) -> Result<bool, RoomError> {
        let outboxes = &self.outboxes;
        let room = self
            .registry
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        if !room.battle.is_complete() {
            return Err(RoomError::MatchNotComplete(room_id.clone()));
        }
        if room.game_state == GameState::GameOver {
            return Ok(false);
        }

        room.game_state = GameState::GameOver;
        let final_score = FinalScore::tally(room.battle.history());
        tracing::info!(%room_id, ?final_score, "match over");

        let over = ServerMessage::GameOver {
            room_id: room_id.clone(),
            final_round: room.battle.current_round(),
            final_score,
            winner: final_score.outcome(),
        };
        deliver(outboxes, room, &Recipient::All, over);
        Ok(true)
    }

    /// Claims the match write. The caller performs the store call
    /// outside the manager lock and reports back through
    /// [`complete_finalization`](Self::complete_finalization).
    pub fn begin_finalization(&mut self, room_id: &RoomId, requester: &UserId) -> Result<PendingMatch, RoomError> {
        let pending = self.room_mut(room_id)?.begin_finalization(requester)?;
        tracing::debug!(%room_id, finalizer = %requester, "finalization started");
        Ok(pending)
    }

    /// Records the store's answer. On success the finalizer gets
    /// `MatchSaved` and the opponent gets `MatchInitialized`.
    pub fn complete_finalization(
        &mut self,
        room_id: &RoomId,
        result: Result<MatchId, ServiceError>,
    ) -> Result<MatchId, RoomError> {
        let outboxes = &self.outboxes;
        let room = self
            .registry
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let (finalizer, match_id) = match room.complete_finalization(result) {
            Ok(done) => done,
            Err(err) => {
                tracing::warn!(%room_id, error = %err, "match write failed");
                return Err(err);
            }
        };
        tracing::info!(%room_id, %match_id, "match persisted");

        let initialized = ServerMessage::MatchInitialized {
            room_id: room_id.clone(),
            match_id: match_id.clone(),
        };
        deliver(outboxes, room, &Recipient::AllExcept(finalizer.clone()), initialized);
        let saved = ServerMessage::MatchSaved {
            room_id: room_id.clone(),
            match_id: match_id.clone(),
        };
        deliver(outboxes, room, &Recipient::User(finalizer), saved);

        Ok(match_id)
    }

    // -- Queries --------------------------------------------------------------

    /// The player elected to persist this room's match.
    pub fn finalizer(&self, room_id: &RoomId) -> Option<UserId> {
        self.registry.get(room_id)?.finalizer().cloned()
    }

    pub fn snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        self.registry
            .get(room_id)
            .map(Room::snapshot)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }

    pub fn snapshot_by_code(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        self.registry
            .room_id_by_code(code.as_str())
            .and_then(|id| self.registry.get(id))
            .map(Room::snapshot)
            .ok_or_else(|| RoomError::CodeNotFound(code.clone()))
    }

    /// The opponent's identity and, once both teams are in, their team.
    pub fn opponent_team(&self, room_id: &RoomId, user: &UserId) -> Result<OpponentView, RoomError> {
        let room = self
            .registry
            .get(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        let side = room
            .side_of(user)
            .ok_or_else(|| RoomError::NotSeated(user.clone(), room_id.clone()))?;
        let other = side.other();

        let team = if room.both_teams_ready() {
            room.team(other).map(|team| team.cards().to_vec())
        } else {
            None
        };
        Ok(OpponentView {
            opponent: room.seat(other).map(Seat::summary),
            team,
        })
    }

    // -- Housekeeping ---------------------------------------------------------

    /// Removes rooms whose players have all been offline longer than the
    /// configured grace period. Returns the removed ids.
    pub fn expire_abandoned(&mut self, now: Instant) -> Vec<RoomId> {
        let grace = self.config.abandon_grace;
        let expired: Vec<RoomId> = self
            .registry
            .iter()
            .filter(|room| room.is_abandoned(now, grace))
            .map(|room| room.id.clone())
            .collect();

        for room_id in &expired {
            tracing::info!(%room_id, "removing abandoned room");
            self.registry.remove(room_id);
        }
        expired
    }

    fn room_mut(&mut self, room_id: &RoomId) -> Result<&mut Room, RoomError> {
        self.registry
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }
}

impl Default for BattleRoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

fn room_update(room: &Room) -> ServerMessage {
    ServerMessage::RoomUpdate {
        room_id: room.id.clone(),
        player_count: room.player_count(),
        players: room.players(),
        game_state: room.game_state,
    }
}

/// Pushes `message` into the outbox of every matching seat.
fn deliver(
    outboxes: &HashMap<ConnectionId, ConnectionSender>,
    room: &Room,
    recipient: &Recipient,
    message: ServerMessage,
) {
    for seat in room.seats.iter().flatten() {
        if !recipient.includes(&seat.user_id) {
            continue;
        }
        let Some(tx) = seat.connection.and_then(|conn| outboxes.get(&conn)) else {
            continue;
        };
        // A closed receiver means the connection is going away.
        let _ = tx.send(message.clone());
    }
}
