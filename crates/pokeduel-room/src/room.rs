//! A single battle room: two seats, two teams, one battle.
//!
//! `Room` is plain data plus synchronous transitions. It never touches a
//! socket; the [`BattleRoomManager`](crate::BattleRoomManager) decides
//! who hears about each change.

use std::time::{Duration, Instant};

use pokeduel_protocol::{
    ConnectionId, GameState, PlayerSummary, RoomCode, RoomId, RoomSnapshot, Side, UserId,
};
use pokeduel_services::Identity;

use crate::{Battle, Finalization, RoomError, Team};

/// A player's place in a room.
///
/// The seat outlives the connection: a dropped socket only clears
/// `connection`, so the same user can come back and pick up where they
/// left off.
#[derive(Debug, Clone)]
pub struct Seat {
    pub user_id: UserId,
    pub username: String,
    /// The live connection bound to this seat, if any.
    pub connection: Option<ConnectionId>,
    /// When the seat last lost (or never had) a connection.
    offline_since: Option<Instant>,
}

impl Seat {
    fn new(identity: &Identity, now: Instant) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            connection: None,
            offline_since: Some(now),
        }
    }

    pub fn is_online(&self) -> bool {
        self.connection.is_some()
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            online: self.is_online(),
        }
    }
}

/// What happened when a connection was bound to a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub side: Side,
    /// This attach moved the room from `waiting` to `ready`.
    pub became_ready: bool,
    /// The battle is already running, so the client needs a resume.
    pub resumed: bool,
}

/// Result of a successful team submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamSubmission {
    pub side: Side,
    pub both_teams_ready: bool,
    /// This submission was the second one and opened round one.
    pub battle_started: bool,
}

/// A two-player battle room.
#[derive(Debug)]
pub struct Room {
    pub(crate) id: RoomId,
    pub(crate) code: RoomCode,
    pub(crate) created_by: UserId,
    pub(crate) seats: [Option<Seat>; 2],
    pub(crate) game_state: GameState,
    pub(crate) teams: [Option<Team>; 2],
    pub(crate) battle: Battle,
    pub(crate) finalization: Finalization,
}

impl Room {
    /// Creates a room with the creator in the `Player1` seat.
    pub(crate) fn new(id: RoomId, code: RoomCode, creator: &Identity, now: Instant) -> Self {
        Self {
            id,
            code,
            created_by: creator.user_id.clone(),
            seats: [Some(Seat::new(creator, now)), None],
            game_state: GameState::Waiting,
            teams: [None, None],
            battle: Battle::new(),
            finalization: Finalization::NotStarted,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    pub fn finalization(&self) -> &Finalization {
        &self.finalization
    }

    pub fn seat(&self, side: Side) -> Option<&Seat> {
        self.seats[side.index()].as_ref()
    }

    pub fn team(&self, side: Side) -> Option<&Team> {
        self.teams[side.index()].as_ref()
    }

    /// Which side `user` sits on, if any.
    pub fn side_of(&self, user: &UserId) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|&side| self.seat(side).is_some_and(|seat| &seat.user_id == user))
    }

    /// Which side the connection is bound to, if any.
    pub fn side_of_connection(&self, connection: ConnectionId) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|&side| self.seat(side).is_some_and(|seat| seat.connection == Some(connection)))
    }

    pub fn player_count(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.player_count() == 0
    }

    pub fn players(&self) -> Vec<PlayerSummary> {
        self.seats.iter().flatten().map(Seat::summary).collect()
    }

    pub fn both_teams_ready(&self) -> bool {
        self.teams.iter().all(Option::is_some)
    }

    /// Live connections of every seated player.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.seats.iter().flatten().filter_map(|seat| seat.connection)
    }

    /// Side-effect-free view of the room.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            room_code: self.code.clone(),
            player_count: self.player_count(),
            game_state: self.game_state,
            players: self.players(),
            player1_ready: self.team(Side::Player1).is_some(),
            player2_ready: self.team(Side::Player2).is_some(),
            current_round: self.battle.current_round(),
        }
    }

    /// Gives `identity` a seat, or returns the one it already holds.
    ///
    /// A newcomer always lands behind whoever is already seated, since
    /// [`vacate`](Self::vacate) keeps the earlier entrant in `Player1`.
    ///
    /// # Errors
    /// [`RoomError::RoomFull`] if both seats belong to other users.
    pub(crate) fn seat_player(&mut self, identity: &Identity, now: Instant) -> Result<(Side, bool), RoomError> {
        if let Some(side) = self.side_of(&identity.user_id) {
            return Ok((side, false));
        }

        let side = Side::BOTH
            .into_iter()
            .find(|&side| self.seats[side.index()].is_none())
            .ok_or_else(|| RoomError::RoomFull(self.id.clone()))?;

        self.seats[side.index()] = Some(Seat::new(identity, now));
        Ok((side, true))
    }

    /// Binds `connection` to `user`'s seat, replacing any earlier one.
    ///
    /// The room becomes `ready` the first time both seats are occupied
    /// and online at once, unless the battle already got there first.
    ///
    /// # Errors
    /// [`RoomError::NotSeated`] if `user` has no seat here.
    pub(crate) fn attach(&mut self, user: &UserId, connection: ConnectionId) -> Result<Attachment, RoomError> {
        let side = self
            .side_of(user)
            .ok_or_else(|| RoomError::NotSeated(user.clone(), self.id.clone()))?;

        if let Some(seat) = self.seats[side.index()].as_mut() {
            seat.connection = Some(connection);
            seat.offline_since = None;
        }

        let all_online = self.seats.iter().all(|seat| seat.as_ref().is_some_and(Seat::is_online));
        let became_ready =
            self.game_state == GameState::Waiting && all_online && !self.battle.has_started();
        if became_ready {
            self.game_state = GameState::Ready;
        }

        Ok(Attachment {
            side,
            became_ready,
            resumed: self.battle.has_started(),
        })
    }

    /// Unbinds `connection` from whichever seat holds it. The seat stays.
    pub(crate) fn detach(&mut self, connection: ConnectionId, now: Instant) -> Option<UserId> {
        let side = self.side_of_connection(connection)?;
        let seat = self.seats[side.index()].as_mut()?;
        seat.connection = None;
        seat.offline_since = Some(now);
        Some(seat.user_id.clone())
    }

    /// Frees `user`'s seat. Only allowed before the battle starts.
    ///
    /// The user's team goes with them and the room falls back to
    /// `waiting` until a second player is online again. If `Player1`
    /// leaves, the remaining player moves up into that seat.
    pub(crate) fn vacate(&mut self, user: &UserId) -> Result<Side, RoomError> {
        let side = self
            .side_of(user)
            .ok_or_else(|| RoomError::NotSeated(user.clone(), self.id.clone()))?;
        if self.battle.has_started() || self.game_state == GameState::GameOver {
            return Err(RoomError::BattleInProgress(self.id.clone()));
        }

        self.seats[side.index()] = None;
        self.teams[side.index()] = None;
        if side == Side::Player1 {
            self.seats.swap(0, 1);
            self.teams.swap(0, 1);
        }
        self.game_state = GameState::Waiting;
        Ok(side)
    }

    /// Stores `user`'s team. Resubmission replaces the earlier team
    /// until the second team arrives; from then on teams are locked.
    pub(crate) fn submit_team(&mut self, user: &UserId, team: Team) -> Result<TeamSubmission, RoomError> {
        let side = self
            .side_of(user)
            .ok_or_else(|| RoomError::NotSeated(user.clone(), self.id.clone()))?;
        if self.battle.has_started() || self.game_state == GameState::GameOver {
            return Err(RoomError::TeamLocked);
        }

        self.teams[side.index()] = Some(team);

        let both_teams_ready = self.both_teams_ready();
        if both_teams_ready {
            self.battle.start();
            // Both seats are filled, whether or not both are online.
            self.game_state = GameState::Ready;
        }

        Ok(TeamSubmission {
            side,
            both_teams_ready,
            battle_started: both_teams_ready,
        })
    }

    /// `true` when nobody has been online for at least `grace`.
    pub fn is_abandoned(&self, now: Instant, grace: Duration) -> bool {
        self.seats.iter().flatten().all(|seat| match seat.offline_since {
            Some(since) => now.saturating_duration_since(since) >= grace,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use pokeduel_protocol::Card;

    use super::*;

    fn room() -> Room {
        Room::new(
            RoomId::new("room_1_abcdefg"),
            RoomCode::new("ABCDEF"),
            &Identity::new("alice", "Alice"),
            Instant::now(),
        )
    }

    fn team(base: u32) -> Team {
        Team::new((base..base + 6).map(|id| Card::new(id, "c", 10)).collect()).unwrap()
    }

    #[test]
    fn test_creator_takes_player1() {
        let room = room();
        assert_eq!(room.side_of(&UserId::new("alice")), Some(Side::Player1));
        assert_eq!(room.player_count(), 1);
        assert_eq!(room.game_state(), GameState::Waiting);
    }

    #[test]
    fn test_third_player_rejected() {
        let mut room = room();
        let now = Instant::now();
        room.seat_player(&Identity::new("bob", "Bob"), now).unwrap();

        let err = room.seat_player(&Identity::new("carol", "Carol"), now).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(_)));
        assert_eq!(room.player_count(), 2);
    }

    #[test]
    fn test_seat_player_is_idempotent() {
        let mut room = room();
        let now = Instant::now();
        let (side, fresh) = room.seat_player(&Identity::new("alice", "Alice"), now).unwrap();
        assert_eq!((side, fresh), (Side::Player1, false));
        assert_eq!(room.player_count(), 1);
    }

    #[test]
    fn test_ready_when_both_online() {
        let mut room = room();
        room.seat_player(&Identity::new("bob", "Bob"), Instant::now()).unwrap();

        let first = room.attach(&UserId::new("alice"), ConnectionId::new(1)).unwrap();
        assert!(!first.became_ready);
        let second = room.attach(&UserId::new("bob"), ConnectionId::new(2)).unwrap();
        assert!(second.became_ready);
        assert_eq!(room.game_state(), GameState::Ready);

        // Reattaching never fires the transition twice.
        let again = room.attach(&UserId::new("bob"), ConnectionId::new(3)).unwrap();
        assert!(!again.became_ready);
    }

    #[test]
    fn test_detach_keeps_seat() {
        let mut room = room();
        room.attach(&UserId::new("alice"), ConnectionId::new(1)).unwrap();

        let user = room.detach(ConnectionId::new(1), Instant::now());
        assert_eq!(user, Some(UserId::new("alice")));
        assert_eq!(room.player_count(), 1);
        assert!(!room.seat(Side::Player1).unwrap().is_online());
        assert_eq!(room.detach(ConnectionId::new(1), Instant::now()), None);
    }

    #[test]
    fn test_vacated_seat_is_reused() {
        let mut room = room();
        let now = Instant::now();
        room.vacate(&UserId::new("alice")).unwrap();
        assert!(room.is_empty());

        let (side, _) = room.seat_player(&Identity::new("bob", "Bob"), now).unwrap();
        assert_eq!(side, Side::Player1);
    }

    #[test]
    fn test_teams_lock_once_battle_starts() {
        let mut room = room();
        room.seat_player(&Identity::new("bob", "Bob"), Instant::now()).unwrap();

        let first = room.submit_team(&UserId::new("alice"), team(1)).unwrap();
        assert!(!first.both_teams_ready);
        // Last write wins while the opponent is still drafting.
        room.submit_team(&UserId::new("alice"), team(11)).unwrap();
        assert_eq!(room.team(Side::Player1), Some(&team(11)));

        let second = room.submit_team(&UserId::new("bob"), team(101)).unwrap();
        assert!(second.battle_started);
        assert!(room.battle().has_started());

        let err = room.submit_team(&UserId::new("alice"), team(21)).unwrap_err();
        assert!(matches!(err, RoomError::TeamLocked));
        let err = room.vacate(&UserId::new("bob")).unwrap_err();
        assert!(matches!(err, RoomError::BattleInProgress(_)));
    }

    #[test]
    fn test_abandoned_after_grace() {
        let mut room = room();
        let start = Instant::now();
        room.attach(&UserId::new("alice"), ConnectionId::new(1)).unwrap();
        assert!(!room.is_abandoned(start + Duration::from_secs(600), Duration::from_secs(60)));

        room.detach(ConnectionId::new(1), start);
        assert!(!room.is_abandoned(start + Duration::from_secs(30), Duration::from_secs(60)));
        assert!(room.is_abandoned(start + Duration::from_secs(60), Duration::from_secs(60)));
    }

    #[test]
    fn test_remaining_player_moves_up_when_player1_leaves() {
        let mut room = room();
        let now = Instant::now();
        room.seat_player(&Identity::new("bob", "Bob"), now).unwrap();
        room.submit_team(&UserId::new("bob"), team(7)).unwrap();

        room.vacate(&UserId::new("alice")).unwrap();
        assert_eq!(room.side_of(&UserId::new("bob")), Some(Side::Player1));
        assert_eq!(room.team(Side::Player1), Some(&team(7)));
        assert!(room.seat(Side::Player2).is_none());

        let (side, _) = room.seat_player(&Identity::new("carol", "Carol"), now).unwrap();
        assert_eq!(side, Side::Player2);
        let names: Vec<_> = room.players().into_iter().map(|p| p.username).collect();
        assert_eq!(names, ["Bob", "Carol"]);
    }

    #[test]
    fn test_late_attach_during_battle_is_not_ready_transition() {
        let mut room = room();
        room.seat_player(&Identity::new("bob", "Bob"), Instant::now()).unwrap();
        room.attach(&UserId::new("alice"), ConnectionId::new(1)).unwrap();

        // Bob drafts without ever binding a connection.
        room.submit_team(&UserId::new("alice"), team(1)).unwrap();
        room.submit_team(&UserId::new("bob"), team(7)).unwrap();
        assert_eq!(room.game_state(), GameState::Ready);

        let attached = room.attach(&UserId::new("bob"), ConnectionId::new(2)).unwrap();
        assert!(!attached.became_ready);
        assert!(attached.resumed);
    }
}
