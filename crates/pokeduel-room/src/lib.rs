//! Battle-room engine for Pokeduel.
//!
//! Two friends share a room code, each submits a team of six cards, and
//! the room runs six blind rounds: both pick a card, the higher attack
//! wins the round. When the last round is revealed the match is
//! announced and persisted exactly once.
//!
//! This crate is transport-free. It owns the room state and decides who
//! hears about each change; the server crate feeds it requests and
//! drains the per-connection outboxes.
//!
//! # Key types
//!
//! - [`BattleRoomManager`]: every live room plus the connection outboxes
//! - [`Room`]: seats, teams, battle, finalization of one room
//! - [`Battle`]: the six-round engine
//! - [`RoomRegistry`]: id and code allocation
//! - [`RoomConfig`]: timings and code settings

mod config;
mod error;
mod finalize;
mod manager;
mod registry;
mod room;
mod round;
mod team;

pub use config::RoomConfig;
pub use error::RoomError;
pub use finalize::{Finalization, PendingMatch};
pub use manager::{BattleRoomManager, ConnectionSender, JoinedRoom, OpponentView, Recipient};
pub use registry::RoomRegistry;
pub use room::{Attachment, Room, Seat, TeamSubmission};
pub use round::{Battle, MATCH_ROUNDS, RoundPhase, Selection};
pub use team::{TEAM_SIZE, Team, resolve_team};
