//! Wire protocol for Pokeduel.
//!
//! This crate defines the "language" that battle clients and the server
//! speak:
//!
//! - **Types** ([`UserId`], [`Card`], [`RoundRecord`], [`Outcome`], etc.):
//!   the identifiers and battle values shared by every layer.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Envelope`]):
//!   the events that travel on the real-time channel.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! engine (battle state). It doesn't know about connections or rooms;
//! it only knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room engine (battle state)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{
    ClientMessage, Envelope, ErrorKind, RoomSnapshot, ServerMessage,
};
pub use types::{
    Card, CardId, ConnectionId, FinalScore, GameState, MatchId, Outcome,
    PlayerSummary, RoomCode, RoomId, RoundRecord, Side, UserId, UserStats,
};
