//! # Pokeduel
//!
//! Real-time server for two-player Pokémon card battles.
//!
//! Two friends meet in a room through a six-character code, each submits
//! a team of six cards, and the server runs six blind rounds: both pick a
//! card, the higher attack takes the round. When the match is over the
//! server announces the result and persists it exactly once.
//!
//! The layers, bottom up:
//!
//! - `pokeduel-protocol`: wire messages and value types
//! - `pokeduel-transport`: WebSocket connections
//! - `pokeduel-services`: identity, card catalog, match store
//! - `pokeduel-room`: the battle-room engine
//! - `pokeduel` (this crate): the server that wires them together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pokeduel::prelude::*;
//!
//! # async fn run() -> Result<(), PokeduelError> {
//! let backend = InMemoryBackend::with_cards([
//!     Card::new(25, "Pikachu", 55),
//!     Card::new(6, "Charizard", 84),
//! ])
//! .open_registration();
//!
//! let server = PokeduelServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(backend)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PokeduelError;
pub use server::{PROTOCOL_VERSION, PokeduelServer, PokeduelServerBuilder, ServerConfig};

/// Everything needed to run a server or write a client in one import.
pub mod prelude {
    pub use crate::{PROTOCOL_VERSION, PokeduelError, PokeduelServer, PokeduelServerBuilder, ServerConfig};
    pub use pokeduel_protocol::{
        Card, CardId, ClientMessage, Codec, Envelope, ErrorKind, FinalScore, GameState, JsonCodec,
        MatchId, Outcome, RoomCode, RoomId, RoomSnapshot, RoundRecord, ServerMessage, Side, UserId,
        UserStats,
    };
    pub use pokeduel_room::{RoomConfig, RoomError};
    pub use pokeduel_services::{
        Backend, CardCatalog, Identity, IdentityService, InMemoryBackend, MatchRecord, MatchStore,
        ServiceError,
    };
}
