//! External collaborators of the battle-room engine.
//!
//! The engine does not own users, cards, or match history. It consumes
//! them through three traits:
//!
//! 1. [`IdentityService`]: who is this token, and what are their stats?
//! 2. [`CardCatalog`]: what is card #25 and how hard does it hit?
//! 3. [`MatchStore`]: persist a finished match and update stats.
//!
//! [`InMemoryBackend`] implements all three for development and tests.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)      ← authenticates connections, resolves teams, persists matches
//!     ↕
//! Services (this crate)  ← trait seams to the document store
//!     ↕
//! Protocol (below)    ← provides UserId, Card, RoundRecord, UserStats
//! ```

mod catalog;
mod error;
mod identity;
mod memory;
mod store;

pub use catalog::CardCatalog;
pub use error::ServiceError;
pub use identity::{Identity, IdentityService};
pub use memory::InMemoryBackend;
pub use store::{MatchRecord, MatchStore, MatchType, Participant};

/// Everything the server needs from the outside world, as one bound.
///
/// Blanket-implemented, so any type providing the three collaborators
/// is a `Backend` automatically.
pub trait Backend: IdentityService + CardCatalog + MatchStore {}

impl<T: IdentityService + CardCatalog + MatchStore> Backend for T {}
