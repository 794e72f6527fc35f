//! Card catalog lookup.

use std::future::Future;

use pokeduel_protocol::{Card, CardId};

use crate::ServiceError;

/// Source of truth for card definitions.
///
/// Team submission resolves every card through the catalog, so the attack
/// value used in battle is never the one a (possibly tampered) client
/// claims.
pub trait CardCatalog: Send + Sync + 'static {
    /// Looks up a card. `Ok(None)` means the catalog has no such card.
    fn card(
        &self,
        id: CardId,
    ) -> impl Future<Output = Result<Option<Card>, ServiceError>> + Send;
}
