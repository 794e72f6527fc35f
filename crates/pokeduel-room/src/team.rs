//! Team submission: validating and resolving a player's six cards.

use std::collections::HashSet;

use pokeduel_protocol::{Card, CardId};
use pokeduel_services::CardCatalog;

use crate::RoomError;

/// Number of cards in a team, and therefore rounds in a match.
pub const TEAM_SIZE: usize = 6;

/// A validated team: exactly [`TEAM_SIZE`] distinct cards, with the
/// catalog's attack values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team(Vec<Card>);

impl Team {
    /// Validates a list of already-resolved cards.
    ///
    /// # Errors
    /// - [`RoomError::InvalidTeamSize`] unless there are exactly six cards
    /// - [`RoomError::DuplicateCard`] if a card appears twice
    pub fn new(cards: Vec<Card>) -> Result<Self, RoomError> {
        check_size(cards.len())?;

        let mut seen = HashSet::with_capacity(cards.len());
        for card in &cards {
            if !seen.insert(card.id) {
                return Err(RoomError::DuplicateCard(card.id));
            }
        }

        Ok(Self(cards))
    }

    /// The cards in submission order.
    pub fn cards(&self) -> &[Card] {
        &self.0
    }

    /// Looks up a card of this team by id.
    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.0.iter().find(|card| card.id == id)
    }
}

/// Turns the card ids a client submitted into a [`Team`].
///
/// Attack values always come from the catalog, never from the client.
/// The size check runs before any lookup so a malformed request costs
/// nothing upstream.
pub async fn resolve_team<C: CardCatalog>(
    catalog: &C,
    ids: &[CardId],
) -> Result<Team, RoomError> {
    check_size(ids.len())?;

    let mut cards = Vec::with_capacity(ids.len());
    for &id in ids {
        let card = catalog
            .card(id)
            .await?
            .ok_or(RoomError::UnknownCard(id))?;
        cards.push(card);
    }

    Team::new(cards)
}

fn check_size(got: usize) -> Result<(), RoomError> {
    if got != TEAM_SIZE {
        return Err(RoomError::InvalidTeamSize {
            expected: TEAM_SIZE,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pokeduel_services::InMemoryBackend;

    use super::*;

    fn cards(ids: &[u32]) -> Vec<Card> {
        ids.iter().map(|&id| Card::new(id, format!("card-{id}"), id * 10)).collect()
    }

    #[test]
    fn test_team_requires_six_cards() {
        let err = Team::new(cards(&[1, 2, 3, 4, 5])).unwrap_err();
        assert!(matches!(err, RoomError::InvalidTeamSize { expected: 6, got: 5 }));
    }

    #[test]
    fn test_team_rejects_duplicates() {
        let err = Team::new(cards(&[1, 2, 3, 4, 5, 1])).unwrap_err();
        assert!(matches!(err, RoomError::DuplicateCard(CardId(1))));
    }

    #[test]
    fn test_team_get() {
        let team = Team::new(cards(&[1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(team.get(CardId(4)).map(|c| c.attack), Some(40));
        assert!(team.get(CardId(9)).is_none());
    }

    #[tokio::test]
    async fn test_resolve_team_uses_catalog_attack() {
        let backend = InMemoryBackend::with_cards(cards(&[1, 2, 3, 4, 5, 6]));
        let ids: Vec<CardId> = (1..=6).map(CardId).collect();

        let team = resolve_team(&backend, &ids).await.unwrap();
        assert_eq!(team.cards().len(), 6);
        assert_eq!(team.get(CardId(6)).map(|c| c.attack), Some(60));
    }

    #[tokio::test]
    async fn test_resolve_team_unknown_card() {
        let backend = InMemoryBackend::with_cards(cards(&[1, 2, 3, 4, 5]));
        let ids: Vec<CardId> = (1..=6).map(CardId).collect();

        let err = resolve_team(&backend, &ids).await.unwrap_err();
        assert!(matches!(err, RoomError::UnknownCard(CardId(6))));
    }
}
