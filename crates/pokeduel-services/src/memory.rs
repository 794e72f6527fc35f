//! In-memory implementation of every collaborator.
//!
//! Good enough for the demo server and for tests; production wires the
//! traits to the real document store instead.

use std::collections::HashMap;
use std::sync::Arc;

use pokeduel_protocol::{Card, CardId, MatchId, Outcome, UserId, UserStats};
use tokio::sync::Mutex;

use crate::{
    CardCatalog, Identity, IdentityService, MatchRecord, MatchStore, ServiceError,
};

/// Milestone points for winning a match.
const WIN_POINTS: u32 = 10;
/// Milestone points for finishing a match without winning it.
const PLAY_POINTS: u32 = 5;

#[derive(Default)]
struct Inner {
    tokens: HashMap<String, Identity>,
    stats: HashMap<UserId, UserStats>,
    cards: HashMap<CardId, Card>,
    matches: Vec<(MatchId, MatchRecord)>,
    next_match: u64,
    /// Number of upcoming `record_match` calls that should fail.
    failing_writes: u32,
}

/// Identity service, card catalog, and match store backed by hash maps.
///
/// Cheap to clone: clones share the same underlying state, so a test can
/// hand one clone to the server and inspect recorded matches via another.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
    open_registration: bool,
}

impl InMemoryBackend {
    /// An empty backend: no users, no cards.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose catalog holds the given cards.
    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let inner = Inner {
            cards: cards.into_iter().map(|c| (c.id, c)).collect(),
            ..Inner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            open_registration: false,
        }
    }

    /// Accept any non-empty unknown token as a new user whose id and
    /// username are the token itself.
    pub fn open_registration(mut self) -> Self {
        self.open_registration = true;
        self
    }

    /// Registers a user reachable through `token`.
    pub async fn register_user(&self, token: impl Into<String>, identity: Identity) {
        let mut inner = self.inner.lock().await;
        inner.stats.entry(identity.user_id.clone()).or_default();
        inner.tokens.insert(token.into(), identity);
    }

    /// Adds or replaces a catalog card.
    pub async fn add_card(&self, card: Card) {
        self.inner.lock().await.cards.insert(card.id, card);
    }

    /// Makes the next `count` match writes fail with `Unavailable`.
    pub async fn fail_next_writes(&self, count: u32) {
        self.inner.lock().await.failing_writes = count;
    }

    /// Every match persisted so far, oldest first.
    pub async fn matches(&self) -> Vec<(MatchId, MatchRecord)> {
        self.inner.lock().await.matches.clone()
    }
}

impl IdentityService for InMemoryBackend {
    async fn authenticate(&self, token: &str) -> Result<Identity, ServiceError> {
        let mut inner = self.inner.lock().await;
        if let Some(identity) = inner.tokens.get(token) {
            return Ok(identity.clone());
        }

        let token = token.trim();
        if !self.open_registration || token.is_empty() {
            return Err(ServiceError::AuthFailed("unknown token".into()));
        }

        let identity = Identity::new(token, token);
        inner.stats.entry(identity.user_id.clone()).or_default();
        inner.tokens.insert(token.to_string(), identity.clone());
        tracing::debug!(user_id = %identity.user_id, "registered user on first sight");
        Ok(identity)
    }

    async fn user_stats(&self, user_id: &UserId) -> Result<UserStats, ServiceError> {
        self.inner
            .lock()
            .await
            .stats
            .get(user_id)
            .copied()
            .ok_or_else(|| ServiceError::UserNotFound(user_id.clone()))
    }
}

impl CardCatalog for InMemoryBackend {
    async fn card(&self, id: CardId) -> Result<Option<Card>, ServiceError> {
        Ok(self.inner.lock().await.cards.get(&id).cloned())
    }
}

impl MatchStore for InMemoryBackend {
    async fn record_match(&self, record: MatchRecord) -> Result<MatchId, ServiceError> {
        let mut inner = self.inner.lock().await;
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(ServiceError::Unavailable("match store rejected the write".into()));
        }

        inner.next_match += 1;
        let match_id = MatchId(format!("match-{}", inner.next_match));

        let results = [
            (&record.player1.user_id, Outcome::Player1),
            (&record.player2.user_id, Outcome::Player2),
        ];
        for (user_id, side) in results {
            let stats = inner.stats.entry(user_id.clone()).or_default();
            apply_result(stats, record.winner, side);
        }

        tracing::info!(
            %match_id,
            room_id = %record.room_id,
            winner = %record.winner,
            "match recorded"
        );
        inner.matches.push((match_id.clone(), record));
        Ok(match_id)
    }
}

/// Updates one user's stats for a finished match played as `side`.
fn apply_result(stats: &mut UserStats, winner: Outcome, side: Outcome) {
    stats.matches_played += 1;
    if winner == Outcome::Draw {
        stats.draws += 1;
        stats.milestone_points += PLAY_POINTS;
    } else if winner == side {
        stats.wins += 1;
        stats.milestone_points += WIN_POINTS;
    } else {
        stats.losses += 1;
        stats.milestone_points += PLAY_POINTS;
    }
}

#[cfg(test)]
mod tests {
    use pokeduel_protocol::{FinalScore, RoomId, RoundRecord};

    use super::*;
    use crate::{MatchType, Participant};

    fn participant(id: &str) -> Participant {
        Participant {
            user_id: UserId::new(id),
            username: id.to_string(),
            team: vec![],
        }
    }

    fn record(winner: Outcome) -> MatchRecord {
        MatchRecord {
            room_id: RoomId::new("room_1_abcdefg"),
            match_type: MatchType::VsFriend,
            player1: participant("ash"),
            player2: participant("gary"),
            rounds: vec![RoundRecord::new(1, Card::new(1, "a", 50), Card::new(2, "b", 40))],
            final_score: FinalScore { player1: 1, player2: 0 },
            winner,
        }
    }

    #[tokio::test]
    async fn test_authenticate_known_token() {
        let backend = InMemoryBackend::new();
        backend.register_user("tok-ash", Identity::new("u1", "ash")).await;

        let identity = backend.authenticate("tok-ash").await.unwrap();
        assert_eq!(identity.username, "ash");
        assert!(backend.authenticate("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_open_registration_accepts_new_tokens() {
        let backend = InMemoryBackend::new().open_registration();
        let identity = backend.authenticate("misty").await.unwrap();
        assert_eq!(identity.user_id, UserId::new("misty"));
        assert!(backend.authenticate("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_catalog_lookup() {
        let backend = InMemoryBackend::with_cards([Card::new(25, "pikachu", 55)]);
        assert_eq!(backend.card(CardId(25)).await.unwrap().unwrap().attack, 55);
        assert!(backend.card(CardId(26)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_match_updates_both_players_stats() {
        let backend = InMemoryBackend::new();
        let id = backend.record_match(record(Outcome::Player1)).await.unwrap();
        assert_eq!(id, MatchId("match-1".into()));

        let ash = backend.user_stats(&UserId::new("ash")).await.unwrap();
        let gary = backend.user_stats(&UserId::new("gary")).await.unwrap();
        assert_eq!((ash.wins, ash.milestone_points), (1, WIN_POINTS));
        assert_eq!((gary.losses, gary.milestone_points), (1, PLAY_POINTS));
        assert_eq!(ash.matches_played, 1);
    }

    #[tokio::test]
    async fn test_draw_awards_play_points_to_both() {
        let backend = InMemoryBackend::new();
        backend.record_match(record(Outcome::Draw)).await.unwrap();
        for user in ["ash", "gary"] {
            let stats = backend.user_stats(&UserId::new(user)).await.unwrap();
            assert_eq!(stats.draws, 1);
            assert_eq!(stats.milestone_points, PLAY_POINTS);
        }
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed() {
        let backend = InMemoryBackend::new();
        backend.fail_next_writes(1).await;

        assert!(matches!(
            backend.record_match(record(Outcome::Player2)).await,
            Err(ServiceError::Unavailable(_))
        ));
        assert!(backend.record_match(record(Outcome::Player2)).await.is_ok());
        assert_eq!(backend.matches().await.len(), 1);
    }

    #[test]
    fn test_match_record_serializes_store_tags() {
        let json = serde_json::to_value(record(Outcome::Player1)).unwrap();
        assert_eq!(json["match_type"], "vs-friend");
        assert_eq!(json["winner"], "player1");
        assert_eq!(json["final_score"]["player1"], 1);
    }
}
