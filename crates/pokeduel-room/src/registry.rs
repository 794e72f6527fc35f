//! Room registry: allocation of ids and codes, lookup, removal.

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use pokeduel_protocol::{RoomCode, RoomId};
use pokeduel_services::Identity;
use rand::Rng;

use crate::{Room, RoomConfig, RoomError};

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random part of a room id. Codes are a prefix of it.
const SUFFIX_LEN: usize = 7;

/// Every live room, reachable by id and by code.
///
/// Two maps are kept in step: `rooms` owns the data, `codes` is the
/// secondary index used when a friend types a code in. A code is unique
/// among live rooms and becomes reusable once its room is removed.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    codes: HashMap<RoomCode, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room owned by `creator` with a fresh id and code.
    ///
    /// # Errors
    /// [`RoomError::CodeSpaceExhausted`] if `max_code_attempts` candidates
    /// in a row collided with live codes.
    pub fn create_room(&mut self, creator: &Identity, config: &RoomConfig) -> Result<&mut Room, RoomError> {
        let len = config.code_length.max(SUFFIX_LEN);
        let mut rng = rand::rng();
        self.create_room_with(creator, config, || {
            (0..len)
                .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
                .collect()
        })
    }

    /// Like [`create_room`](Self::create_room), drawing id suffixes from
    /// `next_suffix`.
    pub(crate) fn create_room_with(
        &mut self,
        creator: &Identity,
        config: &RoomConfig,
        mut next_suffix: impl FnMut() -> String,
    ) -> Result<&mut Room, RoomError> {
        for _ in 0..config.max_code_attempts {
            let suffix = next_suffix();
            let code = RoomCode::new(suffix.chars().take(config.code_length).collect::<String>());
            let id = RoomId::new(format!("room_{}_{suffix}", unix_millis()));

            if self.codes.contains_key(&code) || self.rooms.contains_key(&id) {
                tracing::debug!(%code, "room code collision, retrying");
                continue;
            }

            self.codes.insert(code.clone(), id.clone());
            let room = Room::new(id.clone(), code, creator, Instant::now());
            tracing::info!(room_id = %id, code = %room.code, creator = %creator.user_id, "room created");
            return Ok(self.rooms.entry(id).or_insert(room));
        }

        tracing::warn!(attempts = config.max_code_attempts, "room code space exhausted");
        Err(RoomError::CodeSpaceExhausted(config.max_code_attempts))
    }

    pub fn get(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn get_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    /// Resolves a code, case-insensitively, to the id of a live room.
    pub fn room_id_by_code(&self, code: &str) -> Option<&RoomId> {
        self.codes.get(&RoomCode::new(code))
    }

    /// Removes a room and frees its code. Removing twice is a no-op.
    pub fn remove(&mut self, id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(id)?;
        self.codes.remove(&room.code);
        tracing::info!(room_id = %id, "room removed");
        Some(room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("alice", "Alice")
    }

    #[test]
    fn test_create_room_id_and_code_format() {
        let mut registry = RoomRegistry::new();
        let config = RoomConfig::default();
        let room = registry.create_room(&alice(), &config).unwrap();

        let id = room.id().as_str().to_string();
        let code = room.code().as_str().to_string();
        assert!(id.starts_with("room_"));
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));

        // The code is the uppercased head of the id's random suffix.
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 7);
        assert_eq!(suffix[..6].to_ascii_uppercase(), code);
    }

    #[test]
    fn test_code_lookup_is_case_insensitive() {
        let mut registry = RoomRegistry::new();
        let config = RoomConfig::default();
        let id = registry
            .create_room_with(&alice(), &config, || "abc123x".to_string())
            .unwrap()
            .id()
            .clone();

        assert_eq!(registry.room_id_by_code("ABC123"), Some(&id));
        assert_eq!(registry.room_id_by_code(" abc123 "), Some(&id));
        assert_eq!(registry.room_id_by_code("ZZZZZZ"), None);
    }

    #[test]
    fn test_code_collision_retries() {
        let mut registry = RoomRegistry::new();
        let config = RoomConfig::default();
        registry
            .create_room_with(&alice(), &config, || "aaaaaa1".to_string())
            .unwrap();

        let mut candidates = vec!["bbbbbb2", "aaaaaa9"].into_iter().map(String::from);
        let code = registry
            .create_room_with(&alice(), &config, || candidates.next_back().unwrap_or_default())
            .unwrap()
            .code()
            .clone();

        assert_eq!(code, RoomCode::new("BBBBBB"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_code_space_exhausted() {
        let mut registry = RoomRegistry::new();
        let config = RoomConfig {
            max_code_attempts: 3,
            ..RoomConfig::default()
        };
        registry
            .create_room_with(&alice(), &config, || "aaaaaa1".to_string())
            .unwrap();

        let mut calls = 0;
        let err = registry
            .create_room_with(&alice(), &config, || {
                calls += 1;
                "aaaaaa2".to_string()
            })
            .unwrap_err();
        assert!(matches!(err, RoomError::CodeSpaceExhausted(3)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_remove_frees_code() {
        let mut registry = RoomRegistry::new();
        let config = RoomConfig::default();
        let id = registry
            .create_room_with(&alice(), &config, || "qqqqqq1".to_string())
            .unwrap()
            .id()
            .clone();

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.room_id_by_code("QQQQQQ").is_none());
        assert!(registry.create_room_with(&alice(), &config, || "qqqqqq2".to_string()).is_ok());
    }
}
