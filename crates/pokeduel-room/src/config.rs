//! Room engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the battle-room engine.
///
/// Defaults match the shipped game; tests shrink the delays to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Length of the shareable room code.
    pub code_length: usize,

    /// How many fresh identifiers to try before giving up on room
    /// creation because every candidate code was taken.
    pub max_code_attempts: u32,

    /// Pause between the final reveal and the game-over announcement,
    /// so clients can render round six.
    pub game_over_delay: Duration,

    /// How long the non-finalizing player waits before its stats are
    /// re-read from the identity service.
    pub stats_refresh_delay: Duration,

    /// How long a room may sit with every seated player offline before
    /// it is torn down.
    pub abandon_grace: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            max_code_attempts: 32,
            game_over_delay: Duration::from_millis(1500),
            stats_refresh_delay: Duration::from_secs(1),
            abandon_grace: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.code_length, 6);
        assert!(config.max_code_attempts > 0);
        assert!(config.game_over_delay > Duration::ZERO);
        assert!(config.abandon_grace > config.stats_refresh_delay);
    }
}
