//! A runnable battle server backed by the in-memory services.
//!
//! Any token is accepted as a username, and the catalog holds a couple
//! dozen first-generation Pokémon. Good enough to point a browser client
//! at:
//!
//! ```text
//! RUST_LOG=debug cargo run -p battle-server -- --bind 0.0.0.0:8080
//! ```

use std::time::Duration;

use clap::Parser;
use pokeduel::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "battle-server", about = "Pokeduel battle server (in-memory backend)")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Pause between the last reveal and the game-over announcement.
    #[arg(long, default_value_t = 1500)]
    game_over_delay_ms: u64,

    /// How long a room may sit with every player offline.
    #[arg(long, default_value_t = 300)]
    abandon_grace_secs: u64,

    /// Drop connections silent for this long.
    #[arg(long, default_value_t = 30)]
    idle_timeout_secs: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            room: RoomConfig {
                game_over_delay: Duration::from_millis(self.game_over_delay_ms),
                abandon_grace: Duration::from_secs(self.abandon_grace_secs),
                ..defaults.room.clone()
            },
            ..defaults
        }
    }
}

/// Pokédex number, name, attack.
const CATALOG: &[(u32, &str, u32)] = &[
    (1, "Bulbasaur", 49),
    (3, "Venusaur", 82),
    (4, "Charmander", 52),
    (6, "Charizard", 84),
    (7, "Squirtle", 48),
    (9, "Blastoise", 83),
    (25, "Pikachu", 55),
    (26, "Raichu", 90),
    (39, "Jigglypuff", 45),
    (52, "Meowth", 45),
    (54, "Psyduck", 52),
    (59, "Arcanine", 110),
    (65, "Alakazam", 50),
    (68, "Machamp", 130),
    (94, "Gengar", 65),
    (95, "Onix", 45),
    (130, "Gyarados", 125),
    (131, "Lapras", 85),
    (133, "Eevee", 55),
    (143, "Snorlax", 110),
    (149, "Dragonite", 134),
    (150, "Mewtwo", 110),
];

fn seeded_backend() -> InMemoryBackend {
    let cards = CATALOG
        .iter()
        .map(|&(id, name, attack)| Card::new(id, name, attack));
    InMemoryBackend::with_cards(cards).open_registration()
}

#[tokio::main]
async fn main() -> Result<(), PokeduelError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    tracing::info!(bind = %args.bind, cards = CATALOG.len(), "starting battle server");

    let server = PokeduelServerBuilder::new()
        .bind(&args.bind)
        .config(args.server_config())
        .build(seeded_backend())
        .await?;

    server.run().await
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_has_distinct_ids() {
        let ids: HashSet<u32> = CATALOG.iter().map(|&(id, _, _)| id).collect();
        assert_eq!(ids.len(), CATALOG.len());
        // Two full teams must fit.
        assert!(CATALOG.len() >= 12);
    }

    #[test]
    fn test_args_map_onto_config() {
        let args = Args::parse_from([
            "battle-server",
            "--game-over-delay-ms",
            "0",
            "--abandon-grace-secs",
            "5",
        ]);
        let config = args.server_config();
        assert_eq!(config.room.game_over_delay, Duration::ZERO);
        assert_eq!(config.room.abandon_grace, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(args.bind, "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_seeded_backend_resolves_cards() {
        let backend = seeded_backend();
        let card = backend.card(CardId(25)).await.unwrap();
        assert_eq!(card.map(|c| c.name), Some("Pikachu".to_string()));

        let identity = backend.authenticate("ash").await.unwrap();
        assert_eq!(identity.user_id, UserId::new("ash"));
    }
}
