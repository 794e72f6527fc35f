//! `PokeduelServer` builder and server loop.
//!
//! This is the entry point for running a battle server. It ties together
//! all the layers: transport → protocol → room engine → services.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pokeduel_protocol::{Codec, JsonCodec};
use pokeduel_room::{BattleRoomManager, RoomConfig};
use pokeduel_services::Backend;
use pokeduel_transport::{Incoming, Transport, WebSocketTransport};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::PokeduelError;
use crate::handler::handle_connection;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Server-level settings. Room behaviour lives in [`RoomConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// How long a new connection has to complete the WebSocket upgrade,
    /// and then again to send its handshake.
    pub handshake_timeout: Duration,

    /// A connection that sends nothing (not even a heartbeat) for this
    /// long is dropped. Its seats are kept.
    pub idle_timeout: Duration,

    /// How often abandoned rooms are swept.
    pub sweep_interval: Duration,

    #[serde(default)]
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(30),
            room: RoomConfig::default(),
        }
    }
}

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Every room
/// mutation goes through the one `Mutex<BattleRoomManager>`; the lock is
/// never held across a call to the backend.
pub(crate) struct ServerState<B: Backend, C: Codec> {
    pub(crate) rooms: Mutex<BattleRoomManager>,
    pub(crate) backend: B,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    started: Instant,
}

impl<B: Backend, C: Codec> ServerState<B, C> {
    /// Milliseconds since the server started, used for envelope
    /// timestamps and heartbeat replies.
    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Pokeduel server.
///
/// # Example
///
/// ```rust,no_run
/// use pokeduel::prelude::*;
///
/// # async fn run() -> Result<(), PokeduelError> {
/// let backend = InMemoryBackend::new().open_registration();
/// let server = PokeduelServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(backend)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PokeduelServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl PokeduelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces only the room engine configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Binds the listener and wires the server to `backend`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<B: Backend>(self, backend: B) -> Result<PokeduelServer<B, JsonCodec>, PokeduelError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(BattleRoomManager::new(self.config.room.clone())),
            backend,
            codec: JsonCodec,
            config: self.config,
            started: Instant::now(),
        });

        Ok(PokeduelServer { transport, state })
    }
}

impl Default for PokeduelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Pokeduel server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PokeduelServer<B: Backend, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<B, C>>,
}

impl<B: Backend, C: Codec> PokeduelServer<B, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Starts the abandoned-room sweeper, then accepts connections and
    /// spawns a task for each that upgrades the socket and runs the
    /// handler. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), PokeduelError> {
        tracing::info!(addr = ?self.local_addr().ok(), "pokeduel server running");
        spawn_sweeper(Arc::clone(&self.state));

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let upgrade = tokio::time::timeout(state.config.handshake_timeout, incoming.upgrade());
                        let conn = match upgrade.await {
                            Ok(Ok(conn)) => conn,
                            Ok(Err(e)) => {
                                tracing::debug!(%peer, error = %e, "websocket upgrade failed");
                                return;
                            }
                            Err(_) => {
                                tracing::debug!(%peer, "websocket upgrade timed out");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically tears down rooms nobody has been connected to for the
/// configured grace period.
fn spawn_sweeper<B: Backend, C: Codec>(state: Arc<ServerState<B, C>>) {
    let period = state.config.sweep_interval.max(Duration::from_millis(10));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = state.rooms.lock().await.expire_abandoned(Instant::now());
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), "swept abandoned rooms");
            }
        }
    });
}
