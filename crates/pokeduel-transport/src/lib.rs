//! Transport abstraction layer for Pokeduel.
//!
//! Provides the [`Transport`] and [`Connection`] traits so the battle
//! server never touches a socket type directly.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use pokeduel_protocol::ConnectionId;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A peer that has connected but not yet completed the upgrade.
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer.
    ///
    /// Only the socket is accepted here. The protocol upgrade happens in
    /// [`Incoming::upgrade`], off the accept loop, so a peer that never
    /// speaks cannot hold up the listener.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;
}

/// An accepted socket waiting for its protocol upgrade.
pub trait Incoming: Send + 'static {
    /// The connection produced once the upgrade completes.
    type Connection: Connection;
    /// The error type for the upgrade.
    type Error: std::error::Error + Send + Sync;

    /// Completes the upgrade. Callers bound this with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive frames.
///
/// `send` and `recv` must be callable concurrently: a connection task
/// waits in `recv` while room broadcasts for it are being written.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
