//! Unified error type for the Pokeduel server.

use pokeduel_protocol::ProtocolError;
use pokeduel_room::RoomError;
use pokeduel_services::ServiceError;
use pokeduel_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PokeduelError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An external collaborator failed (auth, catalog, store).
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A room-level error (full, not found, out-of-turn).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use pokeduel_protocol::RoomId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: PokeduelError = err.into();
        assert!(matches!(err, PokeduelError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: PokeduelError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, PokeduelError::Protocol(_)));
    }

    #[test]
    fn test_from_service_error() {
        let err: PokeduelError = ServiceError::AuthFailed("nope".into()).into();
        assert!(matches!(err, PokeduelError::Service(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: PokeduelError = RoomError::RoomNotFound(RoomId::new("room_1_x")).into();
        assert!(matches!(err, PokeduelError::Room(_)));
        assert!(err.to_string().contains("room_1_x"));
    }
}
