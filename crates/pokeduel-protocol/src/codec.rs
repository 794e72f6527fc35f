//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The server never cares HOW an [`Envelope`](crate::Envelope) becomes
//! bytes. It only needs something that implements [`Codec`]. Swapping
//! JSON for a binary format later touches nothing but this module.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// `DeserializeOwned` means the result owns its data, so the inbound
    /// frame can be dropped right after decoding.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Battle clients are browsers, so JSON is the natural wire format: it
/// shows up readable in DevTools and needs no client-side schema.
///
/// ## Example
///
/// ```rust
/// use pokeduel_protocol::{ClientMessage, Codec, Envelope, JsonCodec, RoomId};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(
///     1,
///     5000,
///     ClientMessage::LeaveRoom { room_id: RoomId::new("room_1_abcdefg") },
/// );
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope<ClientMessage> = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
