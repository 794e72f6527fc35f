//! Error types for the protocol layer.
//!
//! Each crate in Pokeduel defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in serialization, not in
//! networking or room coordination.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a message).
    ///
    /// Common causes: malformed JSON, an unknown `type` tag, missing
    /// required fields, or truncated frames.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but breaks a protocol rule, e.g. a
    /// first frame that is not a handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
