//! Error types for the collaborator layer.

use pokeduel_protocol::UserId;

/// Errors returned by the identity, catalog, and persistence services.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The token was missing, malformed, or unknown.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The identity service has no such user.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The backing store could not be reached or refused the write.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}
