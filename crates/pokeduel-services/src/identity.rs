//! Identity hook: who is on the other end of a connection.
//!
//! The battle server doesn't implement login; that belongs to the auth
//! routes in front of the document store. It only needs to turn the token
//! a client presents into a user, and to read a user's cumulative stats
//! back after a match.

use std::future::Future;

use pokeduel_protocol::{UserId, UserStats};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            username: username.into(),
        }
    }
}

/// Validates a client's token and serves profile statistics.
///
/// Methods return `impl Future + Send` (rather than being plain `async fn`)
/// so the server can call them from spawned tasks. Implementations are
/// still free to write `async fn`.
///
/// # Example
///
/// ```rust
/// use pokeduel_protocol::{UserId, UserStats};
/// use pokeduel_services::{Identity, IdentityService, ServiceError};
///
/// /// Treats the token itself as the user id. Development only!
/// struct TokenIsUser;
///
/// impl IdentityService for TokenIsUser {
///     async fn authenticate(&self, token: &str) -> Result<Identity, ServiceError> {
///         if token.is_empty() {
///             return Err(ServiceError::AuthFailed("empty token".into()));
///         }
///         Ok(Identity::new(token, token))
///     }
///
///     async fn user_stats(&self, _user: &UserId) -> Result<UserStats, ServiceError> {
///         Ok(UserStats::default())
///     }
/// }
/// ```
pub trait IdentityService: Send + Sync + 'static {
    /// Resolves a token to the user it belongs to.
    ///
    /// # Errors
    /// [`ServiceError::AuthFailed`] if the token is not valid.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Identity, ServiceError>> + Send;

    /// Current cumulative statistics for a user.
    fn user_stats(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<UserStats, ServiceError>> + Send;
}
