//! Identity collaborator trait.

use crate::error::Result;
use async_trait::async_trait;

/// Read access to the identity store.
///
/// The refresh token manager uses it to confirm a user exists before issuing
/// tokens, and to load claims for the paired access token.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user type.
    type User: Send + Sync;

    /// Whether a user with this ID exists.
    async fn exists_user(&self, user_id: &str) -> Result<bool>;

    /// Load a user by their ID.
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<Self::User>>;

    /// Get the user's email (for token claims).
    fn user_email(&self, user: &Self::User) -> Option<String>;

    /// Get the user's name (for token claims).
    fn user_name(&self, user: &Self::User) -> Option<String> {
        let _ = user;
        None
    }
}
