//! Resource-owner storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::UserRecord;

/// Storage for resource owners that can use the password grant.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by login name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>>;
}
