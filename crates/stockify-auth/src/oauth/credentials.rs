//! Resource-owner credential verification for the password grant.

use std::sync::Arc;

use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::password::{verify_dummy_async, verify_stored_async};
use crate::storage::UserStore;
use crate::types::Principal;

/// Checks usernames and passwords against a [`UserStore`].
///
/// Unknown user, inactive user and wrong password all fail with the same
/// [`AuthError::InvalidCredentials`] after the same amount of hashing work.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
}

impl CredentialVerifier {
    /// Creates a verifier over the given user store.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Verifies a username and password.
    ///
    /// Returns a principal carrying only the subject; scopes are decided at
    /// issuance.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on any mismatch, or a storage
    /// error if the lookup fails.
    pub async fn verify(&self, username: &str, password: &str) -> AuthResult<Principal> {
        let Some(user) = self.users.find_by_username(username).await? else {
            verify_dummy_async(password).await;
            debug!("Password grant for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = verify_stored_async(password, &user.password_hash).await?;
        if !matches {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.active {
            debug!(user_id = %user.id, "Password grant for inactive user");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Principal::subject(user.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use crate::storage::InMemoryUserStore;
    use crate::types::UserRecord;

    fn verifier() -> CredentialVerifier {
        let mut store = InMemoryUserStore::new();
        store.insert(UserRecord {
            id: "user-1".to_string(),
            username: "alice".to_string(),
            password_hash: hash_password("wonderland").unwrap(),
            active: true,
        });
        store.insert(UserRecord {
            id: "user-2".to_string(),
            username: "mallory".to_string(),
            password_hash: hash_password("locked").unwrap(),
            active: false,
        });
        CredentialVerifier::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let principal = verifier().verify("alice", "wonderland").await.unwrap();
        assert_eq!(principal.subject_id, "user-1");
        assert!(principal.scopes.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let verifier = verifier();
        for (username, password) in [
            ("alice", "wrong"),
            ("nobody", "wonderland"),
            ("mallory", "locked"),
        ] {
            let err = verifier.verify(username, password).await.unwrap_err();
            assert!(
                matches!(err, AuthError::InvalidCredentials),
                "{username}: {err}"
            );
        }
    }
}
