//! In-memory storage backends.
//!
//! The client and user tables are built once from configuration and are
//! read-only afterwards. The revocation set is the one piece of shared
//! mutable state and relies on `DashMap`'s entry API for atomic
//! check-and-mark.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{ClientRegistry, RevocationStore, UserStore};
use crate::config::{ClientConfig, UserConfig};
use crate::error::{AuthError, AuthResult};
use crate::password::{hash_or_accept, verify_dummy_async, verify_stored_async};
use crate::types::{ClientRegistration, UserRecord};

// =============================================================================
// Client Registry
// =============================================================================

/// Static client registry backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct StaticClientRegistry {
    clients: HashMap<String, Arc<ClientRegistration>>,
}

impl StaticClientRegistry {
    /// Builds a registry from validated registrations.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a registration is invalid or a
    /// client id appears twice.
    pub fn new(registrations: Vec<ClientRegistration>) -> AuthResult<Self> {
        let mut clients = HashMap::with_capacity(registrations.len());
        for registration in registrations {
            registration.validate().map_err(|e| {
                AuthError::configuration(format!("client '{}': {e}", registration.client_id))
            })?;
            let client_id = registration.client_id.clone();
            if clients
                .insert(client_id.clone(), Arc::new(registration))
                .is_some()
            {
                return Err(AuthError::configuration(format!(
                    "duplicate client_id '{client_id}'"
                )));
            }
        }
        Ok(Self { clients })
    }

    /// Builds a registry from configuration, hashing plaintext secrets.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] on invalid entries.
    pub fn from_config(configs: &[ClientConfig]) -> AuthResult<Self> {
        let registrations = configs
            .iter()
            .map(|config| {
                let secret_hash =
                    hash_or_accept(config.secret.as_deref(), config.secret_hash.as_deref())
                        .map_err(|e| {
                            AuthError::configuration(format!("client '{}': {e}", config.client_id))
                        })?;
                Ok(ClientRegistration {
                    client_id: config.client_id.clone(),
                    secret_hash,
                    allowed_grant_types: config.grant_types.iter().copied().collect(),
                    allowed_scopes: config.scopes.iter().cloned().collect(),
                    resource_ids: config.resource_ids.iter().cloned().collect(),
                    access_token_ttl: config.access_token_lifetime,
                    refresh_token_ttl: config.refresh_token_lifetime,
                })
            })
            .collect::<AuthResult<Vec<_>>>()?;
        Self::new(registrations)
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientRegistry for StaticClientRegistry {
    async fn lookup(&self, client_id: &str) -> AuthResult<Option<ClientRegistration>> {
        Ok(self.clients.get(client_id).map(|c| c.as_ref().clone()))
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        match self.clients.get(client_id) {
            Some(client) => verify_stored_async(secret, &client.secret_hash).await,
            None => {
                verify_dummy_async(secret).await;
                Ok(false)
            }
        }
    }
}

// =============================================================================
// User Store
// =============================================================================

/// In-memory user table keyed by username.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: HashMap<String, UserRecord>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn insert(&mut self, user: UserRecord) {
        self.users.insert(user.username.clone(), user);
    }

    /// Builds a store from configuration, hashing plaintext passwords.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] on invalid entries.
    pub fn from_config(configs: &[UserConfig]) -> AuthResult<Self> {
        let mut store = Self::new();
        for config in configs {
            let password_hash =
                hash_or_accept(config.password.as_deref(), config.password_hash.as_deref())
                    .map_err(|e| {
                        AuthError::configuration(format!("user '{}': {e}", config.username))
                    })?;
            store.insert(UserRecord {
                id: config.id.clone().unwrap_or_else(|| config.username.clone()),
                username: config.username.clone(),
                password_hash,
                active: config.active,
            });
        }
        Ok(store)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
        Ok(self.users.get(username).cloned())
    }
}

// =============================================================================
// Revocation Store
// =============================================================================

/// In-memory used-JTI set.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    used: DashMap<String, i64>,
}

impl InMemoryRevocationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded JTIs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Returns `true` if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn mark_used(&self, jti: &str, expires_at: i64) -> AuthResult<bool> {
        match self.used.entry(jti.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.used.contains_key(jti))
    }

    async fn cleanup_expired(&self, now: i64) -> AuthResult<u64> {
        let before = self.used.len();
        self.used.retain(|_, expires_at| *expires_at > now);
        Ok(before.saturating_sub(self.used.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_config() -> ClientConfig {
        ClientConfig {
            client_id: "c1".to_string(),
            secret: Some("s1".to_string()),
            resource_ids: vec!["inventory".to_string()],
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_client_registry_from_config() {
        let registry = StaticClientRegistry::from_config(&[client_config()]).unwrap();
        assert_eq!(registry.len(), 1);

        let client = registry.lookup("c1").await.unwrap().unwrap();
        assert_eq!(client.client_id, "c1");
        assert!(client.secret_hash.starts_with("$argon2id$"));
        assert!(client.resource_ids.contains("inventory"));

        assert!(registry.lookup("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_secret() {
        let registry = StaticClientRegistry::from_config(&[client_config()]).unwrap();
        assert!(registry.verify_secret("c1", "s1").await.unwrap());
        assert!(!registry.verify_secret("c1", "wrong").await.unwrap());
        assert!(!registry.verify_secret("unknown", "s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_registration_rejected() {
        let config = ClientConfig {
            scopes: Vec::new(),
            ..client_config()
        };
        let err = StaticClientRegistry::from_config(&[config]).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_user_store_from_config() {
        let store = InMemoryUserStore::from_config(&[UserConfig {
            username: "alice".to_string(),
            password: Some("pw".to_string()),
            ..UserConfig::default()
        }])
        .unwrap();

        let user = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.id, "alice");
        assert!(user.active);
        assert!(store.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_used_is_check_and_set() {
        let store = InMemoryRevocationStore::new();
        assert!(store.mark_used("jti-1", 100).await.unwrap());
        assert!(!store.mark_used("jti-1", 100).await.unwrap());
        assert!(store.is_used("jti-1").await.unwrap());
        assert!(!store.is_used("jti-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_mark_used_single_winner() {
        let store = Arc::new(InMemoryRevocationStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.mark_used("shared", 100).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = InMemoryRevocationStore::new();
        store.mark_used("old", 100).await.unwrap();
        store.mark_used("new", 300).await.unwrap();

        assert_eq!(store.cleanup_expired(200).await.unwrap(), 1);
        assert!(!store.is_used("old").await.unwrap());
        assert!(store.is_used("new").await.unwrap());
        assert_eq!(store.len(), 1);
    }
}
