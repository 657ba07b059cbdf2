//! Client registry trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::ClientRegistration;

/// Lookup table of registered OAuth clients.
///
/// Registrations are immutable once loaded. The static in-memory registry is
/// [`StaticClientRegistry`](super::StaticClientRegistry); persistent stores
/// can implement this trait as well.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Finds a client by its identifier.
    ///
    /// Returns `None` if no such client is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn lookup(&self, client_id: &str) -> AuthResult<Option<ClientRegistration>>;

    /// Verifies a presented client secret.
    ///
    /// Returns `false` for unknown clients as well as wrong secrets, and takes
    /// the same time in both cases.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool>;
}
