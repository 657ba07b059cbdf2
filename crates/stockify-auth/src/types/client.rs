//! OAuth 2.0 client registration types.
//!
//! A [`ClientRegistration`] is built once from configuration and never
//! mutated afterwards. It fixes which grants, scopes and resource servers a
//! client may use and how long its tokens live.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types understood by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Resource Owner Password Credentials flow.
    Password,
    /// Refresh Token flow.
    RefreshToken,
}

impl GrantType {
    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Self::Password),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(other.to_string()),
        }
    }
}

// =============================================================================
// Client Registration
// =============================================================================

/// A registered OAuth 2.0 client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRegistration {
    /// Unique client identifier.
    pub client_id: String,

    /// Argon2 PHC hash of the client secret.
    pub secret_hash: String,

    /// Grant types this client may use.
    pub allowed_grant_types: BTreeSet<GrantType>,

    /// Scopes this client may be granted.
    pub allowed_scopes: BTreeSet<String>,

    /// Resource servers this client's tokens are bound to (`aud` claim).
    pub resource_ids: BTreeSet<String>,

    /// Access token lifetime.
    pub access_token_ttl: Duration,

    /// Refresh token lifetime.
    pub refresh_token_ttl: Duration,
}

impl ClientRegistration {
    /// Validates the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is empty, no grant type or scope is
    /// allowed, or a token lifetime is zero.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.trim().is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.secret_hash.is_empty() {
            return Err(ClientValidationError::MissingSecret);
        }

        if self.allowed_grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        if self.allowed_scopes.is_empty() {
            return Err(ClientValidationError::NoScopes);
        }

        if self.allowed_scopes.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
            return Err(ClientValidationError::InvalidScope);
        }

        if self.access_token_ttl.is_zero() || self.refresh_token_ttl.is_zero() {
            return Err(ClientValidationError::ZeroLifetime);
        }

        Ok(())
    }

    /// Checks if the client may use the given grant type.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.allowed_grant_types.contains(&grant_type)
    }

    /// Checks if the client may be granted the given scope.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.allowed_scopes.contains(scope)
    }

    /// Returns the token lifetime for the given kind of token in seconds.
    #[must_use]
    pub fn ttl_seconds(&self, kind: crate::token::TokenKind) -> i64 {
        let ttl = match kind {
            crate::token::TokenKind::Access => self.access_token_ttl,
            crate::token::TokenKind::Refresh => self.refresh_token_ttl,
        };
        i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Errors that can occur when validating a client registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// A client secret (plaintext or hash) is required.
    #[error("Client must have a secret")]
    MissingSecret,

    /// At least one grant type is required.
    #[error("Client must allow at least one grant type")]
    NoGrantTypes,

    /// At least one scope is required.
    #[error("Client must allow at least one scope")]
    NoScopes,

    /// Scopes are single non-empty tokens.
    #[error("Scopes must be non-empty and contain no whitespace")]
    InvalidScope,

    /// Token lifetimes must be positive.
    #[error("Token lifetimes must be greater than zero")]
    ZeroLifetime,
}
