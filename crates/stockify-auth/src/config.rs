//! Authorization server configuration.
//!
//! Configuration is organized into sections for signing keys, grant
//! behavior, resource binding, the revocation store, and the static client
//! and user tables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keys::SigningAlgorithm;
use crate::types::GrantType;

/// Root authorization server configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.stockify.example"
///
/// [auth.signing]
/// keystore = "keystore.toml"
/// alias = "stockify"
/// passphrase = "change-me"
///
/// [[auth.clients]]
/// client_id = "stockify-web"
/// secret = "web-secret"
/// grant_types = ["password", "refresh_token"]
/// scopes = ["read", "write"]
/// resource_ids = ["inventory"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer placed in the token `iss` claim.
    pub issuer: String,

    /// Token signing configuration.
    pub signing: SigningConfig,

    /// Grant handling configuration.
    pub oauth: OAuthConfig,

    /// Resource-server side verification settings.
    pub resource: ResourceConfig,

    /// Revocation store timeouts and retries.
    pub revocation: RevocationConfig,

    /// Registered clients.
    pub clients: Vec<ClientConfig>,

    /// Resource owners for the password grant.
    pub users: Vec<UserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            signing: SigningConfig::default(),
            oauth: OAuthConfig::default(),
            resource: ResourceConfig::default(),
            revocation: RevocationConfig::default(),
            clients: Vec::new(),
            users: Vec::new(),
        }
    }
}

/// Token signing configuration.
///
/// Keys come from a keystore file selected by alias and passphrase. For local
/// development an ephemeral key can be generated at startup instead.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Path to the keystore file.
    pub keystore: Option<PathBuf>,

    /// Alias of the active signing key.
    pub alias: String,

    /// Passphrase protecting the keystore entries.
    pub passphrase: Option<String>,

    /// Aliases of retired keys that still verify tokens until they expire.
    pub verification_aliases: Vec<String>,

    /// Generate a throwaway key pair when no keystore is configured.
    pub generate_ephemeral: bool,

    /// Algorithm for ephemeral keys.
    pub algorithm: SigningAlgorithm,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            keystore: None,
            alias: "stockify".to_string(),
            passphrase: None,
            verification_aliases: Vec::new(),
            generate_ephemeral: false,
            algorithm: SigningAlgorithm::RS256,
        }
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .field("verification_aliases", &self.verification_aliases)
            .field("generate_ephemeral", &self.generate_ephemeral)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// How presented refresh tokens are treated after a successful refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTokenPolicy {
    /// Each refresh token is single-use. A replay fails with `TokenReused`.
    #[default]
    Rotate,
    /// Refresh tokens remain valid until they expire.
    Reuse,
}

/// Grant handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Refresh token reuse policy.
    pub refresh_token_policy: RefreshTokenPolicy,

    /// Leeway applied to the `exp` check.
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            refresh_token_policy: RefreshTokenPolicy::Rotate,
            clock_skew: Duration::ZERO,
        }
    }
}

/// Resource-server verification settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// When set, access tokens must list this id in their audience.
    pub resource_id: Option<String>,
}

/// Revocation store call limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RevocationConfig {
    /// Timeout for a single store call.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Attempts before giving up with a transient error.
    pub max_attempts: u32,

    /// Delay before the first retry. Doubles on each further retry.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// How often expired entries are purged.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(250),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

/// A client registration as written in configuration.
///
/// Exactly one of `secret` (plaintext, hashed at startup) or `secret_hash`
/// (Argon2 PHC string) must be set.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Unique client identifier.
    pub client_id: String,

    /// Plaintext client secret.
    pub secret: Option<String>,

    /// Pre-hashed client secret.
    pub secret_hash: Option<String>,

    /// Allowed grant types.
    pub grant_types: Vec<GrantType>,

    /// Allowed scopes.
    pub scopes: Vec<String>,

    /// Resource servers the client's tokens are bound to.
    pub resource_ids: Vec<String>,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            secret: None,
            secret_hash: None,
            grant_types: vec![GrantType::Password, GrantType::RefreshToken],
            scopes: vec!["read".to_string(), "write".to_string()],
            resource_ids: Vec::new(),
            access_token_lifetime: Duration::from_secs(3600), // 1 hour
            refresh_token_lifetime: Duration::from_secs(6 * 3600), // 6 hours
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("secret_hash", &self.secret_hash.as_ref().map(|_| "***"))
            .field("grant_types", &self.grant_types)
            .field("scopes", &self.scopes)
            .field("resource_ids", &self.resource_ids)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .finish()
    }
}

/// A resource owner as written in configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserConfig {
    /// Subject id. Defaults to the username.
    pub id: Option<String>,

    /// Login name.
    pub username: String,

    /// Plaintext password, hashed at startup.
    pub password: Option<String>,

    /// Pre-hashed password.
    pub password_hash: Option<String>,

    /// Inactive users cannot sign in.
    pub active: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: None,
            username: String::new(),
            password: None,
            password_hash: None,
            active: true,
        }
    }
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl From<ConfigError> for crate::error::AuthError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no signing key source is configured
    /// and `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - The revocation limits are zero
    /// - A client or user entry is incomplete or duplicated
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        if self.signing.keystore.is_none() && !self.signing.generate_ephemeral {
            return Err(ConfigError::Missing(
                "signing.keystore (or signing.generate_ephemeral = true)".to_string(),
            ));
        }

        if self.signing.alias.is_empty() {
            return Err(ConfigError::InvalidValue(
                "signing.alias cannot be empty".to_string(),
            ));
        }

        if self.revocation.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "revocation.max_attempts must be > 0".to_string(),
            ));
        }

        if self.revocation.timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "revocation.timeout must be > 0".to_string(),
            ));
        }

        let mut client_ids = std::collections::HashSet::new();
        for client in &self.clients {
            if client.client_id.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "client_id cannot be empty".to_string(),
                ));
            }
            if !client_ids.insert(client.client_id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate client_id '{}'",
                    client.client_id
                )));
            }
            match (&client.secret, &client.secret_hash) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::InvalidValue(format!(
                        "client '{}' sets both secret and secret_hash",
                        client.client_id
                    )));
                }
                (None, None) => {
                    return Err(ConfigError::Missing(format!(
                        "secret for client '{}'",
                        client.client_id
                    )));
                }
                _ => {}
            }
        }

        let mut usernames = std::collections::HashSet::new();
        for user in &self.users {
            if user.username.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "username cannot be empty".to_string(),
                ));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate username '{}'",
                    user.username
                )));
            }
            if user.password.is_some() == user.password_hash.is_some() {
                return Err(ConfigError::InvalidValue(format!(
                    "user '{}' must set exactly one of password or password_hash",
                    user.username
                )));
            }
        }

        Ok(())
    }
}
