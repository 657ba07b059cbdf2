//! Token endpoint request and response types.
//!
//! # Example Request
//!
//! ```text
//! POST /auth/signin
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic YzE6czE=
//!
//! grant_type=password&username=alice&password=secret&scope=read%20write
//! ```
//!
//! # Example Response
//!
//! ```json
//! {
//!   "access_token": "eyJhbG...",
//!   "token_type": "bearer",
//!   "expires_in": 3600,
//!   "refresh_token": "eyJhbG...",
//!   "scope": "read write"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::token::TokenPair;
use crate::types::join_scopes;

/// Token request parameters, as posted to the token endpoint.
#[derive(Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type: "password" or "refresh_token".
    #[serde(default)]
    pub grant_type: Option<String>,

    /// Client ID (client_secret_post).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (client_secret_post).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Resource owner username (password grant).
    #[serde(default)]
    pub username: Option<String>,

    /// Resource owner password (password grant).
    #[serde(default)]
    pub password: Option<String>,

    /// Refresh token (refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Requested scope, space-separated.
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Client credentials, taken from HTTP Basic or from the request body.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Presented client secret.
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Successful token response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// The access token (JWT).
    pub access_token: String,

    /// Token type, always "bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,
}

impl TokenResponse {
    /// Creates a new token response with required fields.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token: None,
            scope,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        let expires_in = pair.access.expires_in();
        let scope = join_scopes(&pair.access.scopes);
        Self::new(pair.access.token, expires_in, scope).with_refresh_token(pair.refresh.token)
    }
}

/// Error response body (RFC 6749 Section 5.2).
///
/// The description is fixed per error code and never carries internal
/// detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable description.
    pub error_description: String,
}

impl TokenErrorResponse {
    /// Builds the token endpoint error body for an internal error.
    #[must_use]
    pub fn from_auth_error(error: &AuthError) -> Self {
        Self::with_code(error.oauth_error_code())
    }

    /// Builds the resource-server error body for an internal error.
    #[must_use]
    pub fn from_bearer_error(error: &AuthError) -> Self {
        Self::with_code(error.bearer_error_code())
    }

    fn with_code(code: &str) -> Self {
        Self {
            error: code.to_string(),
            error_description: AuthError::public_description(code).to_string(),
        }
    }
}
