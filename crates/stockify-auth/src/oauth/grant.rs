//! Grant handling for the password and refresh_token flows.
//!
//! A request moves through these states:
//!
//! ```text
//! ReceivedRequest -> ClientAuthenticated -> CredentialOrTokenVerified -> TokenIssued
//! ```
//!
//! Any step can fail instead, which aborts the request. Tokens are only
//! signed in the last step, so a failed or cancelled request never leaves a
//! usable token behind.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::credentials::CredentialVerifier;
use super::token::{ClientCredentials, TokenRequest, TokenResponse};
use crate::config::RefreshTokenPolicy;
use crate::error::{AuthError, AuthResult};
use crate::password::verify_dummy_async;
use crate::storage::{ClientRegistry, RevocationStore};
use crate::token::{TokenIssuer, TokenKind, TokenVerifier};
use crate::types::{ClientRegistration, GrantType, Principal, parse_scopes};

// =============================================================================
// Request parsing
// =============================================================================

/// A token request narrowed to one supported grant.
#[derive(Clone, PartialEq, Eq)]
pub enum GrantRequest {
    /// Resource Owner Password Credentials grant.
    Password {
        /// Login name.
        username: String,
        /// Password.
        password: String,
        /// Requested scopes, if any.
        scopes: Option<BTreeSet<String>>,
    },
    /// Refresh Token grant.
    RefreshToken {
        /// The presented refresh token.
        refresh_token: String,
        /// Requested scopes, if any.
        scopes: Option<BTreeSet<String>>,
    },
}

impl fmt::Debug for GrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password {
                username, scopes, ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("scopes", scopes)
                .finish_non_exhaustive(),
            Self::RefreshToken { scopes, .. } => f
                .debug_struct("RefreshToken")
                .field("scopes", scopes)
                .finish_non_exhaustive(),
        }
    }
}

impl GrantRequest {
    /// Parses the grant-specific fields of a token request.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnsupportedGrantType`] for any grant other than
    ///   `password` and `refresh_token`
    /// - [`AuthError::InvalidRequest`] if a required field is missing
    pub fn parse(request: &TokenRequest) -> AuthResult<Self> {
        let grant_type = request
            .grant_type
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| AuthError::invalid_request("missing grant_type"))?;

        let grant_type: GrantType = grant_type
            .parse()
            .map_err(AuthError::unsupported_grant_type)?;
        let scopes = parse_scopes(request.scope.as_deref());

        match grant_type {
            GrantType::Password => Ok(Self::Password {
                username: required(&request.username, "username")?,
                password: required(&request.password, "password")?,
                scopes,
            }),
            GrantType::RefreshToken => Ok(Self::RefreshToken {
                refresh_token: required(&request.refresh_token, "refresh_token")?,
                scopes,
            }),
        }
    }

    /// Returns the grant type.
    #[must_use]
    pub fn grant_type(&self) -> GrantType {
        match self {
            Self::Password { .. } => GrantType::Password,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

fn required(value: &Option<String>, name: &str) -> AuthResult<String> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| AuthError::invalid_request(format!("missing {name}")))
}

// =============================================================================
// Grant state
// =============================================================================

/// Progress of a grant request through the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    /// The request arrived; nothing is verified yet.
    ReceivedRequest,
    /// The client is known, its secret matched and it may use the grant.
    ClientAuthenticated,
    /// Resource-owner credentials or the refresh token checked out.
    CredentialOrTokenVerified,
    /// Tokens were signed.
    TokenIssued,
}

impl GrantState {
    /// Returns the state name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceivedRequest => "received_request",
            Self::ClientAuthenticated => "client_authenticated",
            Self::CredentialOrTokenVerified => "credential_or_token_verified",
            Self::TokenIssued => "token_issued",
        }
    }
}

impl fmt::Display for GrantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Grant handler
// =============================================================================

/// Orchestrates the password and refresh_token grants.
///
/// All collaborators are passed in explicitly; the handler is cheap to share
/// behind an `Arc`.
pub struct GrantHandler {
    clients: Arc<dyn ClientRegistry>,
    credentials: CredentialVerifier,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    revocation: Arc<dyn RevocationStore>,
    policy: RefreshTokenPolicy,
}

impl GrantHandler {
    /// Creates a grant handler.
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        credentials: CredentialVerifier,
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        revocation: Arc<dyn RevocationStore>,
        policy: RefreshTokenPolicy,
    ) -> Self {
        Self {
            clients,
            credentials,
            issuer,
            verifier,
            revocation,
            policy,
        }
    }

    /// Returns the refresh token policy.
    #[must_use]
    pub fn policy(&self) -> RefreshTokenPolicy {
        self.policy
    }

    /// Handles a token request at the current time.
    ///
    /// # Errors
    ///
    /// See [`GrantHandler::handle_at`].
    pub async fn handle(
        &self,
        request: &TokenRequest,
        client: Option<ClientCredentials>,
    ) -> AuthResult<TokenResponse> {
        self.handle_at(request, client, OffsetDateTime::now_utc().unix_timestamp())
            .await
    }

    /// Handles a token request as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered. No tokens are returned on
    /// failure.
    pub async fn handle_at(
        &self,
        request: &TokenRequest,
        client: Option<ClientCredentials>,
        now: i64,
    ) -> AuthResult<TokenResponse> {
        let client_id = client.as_ref().map(|c| c.client_id.clone());
        let mut state = GrantState::ReceivedRequest;

        let result = self.run(request, client, now, &mut state).await;

        match &result {
            Ok(response) => info!(
                client_id = ?client_id,
                scope = %response.scope,
                state = %state,
                "Token issued"
            ),
            Err(e) if e.is_server_error() => warn!(
                client_id = ?client_id,
                reached = %state,
                category = %e.category(),
                error = %e,
                "Grant failed"
            ),
            Err(e) => debug!(
                client_id = ?client_id,
                reached = %state,
                category = %e.category(),
                error = %e,
                "Grant rejected"
            ),
        }

        result
    }

    async fn run(
        &self,
        request: &TokenRequest,
        client: Option<ClientCredentials>,
        now: i64,
        state: &mut GrantState,
    ) -> AuthResult<TokenResponse> {
        let grant = GrantRequest::parse(request)?;

        let client = self.authenticate_client(client).await?;
        if !client.is_grant_type_allowed(grant.grant_type()) {
            return Err(AuthError::unauthorized_client(format!(
                "client '{}' may not use grant type {}",
                client.client_id,
                grant.grant_type()
            )));
        }
        *state = GrantState::ClientAuthenticated;

        let (principal, scopes) = match grant {
            GrantRequest::Password {
                username,
                password,
                scopes,
            } => {
                let principal = self.credentials.verify(&username, &password).await?;
                (principal, scopes)
            }
            GrantRequest::RefreshToken {
                refresh_token,
                scopes,
            } => self.redeem_refresh_token(&refresh_token, &client, scopes, now).await?,
        };
        *state = GrantState::CredentialOrTokenVerified;

        let pair = self
            .issuer
            .issue_pair_at(&principal, &client, scopes.as_ref(), now)?;
        *state = GrantState::TokenIssued;

        Ok(TokenResponse::from(pair))
    }

    /// Looks up the client and checks its secret.
    ///
    /// Missing credentials, an unknown client and a wrong secret all yield
    /// the same [`AuthError::InvalidClient`].
    async fn authenticate_client(
        &self,
        credentials: Option<ClientCredentials>,
    ) -> AuthResult<ClientRegistration> {
        let Some(credentials) = credentials else {
            verify_dummy_async("").await;
            return Err(AuthError::InvalidClient);
        };

        let verified = self
            .clients
            .verify_secret(&credentials.client_id, &credentials.client_secret)
            .await?;
        if !verified {
            return Err(AuthError::InvalidClient);
        }

        self.clients
            .lookup(&credentials.client_id)
            .await?
            .ok_or(AuthError::InvalidClient)
    }

    /// Verifies a refresh token for `client` and decides the scopes of the
    /// new tokens. Under the rotate policy the token is consumed.
    async fn redeem_refresh_token(
        &self,
        refresh_token: &str,
        client: &ClientRegistration,
        requested: Option<BTreeSet<String>>,
        now: i64,
    ) -> AuthResult<(Principal, Option<BTreeSet<String>>)> {
        let claims = self
            .verifier
            .verify_claims_at(refresh_token, TokenKind::Refresh, now)?;

        if claims.client_id != client.client_id {
            debug!(
                jti = %claims.jti,
                token_client = %claims.client_id,
                client_id = %client.client_id,
                "Refresh token presented by another client"
            );
            return Err(AuthError::ClientMismatch);
        }

        let original = claims.scopes();
        let scopes = match requested {
            Some(requested) if !requested.is_subset(&original) => {
                return Err(AuthError::scope_denied(
                    "requested scope exceeds the refresh token's scope",
                ));
            }
            Some(requested) => requested,
            None => original,
        };

        // The used entry must outlive every instant the verifier still
        // accepts the token, leeway included.
        let accepted_until = claims.accepted_until(self.verifier.leeway());
        if self.policy == RefreshTokenPolicy::Rotate
            && !self.revocation.mark_used(&claims.jti, accepted_until).await?
        {
            warn!(
                jti = %claims.jti,
                client_id = %client.client_id,
                "Refresh token replayed"
            );
            return Err(AuthError::TokenReused);
        }

        Ok((Principal::from(&claims), Some(scopes)))
    }
}
