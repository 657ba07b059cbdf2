//! Token issuance.
//!
//! The issuer decides the granted scopes, stamps the lifetimes from the
//! client registration and signs the result with the active key.

use std::collections::BTreeSet;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use super::claims::{TokenClaims, TokenKind};
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyManager;
use crate::types::{ClientRegistration, Principal, join_scopes};

/// A signed token together with the facts the response needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    /// The compact JWT.
    pub token: String,

    /// Access or refresh.
    pub kind: TokenKind,

    /// Unique token id.
    pub jti: String,

    /// Granted scopes.
    pub scopes: BTreeSet<String>,

    /// Issued at (Unix timestamp).
    pub issued_at: i64,

    /// Expires at (Unix timestamp).
    pub expires_at: i64,
}

impl SignedToken {
    /// Seconds between issuance and expiry.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        u64::try_from(self.expires_at - self.issued_at).unwrap_or(0)
    }
}

/// An access token and its companion refresh token.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// The access token.
    pub access: SignedToken,
    /// The refresh token.
    pub refresh: SignedToken,
}

/// Builds and signs tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyManager>,
}

impl TokenIssuer {
    /// Creates an issuer signing with the given key manager.
    #[must_use]
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Issues a token at the current time.
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::issue_at`].
    pub fn issue(
        &self,
        principal: &Principal,
        client: &ClientRegistration,
        requested_scopes: Option<&BTreeSet<String>>,
        kind: TokenKind,
    ) -> AuthResult<SignedToken> {
        self.issue_at(
            principal,
            client,
            requested_scopes,
            kind,
            OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    /// Issues a token as of `now` (Unix seconds).
    ///
    /// Requested scopes are intersected with the client's allowed scopes.
    /// Without a request, all allowed scopes are granted. The token is bound
    /// to every resource id of the client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ScopeDenied`] if no requested scope is allowed.
    pub fn issue_at(
        &self,
        principal: &Principal,
        client: &ClientRegistration,
        requested_scopes: Option<&BTreeSet<String>>,
        kind: TokenKind,
        now: i64,
    ) -> AuthResult<SignedToken> {
        let scopes = grant_scopes(client, requested_scopes)?;
        let expires_at = now.saturating_add(client.ttl_seconds(kind));

        let claims = TokenClaims {
            iss: self.keys.issuer().to_string(),
            sub: principal.subject_id.clone(),
            aud: client.resource_ids.iter().cloned().collect(),
            exp: expires_at,
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
            scope: join_scopes(&scopes),
            client_id: client.client_id.clone(),
            token_kind: kind,
        };

        let token = self.keys.encode(&claims)?;

        debug!(
            jti = %claims.jti,
            kind = %kind,
            client_id = %claims.client_id,
            sub = %claims.sub,
            scope = %claims.scope,
            "Issued token"
        );

        Ok(SignedToken {
            token,
            kind,
            jti: claims.jti,
            scopes,
            issued_at: now,
            expires_at,
        })
    }

    /// Issues an access token and a refresh token with identical scopes and
    /// issuance time.
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::issue_at`].
    pub fn issue_pair_at(
        &self,
        principal: &Principal,
        client: &ClientRegistration,
        requested_scopes: Option<&BTreeSet<String>>,
        now: i64,
    ) -> AuthResult<TokenPair> {
        let access = self.issue_at(principal, client, requested_scopes, TokenKind::Access, now)?;
        let refresh = self.issue_at(
            principal,
            client,
            Some(&access.scopes),
            TokenKind::Refresh,
            now,
        )?;
        Ok(TokenPair { access, refresh })
    }
}

/// Intersects requested scopes with the client's allowed set.
fn grant_scopes(
    client: &ClientRegistration,
    requested: Option<&BTreeSet<String>>,
) -> AuthResult<BTreeSet<String>> {
    let granted: BTreeSet<String> = match requested {
        Some(requested) if !requested.is_empty() => requested
            .intersection(&client.allowed_scopes)
            .cloned()
            .collect(),
        _ => client.allowed_scopes.clone(),
    };

    if granted.is_empty() {
        return Err(AuthError::scope_denied(format!(
            "none of the requested scopes are allowed for client '{}'",
            client.client_id
        )));
    }
    Ok(granted)
}
