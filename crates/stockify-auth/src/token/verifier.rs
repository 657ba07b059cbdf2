//! Token verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. structural decode (`Malformed`)
//! 2. signature against the key named by `kid` (`BadSignature`)
//! 3. token kind (`WrongKind`)
//! 4. expiry (`Expired`)
//!
//! No claim is looked at before the signature has been verified. Access
//! tokens presented to a resource server are additionally checked for
//! resource binding and, on request, for a scope.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use super::claims::{TokenClaims, TokenKind};
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyManager;
use crate::types::Principal;

/// Parses and validates presented tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyManager>,
    resource_id: Option<String>,
    leeway: u64,
}

impl TokenVerifier {
    /// Creates a verifier with no resource binding and no clock skew.
    #[must_use]
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self {
            keys,
            resource_id: None,
            leeway: 0,
        }
    }

    /// Requires access tokens to be bound to this resource id.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Allows `seconds` of clock skew on the expiry check.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// Clock skew allowed on the expiry check, in seconds.
    #[must_use]
    pub fn leeway(&self) -> u64 {
        self.leeway
    }

    /// Verifies a token of the expected kind and returns its principal.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `BadSignature`, `WrongKind` or `Expired`.
    pub fn verify(&self, token: &str, expected: TokenKind) -> AuthResult<Principal> {
        self.verify_claims(token, expected)
            .map(|claims| Principal::from(&claims))
    }

    /// Verifies a token at the current time and returns its claims.
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify_claims_at`].
    pub fn verify_claims(&self, token: &str, expected: TokenKind) -> AuthResult<TokenClaims> {
        self.verify_claims_at(token, expected, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Verifies a token as of `now` (Unix seconds) and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `BadSignature`, `WrongKind` or `Expired`, in that
    /// order of precedence.
    pub fn verify_claims_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: i64,
    ) -> AuthResult<TokenClaims> {
        let claims = self.keys.decode::<TokenClaims>(token.trim())?.claims;

        if claims.token_kind != expected {
            debug!(
                jti = %claims.jti,
                expected = %expected,
                found = %claims.token_kind,
                "Token kind mismatch"
            );
            return Err(AuthError::wrong_kind(expected, claims.token_kind));
        }

        if claims.is_expired_at(now, self.leeway) {
            debug!(jti = %claims.jti, exp = claims.exp, now, "Token expired");
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Verifies an access token for a resource request.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`TokenVerifier::verify`] plus
    /// `ResourceMismatch` if the token is not bound to this resource server.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<Principal> {
        self.verify_access_token_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Verifies an access token for a resource request as of `now`.
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify_access_token`].
    pub fn verify_access_token_at(&self, token: &str, now: i64) -> AuthResult<Principal> {
        let claims = self.verify_claims_at(token, TokenKind::Access, now)?;
        let principal = Principal::from(&claims);

        if let Some(resource_id) = &self.resource_id
            && !principal.has_resource(resource_id)
        {
            debug!(jti = %claims.jti, resource_id = %resource_id, "Token not bound to resource");
            return Err(AuthError::ResourceMismatch {
                resource_id: resource_id.clone(),
            });
        }

        Ok(principal)
    }

    /// Verifies an access token and requires it to carry `scope`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`TokenVerifier::verify_access_token`] plus
    /// `InsufficientScope`.
    pub fn verify_access_token_with_scope(
        &self,
        token: &str,
        scope: &str,
    ) -> AuthResult<Principal> {
        let principal = self.verify_access_token(token)?;
        if !principal.has_scope(scope) {
            return Err(AuthError::InsufficientScope {
                required: scope.to_string(),
            });
        }
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    use crate::keys::SigningKeyPair;
    use crate::token::TokenIssuer;
    use crate::types::{ClientRegistration, GrantType};

    const NOW: i64 = 1_700_000_000;

    fn setup() -> (TokenIssuer, TokenVerifier) {
        let keys = Arc::new(KeyManager::new(
            SigningKeyPair::generate_ec().unwrap(),
            "https://issuer",
        ));
        (TokenIssuer::new(keys.clone()), TokenVerifier::new(keys))
    }

    fn client() -> ClientRegistration {
        ClientRegistration {
            client_id: "c1".to_string(),
            secret_hash: "unused".to_string(),
            allowed_grant_types: [GrantType::Password].into_iter().collect(),
            allowed_scopes: ["read", "write"].iter().map(|s| s.to_string()).collect(),
            resource_ids: ["inventory"].iter().map(|s| s.to_string()).collect(),
            access_token_ttl: Duration::from_secs(60),
            refresh_token_ttl: Duration::from_secs(600),
        }
    }

    fn issue(issuer: &TokenIssuer, kind: TokenKind) -> String {
        issuer
            .issue_at(&Principal::subject("alice"), &client(), None, kind, NOW)
            .unwrap()
            .token
    }

    #[test]
    fn test_verify_access_token() {
        let (issuer, verifier) = setup();
        let token = issue(&issuer, TokenKind::Access);

        let principal = verifier.verify_access_token_at(&token, NOW + 1).unwrap();
        assert_eq!(principal.subject_id, "alice");
        assert_eq!(principal.client_id, "c1");
        assert_eq!(
            principal.scopes,
            ["read", "write"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_valid_until_expiry() {
        let (issuer, verifier) = setup();
        let token = issue(&issuer, TokenKind::Access);

        assert!(verifier.verify_claims_at(&token, TokenKind::Access, NOW + 59).is_ok());
        assert!(matches!(
            verifier.verify_claims_at(&token, TokenKind::Access, NOW + 60),
            Err(AuthError::Expired)
        ));

        let lenient = verifier.clone().with_leeway(30);
        assert!(lenient.verify_claims_at(&token, TokenKind::Access, NOW + 89).is_ok());
    }

    #[test]
    fn test_wrong_kind_checked_before_expiry() {
        let (issuer, verifier) = setup();
        let refresh = issue(&issuer, TokenKind::Refresh);

        let err = verifier
            .verify_claims_at(&refresh, TokenKind::Access, NOW + 100_000)
            .unwrap_err();
        assert!(matches!(err, AuthError::WrongKind { .. }));
    }

    #[test]
    fn test_bad_signature_checked_before_kind() {
        let (issuer, _) = setup();
        let (_, other_verifier) = setup();
        let refresh = issue(&issuer, TokenKind::Refresh);

        assert!(matches!(
            other_verifier.verify_claims_at(&refresh, TokenKind::Access, NOW),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn test_resource_binding() {
        let (issuer, verifier) = setup();
        let token = issue(&issuer, TokenKind::Access);

        let bound = verifier.clone().with_resource_id("inventory");
        assert!(bound.verify_access_token_at(&token, NOW).is_ok());

        let elsewhere = verifier.with_resource_id("billing");
        assert!(matches!(
            elsewhere.verify_access_token_at(&token, NOW),
            Err(AuthError::ResourceMismatch { .. })
        ));
    }

    #[test]
    fn test_required_scope() {
        let (issuer, verifier) = setup();
        let token = issuer
            .issue(
                &Principal::subject("alice"),
                &client(),
                Some(&["read".to_string()].into_iter().collect()),
                TokenKind::Access,
            )
            .unwrap()
            .token;

        assert!(verifier.verify_access_token_with_scope(&token, "read").is_ok());
        assert!(matches!(
            verifier.verify_access_token_with_scope(&token, "write"),
            Err(AuthError::InsufficientScope { .. })
        ));
    }
}
