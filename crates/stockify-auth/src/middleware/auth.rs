//! Bearer token authentication extractors.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use stockify_auth::middleware::{AuthState, BearerAuth};
//!
//! async fn protected_handler(BearerAuth(principal): BearerAuth) -> String {
//!     format!("Hello, {}!", principal.subject_id)
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .with_state(AuthState::new(verifier));
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AuthError;
use crate::token::TokenVerifier;
use crate::types::Principal;

// =============================================================================
// Auth State
// =============================================================================

/// State required for bearer token authentication.
///
/// Include it in the application state and expose it to the extractors via
/// `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    /// Access token verifier, configured with this server's resource id.
    pub verifier: Arc<TokenVerifier>,
}

impl AuthState {
    /// Creates a new auth state.
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

// =============================================================================
// Bearer Auth Extractor
// =============================================================================

/// Axum extractor that validates an `Authorization: Bearer` access token.
///
/// Rejects with an [`AuthError`], which renders as an RFC 6750 error.
pub struct BearerAuth(pub Principal);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token =
            bearer_token(parts).ok_or_else(|| AuthError::malformed("missing bearer token"))?;

        let principal = auth_state.verifier.verify_access_token(token)?;

        tracing::debug!(
            client_id = %principal.client_id,
            subject = %principal.subject_id,
            "Token validated"
        );

        Ok(BearerAuth(principal))
    }
}

// =============================================================================
// Optional Bearer Auth Extractor
// =============================================================================

/// Like [`BearerAuth`], but yields `None` when no `Authorization` header is
/// present. A present but invalid token is still rejected.
pub struct OptionalBearerAuth(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalBearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(OptionalBearerAuth(None));
        }

        let BearerAuth(principal) = BearerAuth::from_request_parts(parts, state).await?;
        Ok(OptionalBearerAuth(Some(principal)))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    use crate::keys::{KeyManager, SigningKeyPair};
    use crate::token::{TokenIssuer, TokenKind};
    use crate::types::{ClientRegistration, GrantType};

    fn setup() -> (TokenIssuer, AuthState) {
        let keys = Arc::new(KeyManager::new(
            SigningKeyPair::generate_ec().unwrap(),
            "https://issuer",
        ));
        let verifier = TokenVerifier::new(keys.clone()).with_resource_id("inventory");
        (TokenIssuer::new(keys), AuthState::new(Arc::new(verifier)))
    }

    fn client() -> ClientRegistration {
        ClientRegistration {
            client_id: "c1".to_string(),
            secret_hash: "unused".to_string(),
            allowed_grant_types: [GrantType::Password].into_iter().collect(),
            allowed_scopes: ["read".to_string()].into_iter().collect(),
            resource_ids: ["inventory".to_string()].into_iter().collect(),
            access_token_ttl: std::time::Duration::from_secs(60),
            refresh_token_ttl: std::time::Duration::from_secs(600),
        }
    }

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/items");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn issue(issuer: &TokenIssuer, kind: TokenKind) -> String {
        issuer
            .issue(&Principal::subject("alice"), &client(), None, kind)
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn test_bearer_auth_accepts_access_token() {
        let (issuer, state) = setup();
        let token = issue(&issuer, TokenKind::Access);

        let mut parts = parts(Some(&format!("Bearer {token}")));
        let BearerAuth(principal) = BearerAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(principal.subject_id, "alice");
        assert!(principal.has_scope("read"));
    }

    #[tokio::test]
    async fn test_bearer_auth_rejects_refresh_token() {
        let (issuer, state) = setup();
        let token = issue(&issuer, TokenKind::Refresh);

        let mut parts = parts(Some(&format!("Bearer {token}")));
        let err = BearerAuth::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::WrongKind { .. }));
    }

    #[tokio::test]
    async fn test_bearer_auth_missing_header() {
        let (_, state) = setup();

        let err = BearerAuth::from_request_parts(&mut parts(None), &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Malformed { .. }));

        let err = BearerAuth::from_request_parts(&mut parts(Some("Basic abc")), &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_optional_bearer_auth() {
        let (_, state) = setup();

        let OptionalBearerAuth(principal) =
            OptionalBearerAuth::from_request_parts(&mut parts(None), &state)
                .await
                .unwrap();
        assert!(principal.is_none());

        let result =
            OptionalBearerAuth::from_request_parts(&mut parts(Some("Bearer garbage")), &state)
                .await;
        assert!(result.is_err());
    }
}
