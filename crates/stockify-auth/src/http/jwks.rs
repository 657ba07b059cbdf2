//! JWKS endpoint handler.
//!
//! Publishes the public halves of the signing keys so resource servers can
//! verify access tokens on their own.
//!
//! # References
//!
//! - [RFC 7517 - JSON Web Key](https://tools.ietf.org/html/rfc7517)

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::keys::KeyManager;

/// State for the JWKS endpoint.
#[derive(Clone)]
pub struct JwksState {
    /// Signing and verification keys.
    pub keys: Arc<KeyManager>,
}

impl JwksState {
    /// Creates a new JWKS state.
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }
}

/// Handler for `GET /auth/jwks`.
///
/// The active key comes first, followed by keys that are only kept for
/// verification.
///
/// # Example Response
///
/// ```json
/// {
///   "keys": [
///     {
///       "kty": "RSA",
///       "kid": "stockify",
///       "use": "sig",
///       "alg": "RS256",
///       "n": "base64url-encoded-modulus",
///       "e": "AQAB"
///     }
///   ]
/// }
/// ```
pub async fn jwks_handler(State(state): State<JwksState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Json(state.keys.jwks()),
    )
}
