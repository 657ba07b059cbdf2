//! HTTP surface of the token service.
//!
//! - [`token`] - `POST /auth/signin`, the token endpoint
//! - [`jwks`] - `GET /auth/jwks`, the public key set
//! - [`userinfo`] - `GET /auth/userinfo`, claims of the caller's access token

pub mod jwks;
pub mod token;
pub mod userinfo;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

pub use jwks::{JwksState, jwks_handler};
pub use token::{TokenState, token_handler};
pub use userinfo::{UserInfoResponse, userinfo_handler};

use crate::keys::KeyManager;
use crate::middleware::AuthState;
use crate::oauth::GrantHandler;
use crate::token::TokenVerifier;

/// Builds the router for the token, JWKS and userinfo endpoints.
pub fn router(
    grants: Arc<GrantHandler>,
    keys: Arc<KeyManager>,
    verifier: Arc<TokenVerifier>,
) -> Router {
    Router::new()
        .route(
            "/auth/signin",
            post(token_handler).with_state(TokenState::new(grants)),
        )
        .route(
            "/auth/jwks",
            get(jwks_handler).with_state(JwksState::new(keys)),
        )
        .route(
            "/auth/userinfo",
            get(userinfo_handler).with_state(AuthState::new(verifier)),
        )
}
