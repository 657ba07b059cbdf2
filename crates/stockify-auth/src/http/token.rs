//! Token endpoint handler.
//!
//! Serves `POST /auth/signin` for the `password` and `refresh_token` grants.
//!
//! ```text
//! POST /auth/signin
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=refresh_token&refresh_token=eyJhbG...
//! ```

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use tracing::debug;

use crate::error::AuthError;
use crate::oauth::grant::GrantHandler;
use crate::oauth::token::{ClientCredentials, TokenErrorResponse, TokenRequest, TokenResponse};

/// State required for the token endpoint.
#[derive(Clone)]
pub struct TokenState {
    /// Grant orchestration.
    pub grants: Arc<GrantHandler>,
}

impl TokenState {
    /// Creates a new token state.
    pub fn new(grants: Arc<GrantHandler>) -> Self {
        Self { grants }
    }
}

/// Handler for `POST /auth/signin`.
///
/// Client credentials are read from HTTP Basic first and from the
/// `client_id`/`client_secret` body parameters otherwise.
pub async fn token_handler(
    State(state): State<TokenState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected token request body");
            return token_error_response(&AuthError::invalid_request(rejection.body_text()));
        }
    };

    debug!(
        grant_type = ?request.grant_type,
        client_id = ?request.client_id,
        "Processing token request"
    );

    let credentials = extract_client_credentials(&headers, &request);

    match state.grants.handle(&request, credentials).await {
        Ok(response) => token_success_response(response),
        Err(e) => token_error_response(&e),
    }
}

/// Extracts client credentials from the `Authorization` header or the body.
fn extract_client_credentials(
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Option<ClientCredentials> {
    if let Some(credentials) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(decode_basic)
    {
        return Some(credentials);
    }

    match (request.client_id.as_ref(), request.client_secret.as_ref()) {
        (Some(client_id), Some(client_secret)) => Some(ClientCredentials {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        }),
        _ => None,
    }
}

fn decode_basic(encoded: &str) -> Option<ClientCredentials> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = decoded.split_once(':')?;
    Some(ClientCredentials {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
    })
}

fn token_success_response(response: TokenResponse) -> Response {
    (
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    )
        .into_response()
}

fn token_error_response(error: &AuthError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (
        status,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(TokenErrorResponse::from_auth_error(error)),
    )
        .into_response();

    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"stockify\""),
        );
    }

    response
}
