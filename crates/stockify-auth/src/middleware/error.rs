//! Error responses for bearer-protected resources.
//!
//! Implements `IntoResponse` for `AuthError` using the resource-server
//! mapping of RFC 6750: token failures become `invalid_token` with a
//! `WWW-Authenticate: Bearer` challenge.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::oauth::token::TokenErrorResponse;

const REALM: &str = "stockify";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.bearer_http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = TokenErrorResponse::from_bearer_error(&self);

        let mut headers = HeaderMap::new();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let challenge = build_www_authenticate_header(&self, &body);
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Builds the `WWW-Authenticate` value (RFC 6750 Section 3).
fn build_www_authenticate_header(error: &AuthError, body: &TokenErrorResponse) -> String {
    let mut challenge = format!(
        "Bearer realm=\"{REALM}\", error=\"{}\", error_description=\"{}\"",
        body.error, body.error_description
    );
    if let AuthError::InsufficientScope { required } = error {
        challenge.push_str(&format!(", scope=\"{required}\""));
    }
    challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(response: &Response) -> String {
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_expired_token_response() {
        let response = AuthError::Expired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = challenge(&response);
        assert!(www_auth.starts_with("Bearer realm=\"stockify\""));
        assert!(www_auth.contains("error=\"invalid_token\""));
    }

    #[test]
    fn test_failures_share_one_shape() {
        let expired = challenge(&AuthError::Expired.into_response());
        let tampered = challenge(&AuthError::BadSignature.into_response());
        let wrong_kind = challenge(&AuthError::wrong_kind("access", "refresh").into_response());
        assert_eq!(expired, tampered);
        assert_eq!(expired, wrong_kind);
    }

    #[test]
    fn test_insufficient_scope_response() {
        let response = AuthError::InsufficientScope {
            required: "write".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let www_auth = challenge(&response);
        assert!(www_auth.contains("error=\"insufficient_scope\""));
        assert!(www_auth.contains("scope=\"write\""));
    }

    #[test]
    fn test_server_error_has_no_challenge() {
        let response = AuthError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
