//! Introspection of the caller's own access token.
//!
//! `GET /auth/userinfo` returns what a resource server learns from a bearer
//! token: the subject, the client it was issued to, the granted scopes and
//! the resource ids it is bound to.

use axum::{Json, http::header, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::middleware::BearerAuth;
use crate::types::Principal;

/// Claims of the presented access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfoResponse {
    /// Subject identifier.
    pub sub: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Granted scopes, space-separated.
    pub scope: String,

    /// Resource ids the token is bound to.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub aud: Vec<String>,
}

impl From<&Principal> for UserInfoResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            sub: principal.subject_id.clone(),
            client_id: principal.client_id.clone(),
            scope: principal.scope_string(),
            aud: principal.resource_ids.iter().cloned().collect(),
        }
    }
}

/// Handler for `GET /auth/userinfo`.
pub async fn userinfo_handler(BearerAuth(principal): BearerAuth) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(UserInfoResponse::from(&principal)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_userinfo_from_principal() {
        let principal = Principal {
            subject_id: "user-1".to_string(),
            client_id: "c1".to_string(),
            scopes: ["write", "read"].iter().map(|s| s.to_string()).collect(),
            resource_ids: Default::default(),
        };

        let info = UserInfoResponse::from(&principal);
        assert_eq!(info.sub, "user-1");
        assert_eq!(info.scope, "read write");

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("aud").is_none());
    }
}
