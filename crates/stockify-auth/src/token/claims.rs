//! JWT claim set shared by access and refresh tokens.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Distinguishes access tokens from refresh tokens.
///
/// Each kind is rejected wherever the other is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived token presented to resource servers.
    Access,
    /// Longer-lived token redeemed at the token endpoint.
    Refresh,
}

impl TokenKind {
    /// Returns the claim value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every token this server issues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject (resource owner id).
    pub sub: String,

    /// Audience: the resource ids the token is bound to.
    #[serde(default)]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Unique token identifier.
    pub jti: String,

    /// Space-separated scopes.
    pub scope: String,

    /// OAuth client id.
    pub client_id: String,

    /// Access or refresh.
    pub token_kind: TokenKind,
}

impl TokenClaims {
    /// Returns the scopes as a set.
    #[must_use]
    pub fn scopes(&self) -> BTreeSet<String> {
        self.scope.split_whitespace().map(str::to_string).collect()
    }

    /// Returns `true` if the token is expired at `now`, allowing `leeway`
    /// seconds of clock skew.
    #[must_use]
    pub fn is_expired_at(&self, now: i64, leeway: u64) -> bool {
        now >= self.accepted_until(leeway)
    }

    /// First instant (Unix seconds) at which the token is rejected as
    /// expired under `leeway` seconds of clock skew.
    #[must_use]
    pub fn accepted_until(&self, leeway: u64) -> i64 {
        let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);
        self.exp.saturating_add(leeway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> TokenClaims {
        TokenClaims {
            iss: "https://issuer".to_string(),
            sub: "alice".to_string(),
            aud: vec!["inventory".to_string()],
            exp: 1_000,
            iat: 0,
            jti: "jti-1".to_string(),
            scope: "read write".to_string(),
            client_id: "c1".to_string(),
            token_kind: TokenKind::Refresh,
        }
    }

    #[test]
    fn test_token_kind_serialization() {
        let json = serde_json::to_string(&claims()).unwrap();
        assert!(json.contains("\"token_kind\":\"refresh\""));
        assert!(json.contains("\"aud\":[\"inventory\"]"));
    }

    #[test]
    fn test_scopes() {
        let scopes = claims().scopes();
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains("write"));
    }

    #[test]
    fn test_expiry_boundary() {
        let claims = claims();
        assert!(!claims.is_expired_at(999, 0));
        assert!(claims.is_expired_at(1_000, 0));
        assert!(!claims.is_expired_at(1_000, 5));
        assert!(claims.is_expired_at(1_005, 5));
    }

    #[test]
    fn test_accepted_until_includes_leeway() {
        let claims = claims();
        assert_eq!(claims.accepted_until(0), 1_000);
        assert_eq!(claims.accepted_until(60), 1_060);
        assert_eq!(claims.accepted_until(u64::MAX), i64::MAX);
    }
}
