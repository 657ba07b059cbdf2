//! The authenticated principal handed to callers after a successful grant or
//! token verification.

use std::collections::BTreeSet;

use crate::token::TokenClaims;

/// An authenticated resource owner acting through a client.
///
/// Created per successful grant or verification and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Identifier of the resource owner (JWT `sub`).
    pub subject_id: String,

    /// Client the principal authenticated through.
    pub client_id: String,

    /// Granted scopes. Empty until the token issuer decides them.
    pub scopes: BTreeSet<String>,

    /// Resource servers the principal's token is bound to.
    pub resource_ids: BTreeSet<String>,
}

impl Principal {
    /// Creates a principal carrying only a subject, as returned by the
    /// credential verifier.
    #[must_use]
    pub fn subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            client_id: String::new(),
            scopes: BTreeSet::new(),
            resource_ids: BTreeSet::new(),
        }
    }

    /// Returns `true` if the principal was granted the given scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Returns `true` if the principal's token is bound to the given resource.
    #[must_use]
    pub fn has_resource(&self, resource_id: &str) -> bool {
        self.resource_ids.contains(resource_id)
    }

    /// Returns the granted scopes as a space-separated string.
    #[must_use]
    pub fn scope_string(&self) -> String {
        join_scopes(&self.scopes)
    }
}

impl From<&TokenClaims> for Principal {
    fn from(claims: &TokenClaims) -> Self {
        Self {
            subject_id: claims.sub.clone(),
            client_id: claims.client_id.clone(),
            scopes: claims.scopes(),
            resource_ids: claims.aud.iter().cloned().collect(),
        }
    }
}

/// Parses a space-separated scope string. Returns `None` when no scope is
/// present.
#[must_use]
pub fn parse_scopes(scope: Option<&str>) -> Option<BTreeSet<String>> {
    let scopes: BTreeSet<String> = scope?.split_whitespace().map(str::to_string).collect();
    if scopes.is_empty() { None } else { Some(scopes) }
}

/// Joins scopes into the space-separated wire form.
#[must_use]
pub fn join_scopes(scopes: &BTreeSet<String>) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}
