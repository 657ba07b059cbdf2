//! Resource-owner records.

/// A resource owner that can authenticate with the password grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable subject identifier placed in the token `sub` claim.
    pub id: String,

    /// Login name.
    pub username: String,

    /// Argon2 PHC hash of the password.
    pub password_hash: String,

    /// Inactive users cannot authenticate.
    pub active: bool,
}
