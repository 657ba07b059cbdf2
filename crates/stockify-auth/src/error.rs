//! Authentication and authorization error types.
//!
//! This module defines the internal error taxonomy of the token engine and
//! how it collapses into the small set of codes that is visible to callers.
//! Internal variants stay precise so they can be logged; the external code and
//! description never reveal which check failed.

use std::fmt;

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while issuing or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `grant_type` parameter names a flow this server does not implement.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The rejected grant type.
        grant_type: String,
    },

    /// Client authentication failed (unknown client or bad secret).
    #[error("Invalid client")]
    InvalidClient,

    /// The authenticated client may not use the requested grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of the restriction.
        message: String,
    },

    /// Resource-owner credentials were rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// None of the requested scopes may be granted to this client.
    #[error("Scope denied: {message}")]
    ScopeDenied {
        /// Description of why the scope was denied.
        message: String,
    },

    /// The request is missing a parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what is wrong with the request.
        message: String,
    },

    /// The presented token could not be parsed.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Parser detail, for logs only.
        message: String,
    },

    /// The token signature does not verify under any known key.
    #[error("Bad token signature")]
    BadSignature,

    /// The token kind does not match what the calling context expects.
    #[error("Wrong token kind: expected {expected}, found {found}")]
    WrongKind {
        /// Kind the caller asked for.
        expected: String,
        /// Kind embedded in the token.
        found: String,
    },

    /// The token is past its `exp` claim.
    #[error("Token expired")]
    Expired,

    /// The refresh token was issued to a different client.
    #[error("Token issued to a different client")]
    ClientMismatch,

    /// A single-use refresh token was presented a second time.
    #[error("Token already used")]
    TokenReused,

    /// The token is not bound to this resource server.
    #[error("Token not valid for resource {resource_id}")]
    ResourceMismatch {
        /// The resource id the verifier is configured for.
        resource_id: String,
    },

    /// The token lacks a scope required by the endpoint.
    #[error("Insufficient scope: {required}")]
    InsufficientScope {
        /// The scope that was required.
        required: String,
    },

    /// Signing key material could not be loaded. Fatal at startup.
    #[error("Key load error: {message}")]
    KeyLoad {
        /// Description of the key loading failure.
        message: String,
    },

    /// The revocation store did not answer in time. Retryable.
    #[error("Transient store error: {message}")]
    TransientStore {
        /// Description of the store failure.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `ScopeDenied` error.
    #[must_use]
    pub fn scope_denied(message: impl Into<String>) -> Self {
        Self::ScopeDenied {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `WrongKind` error.
    #[must_use]
    pub fn wrong_kind(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::WrongKind {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a new `KeyLoad` error.
    #[must_use]
    pub fn key_load(message: impl Into<String>) -> Self {
        Self::KeyLoad {
            message: message.into(),
        }
    }

    /// Creates a new `TransientStore` error.
    #[must_use]
    pub fn transient_store(message: impl Into<String>) -> Self {
        Self::TransientStore {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::KeyLoad { .. }
                | Self::TransientStore { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if the caller may retry the same request later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }

    /// Returns `true` if this error came out of token verification.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. }
                | Self::BadSignature
                | Self::WrongKind { .. }
                | Self::Expired
                | Self::ClientMismatch
                | Self::TokenReused
                | Self::ResourceMismatch { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient | Self::InvalidCredentials => ErrorCategory::Authentication,
            Self::UnauthorizedClient { .. }
            | Self::ScopeDenied { .. }
            | Self::InsufficientScope { .. } => ErrorCategory::Authorization,
            Self::Malformed { .. }
            | Self::BadSignature
            | Self::WrongKind { .. }
            | Self::Expired
            | Self::ClientMismatch
            | Self::TokenReused
            | Self::ResourceMismatch { .. } => ErrorCategory::Token,
            Self::UnsupportedGrantType { .. } | Self::InvalidRequest { .. } => {
                ErrorCategory::Validation
            }
            Self::TransientStore { .. } => ErrorCategory::Infrastructure,
            Self::KeyLoad { .. } | Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the externally visible OAuth 2.0 error code for a token
    /// endpoint response.
    ///
    /// Token verification failures all collapse to `invalid_grant`, the same
    /// code used for rejected resource-owner credentials.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidClient => "invalid_client",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::ScopeDenied { .. } => "invalid_scope",
            Self::InvalidCredentials
            | Self::Malformed { .. }
            | Self::BadSignature
            | Self::WrongKind { .. }
            | Self::Expired
            | Self::ClientMismatch
            | Self::TokenReused
            | Self::ResourceMismatch { .. } => "invalid_grant",
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::TransientStore { .. } => "temporarily_unavailable",
            Self::KeyLoad { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// Returns the externally visible error code for a protected resource
    /// request (RFC 6750).
    #[must_use]
    pub fn bearer_error_code(&self) -> &'static str {
        match self {
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::TransientStore { .. } => "temporarily_unavailable",
            e if e.is_server_error() => "server_error",
            _ => "invalid_token",
        }
    }

    /// Returns a fixed, non-revealing description for an external error code.
    #[must_use]
    pub fn public_description(code: &str) -> &'static str {
        match code {
            "unsupported_grant_type" => "The grant type is not supported",
            "invalid_client" => "Client authentication failed",
            "unauthorized_client" => "The client is not authorized to use this grant type",
            "invalid_request" => "The request is missing a required parameter or is malformed",
            "invalid_scope" => "The requested scope is not allowed",
            "invalid_grant" => "The provided credentials or token are invalid",
            "invalid_token" => "The access token is invalid",
            "insufficient_scope" => "The access token lacks the required scope",
            "temporarily_unavailable" => "The server is temporarily unavailable, retry later",
            _ => "The server encountered an unexpected error",
        }
    }

    /// Returns the HTTP status for the token endpoint.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::TransientStore { .. } => 503,
            e if e.is_server_error() => 500,
            _ => 400,
        }
    }

    /// Returns the HTTP status for a protected resource request.
    #[must_use]
    pub fn bearer_http_status(&self) -> u16 {
        match self {
            Self::InsufficientScope { .. } => 403,
            Self::InvalidRequest { .. } => 400,
            Self::TransientStore { .. } => 503,
            e if e.is_server_error() => 500,
            _ => 401,
        }
    }
}

/// Categories of authentication/authorization errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification failed.
    Authentication,
    /// Permission checks failed.
    Authorization,
    /// Token validation failed.
    Token,
    /// Request validation failed.
    Validation,
    /// A backing store failed.
    Infrastructure,
    /// Startup or configuration failure.
    Configuration,
    /// Internal server error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::unsupported_grant_type("implicit");
        assert_eq!(err.to_string(), "Unsupported grant type: implicit");

        let err = AuthError::wrong_kind("access", "refresh");
        assert_eq!(
            err.to_string(),
            "Wrong token kind: expected access, found refresh"
        );

        assert_eq!(AuthError::Expired.to_string(), "Token expired");
        assert_eq!(AuthError::InvalidClient.to_string(), "Invalid client");
    }

    #[test]
    fn test_verification_failures_collapse() {
        let errors = [
            AuthError::InvalidCredentials,
            AuthError::malformed("bad base64"),
            AuthError::BadSignature,
            AuthError::wrong_kind("refresh", "access"),
            AuthError::Expired,
            AuthError::ClientMismatch,
            AuthError::TokenReused,
        ];
        for err in errors {
            assert_eq!(err.oauth_error_code(), "invalid_grant", "{err}");
            assert_eq!(err.bearer_error_code(), "invalid_token", "{err}");
            assert_eq!(err.http_status(), 400);
        }
    }

    #[test]
    fn test_error_predicates() {
        assert!(AuthError::InvalidClient.is_client_error());
        assert!(!AuthError::InvalidClient.is_server_error());

        let err = AuthError::transient_store("timeout");
        assert!(err.is_server_error());
        assert!(err.is_retryable());
        assert_eq!(err.http_status(), 503);
        assert_eq!(err.oauth_error_code(), "temporarily_unavailable");

        assert!(AuthError::BadSignature.is_token_error());
        assert!(!AuthError::InvalidCredentials.is_token_error());
        assert!(!AuthError::key_load("missing").is_retryable());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::InvalidClient.category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            AuthError::scope_denied("admin").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(AuthError::Expired.category(), ErrorCategory::Token);
        assert_eq!(
            AuthError::transient_store("test").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            AuthError::key_load("test").category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::InvalidClient.http_status(), 401);
        assert_eq!(AuthError::scope_denied("x").http_status(), 400);
        assert_eq!(AuthError::internal("x").http_status(), 500);
        assert_eq!(AuthError::Expired.bearer_http_status(), 401);
        assert_eq!(
            AuthError::InsufficientScope {
                required: "write".to_string()
            }
            .bearer_http_status(),
            403
        );
    }

    #[test]
    fn test_public_description_is_fixed() {
        let unknown = AuthError::InvalidClient;
        let code = unknown.oauth_error_code();
        assert_eq!(
            AuthError::public_description(code),
            "Client authentication failed"
        );
        assert_eq!(
            AuthError::public_description("anything-else"),
            "The server encountered an unexpected error"
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
        assert_eq!(ErrorCategory::Token.to_string(), "token");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
