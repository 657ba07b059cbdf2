//! # stockify-auth
//!
//! Token issuance and verification for the Stockify API.
//!
//! This crate implements an OAuth 2.0 authorization server for the
//! `password` and `refresh_token` grants. Tokens are self-contained JWTs
//! signed with an asymmetric key loaded from a keystore; resource servers
//! verify them without calling back.
//!
//! ## Overview
//!
//! A grant request flows through the [`oauth::GrantHandler`], which
//! authenticates the client, checks the resource owner's password or the
//! presented refresh token, and asks the [`token::TokenIssuer`] for a new
//! access/refresh pair. Resource servers verify access tokens with the
//! [`token::TokenVerifier`] or the [`middleware::BearerAuth`] extractor.
//!
//! ## Modules
//!
//! - [`config`] - Authentication configuration
//! - [`error`] - Error taxonomy and its external mapping
//! - [`keys`] - Keystore loading, signing keys and JWKS
//! - [`oauth`] - Grant handling and token endpoint types
//! - [`token`] - Token issuance and verification
//! - [`storage`] - Storage traits for clients, users and used refresh tokens
//! - [`password`] - Argon2 password hashing
//! - [`types`] - Clients, principals and users
//! - [`middleware`] - Bearer token extractors for resource endpoints
//! - [`http`] - Axum handlers for the token and JWKS endpoints

pub mod config;
pub mod error;
pub mod http;
pub mod keys;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, RefreshTokenPolicy};
pub use error::{AuthError, AuthResult, ErrorCategory};
pub use http::{
    JwksState, TokenState, UserInfoResponse, jwks_handler, router, token_handler, userinfo_handler,
};
pub use keys::{KeyError, KeyManager, KeyStore, SigningAlgorithm, SigningKeyPair};
pub use middleware::{AuthState, BearerAuth, OptionalBearerAuth};
pub use oauth::{CredentialVerifier, GrantHandler, TokenRequest, TokenResponse};
pub use storage::{
    ClientRegistry, InMemoryRevocationStore, InMemoryUserStore, RetryingRevocationStore,
    RevocationStore, StaticClientRegistry, UserStore,
};
pub use token::{TokenClaims, TokenIssuer, TokenKind, TokenVerifier};
pub use types::{ClientRegistration, ClientValidationError, GrantType, Principal, UserRecord};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use stockify_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{AuthConfig, ConfigError, RefreshTokenPolicy};
    pub use crate::error::{AuthError, AuthResult, ErrorCategory};
    pub use crate::keys::{KeyManager, SigningAlgorithm};
    pub use crate::middleware::{AuthState, BearerAuth, OptionalBearerAuth};
    pub use crate::oauth::{CredentialVerifier, GrantHandler, TokenRequest, TokenResponse};
    pub use crate::storage::{ClientRegistry, RevocationStore, UserStore};
    pub use crate::token::{TokenIssuer, TokenKind, TokenVerifier};
    pub use crate::types::{ClientRegistration, GrantType, Principal};
}
