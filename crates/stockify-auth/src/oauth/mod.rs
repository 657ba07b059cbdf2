//! OAuth 2.0 token flows.
//!
//! - [`token`] - Wire types of the token endpoint
//! - [`credentials`] - Resource-owner password checks
//! - [`grant`] - The password and refresh_token grant state machine

pub mod credentials;
pub mod grant;
pub mod token;

pub use credentials::CredentialVerifier;
pub use grant::{GrantHandler, GrantRequest, GrantState};
pub use token::{ClientCredentials, TokenErrorResponse, TokenRequest, TokenResponse};
