//! HTTP extractors for resource servers.
//!
//! - [`auth`] - `BearerAuth` and `OptionalBearerAuth` extractors
//! - [`error`] - RFC 6750 error responses for [`AuthError`](crate::AuthError)

pub mod auth;
pub mod error;

pub use auth::{AuthState, BearerAuth, OptionalBearerAuth};
