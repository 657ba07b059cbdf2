//! Common types used across the authentication modules.
//!
//! ## Domain Types
//!
//! - [`ClientRegistration`] - OAuth 2.0 client registration
//! - [`GrantType`] - Supported OAuth grant types
//! - [`Principal`] - An authenticated resource owner
//! - [`UserRecord`] - A resource owner with a password hash

pub mod client;
pub mod principal;
pub mod user;

pub use client::{ClientRegistration, ClientValidationError, GrantType};
pub use principal::{Principal, join_scopes, parse_scopes};
pub use user::UserRecord;
