//! Token management.
//!
//! - [`claims`] - The JWT claim set and token kinds
//! - [`issuer`] - Scope decisions, lifetimes and signing
//! - [`verifier`] - Ordered verification of presented tokens

pub mod claims;
pub mod issuer;
pub mod verifier;

pub use claims::{TokenClaims, TokenKind};
pub use issuer::{SignedToken, TokenIssuer, TokenPair};
pub use verifier::TokenVerifier;
