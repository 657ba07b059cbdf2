//! Storage traits and in-memory backends.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations ([`ClientRegistry`])
//! - Resource owners ([`UserStore`])
//! - Used refresh token identifiers ([`RevocationStore`])

pub mod client;
pub mod memory;
pub mod revocation;
pub mod user;

pub use client::ClientRegistry;
pub use memory::{InMemoryRevocationStore, InMemoryUserStore, StaticClientRegistry};
pub use revocation::{RetryingRevocationStore, RevocationStore};
pub use user::UserStore;
