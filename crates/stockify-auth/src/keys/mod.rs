//! Signing key management.
//!
//! - [`signing`] - Key pairs, algorithms and JWK export
//! - [`keystore`] - Passphrase-protected keystore file
//! - [`manager`] - The [`KeyManager`] that signs and verifies tokens

pub mod keystore;
pub mod manager;
pub mod signing;

pub use keystore::{KeyStore, KeyStoreEntry};
pub use manager::KeyManager;
pub use signing::{Jwk, Jwks, SigningAlgorithm, SigningKeyPair};

use crate::error::AuthError;

/// Errors that can occur while loading or generating key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The keystore file could not be read.
    #[error("Failed to read keystore {path}: {message}")]
    Io {
        /// Path of the keystore file.
        path: String,
        /// Underlying I/O error.
        message: String,
    },

    /// The keystore file is not a valid keystore document.
    #[error("Invalid keystore: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
    },

    /// No key with the requested alias exists.
    #[error("Key alias not found: {alias}")]
    AliasNotFound {
        /// The missing alias.
        alias: String,
    },

    /// The passphrase is missing or wrong.
    #[error("Wrong or missing passphrase for key {alias}")]
    BadPassphrase {
        /// Alias of the key that failed to decrypt.
        alias: String,
    },

    /// The key material could not be parsed.
    #[error("Malformed key: {message}")]
    Malformed {
        /// Description of why the key is invalid.
        message: String,
    },

    /// The algorithm name is not supported.
    #[error("Unsupported signing algorithm: {algorithm}")]
    UnsupportedAlgorithm {
        /// The rejected algorithm name.
        algorithm: String,
    },

    /// Neither a keystore nor ephemeral key generation is configured.
    #[error("No signing key source configured")]
    NoKeySource,

    /// Failed to generate a key.
    #[error("Key generation error: {message}")]
    Generation {
        /// Description of the generation error.
        message: String,
    },
}

impl KeyError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `Generation` error.
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }
}

impl From<KeyError> for AuthError {
    fn from(err: KeyError) -> Self {
        AuthError::key_load(err.to_string())
    }
}
