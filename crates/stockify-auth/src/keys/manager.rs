//! The key manager: one active signing key plus verification-only keys.
//!
//! Loaded once at startup and shared read-only behind an `Arc` for the
//! lifetime of the process.

use std::collections::HashMap;

use jsonwebtoken::{Header, TokenData, Validation, crypto, decode, decode_header, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::KeyError;
use super::keystore::KeyStore;
use super::signing::{Jwks, SigningKeyPair};
use crate::config::SigningConfig;
use crate::error::{AuthError, AuthResult};

/// Holds the signing key pair and any retired verification keys.
///
/// This type is `Send + Sync` and intended to be shared via `Arc`.
#[derive(Debug)]
pub struct KeyManager {
    active_kid: String,
    keys: HashMap<String, SigningKeyPair>,
    issuer: String,
}

impl KeyManager {
    /// Creates a key manager around a single active key.
    #[must_use]
    pub fn new(active: SigningKeyPair, issuer: impl Into<String>) -> Self {
        let active_kid = active.kid.clone();
        let mut keys = HashMap::new();
        keys.insert(active_kid.clone(), active);
        Self {
            active_kid,
            keys,
            issuer: issuer.into(),
        }
    }

    /// Adds a key that verifies tokens but never signs new ones.
    #[must_use]
    pub fn with_verification_key(mut self, key: SigningKeyPair) -> Self {
        if key.kid != self.active_kid {
            self.keys.insert(key.kid.clone(), key);
        }
        self
    }

    /// Loads keys as described by the signing configuration.
    ///
    /// With a keystore configured, the active key is `alias` and every entry
    /// of `verification_aliases` is loaded as a verification key. Without one,
    /// an ephemeral key is generated if allowed.
    ///
    /// # Errors
    /// Returns a [`KeyError`] if the keystore cannot be read, an alias is
    /// missing, the passphrase is wrong, or no key source is configured.
    pub fn load(config: &SigningConfig, issuer: impl Into<String>) -> Result<Self, KeyError> {
        let issuer = issuer.into();

        if let Some(path) = &config.keystore {
            let store = KeyStore::from_path(path)?;
            let passphrase = config.passphrase.as_deref();

            let active = store.load_key(&config.alias, passphrase)?;
            info!(
                kid = %active.kid,
                algorithm = %active.algorithm,
                keystore = %path.display(),
                "Loaded signing key"
            );

            let mut manager = Self::new(active, issuer);
            for alias in &config.verification_aliases {
                let key = store.load_key(alias, passphrase)?;
                debug!(kid = %key.kid, "Loaded verification key");
                manager = manager.with_verification_key(key);
            }
            return Ok(manager);
        }

        if config.generate_ephemeral {
            let active = SigningKeyPair::generate(config.algorithm)?;
            tracing::warn!(
                kid = %active.kid,
                algorithm = %active.algorithm,
                "Using an ephemeral signing key; tokens will not survive a restart"
            );
            return Ok(Self::new(active, issuer));
        }

        Err(KeyError::NoKeySource)
    }

    /// Returns the active signing key.
    #[must_use]
    pub fn active_key(&self) -> &SigningKeyPair {
        // The active kid is always present in the map.
        &self.keys[&self.active_kid]
    }

    /// Returns the key id of the active signing key.
    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.active_kid
    }

    /// Returns the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs raw bytes with the active key. Returns a base64url signature.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the signing primitive fails.
    pub fn sign(&self, payload: &[u8]) -> AuthResult<String> {
        let key = self.active_key();
        crypto::sign(payload, key.encoding_key(), key.algorithm.to_jwt_algorithm())
            .map_err(|e| AuthError::internal(format!("signing failed: {e}")))
    }

    /// Verifies a base64url signature over raw bytes with the active key.
    #[must_use]
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let key = self.active_key();
        crypto::verify(
            signature,
            payload,
            key.decoding_key(),
            key.algorithm.to_jwt_algorithm(),
        )
        .unwrap_or(false)
    }

    /// Encodes claims into a JWT signed by the active key.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if encoding fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
        let key = self.active_key();
        let mut header = Header::new(key.algorithm.to_jwt_algorithm());
        header.kid = Some(key.kid.clone());

        encode(&header, claims, key.encoding_key())
            .map_err(|e| AuthError::internal(format!("token encoding failed: {e}")))
    }

    /// Decodes a JWT and checks its signature against the key named by its
    /// `kid` header. Expiry is not checked here.
    ///
    /// # Errors
    /// - [`AuthError::Malformed`] if the token cannot be parsed
    /// - [`AuthError::BadSignature`] if the key is unknown, the algorithm does
    ///   not match the key, or the signature does not verify
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> AuthResult<TokenData<T>> {
        let header = decode_header(token).map_err(|e| AuthError::malformed(e.to_string()))?;

        let Some(key) = header.kid.as_deref().and_then(|kid| self.keys.get(kid)) else {
            debug!(kid = ?header.kid, "No verification key for token");
            return Err(AuthError::BadSignature);
        };

        let mut validation = Validation::new(key.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.validate_exp = false; // checked by the token verifier
        validation.validate_aud = false; // resource binding checked by the token verifier
        validation.leeway = 0;

        decode(token, key.decoding_key(), &validation).map_err(map_decode_error)
    }

    /// Returns the public keys as a JSON Web Key Set, active key first.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        let mut keys = vec![self.active_key().to_jwk()];
        let mut retired: Vec<_> = self
            .keys
            .values()
            .filter(|key| key.kid != self.active_kid)
            .map(SigningKeyPair::to_jwk)
            .collect();
        retired.sort_by(|a, b| a.kid.cmp(&b.kid));
        keys.extend(retired);
        Jwks { keys }
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::BadSignature,
        ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
            AuthError::internal(err.to_string())
        }
        _ => AuthError::malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyStoreEntry;
    use crate::keys::signing::SigningAlgorithm;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Claims {
        iss: String,
        sub: String,
        iat: i64,
        exp: i64,
    }

    fn claims(issuer: &str) -> Claims {
        Claims {
            iss: issuer.to_string(),
            sub: "alice".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        }
    }

    fn manager() -> KeyManager {
        KeyManager::new(SigningKeyPair::generate_ec().unwrap(), "https://issuer")
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let keys = manager();
        let signature = keys.sign(b"payload").unwrap();
        assert!(keys.verify(b"payload", &signature));
        assert!(!keys.verify(b"payloaD", &signature));
        assert!(!keys.verify(b"payload", "not-a-signature"));
    }

    #[test]
    fn test_encode_decode_ignores_expiry() {
        let keys = manager();
        let token = keys.encode(&claims("https://issuer")).unwrap();
        let decoded = keys.decode::<Claims>(&token).unwrap();
        assert_eq!(decoded.claims, claims("https://issuer"));
        assert_eq!(decoded.header.kid.as_deref(), Some(keys.current_kid()));
    }

    #[test]
    fn test_foreign_key_is_bad_signature() {
        let ours = manager();
        let theirs = manager();
        let token = theirs.encode(&claims("https://issuer")).unwrap();
        assert!(matches!(
            ours.decode::<Claims>(&token),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let keys = manager();
        assert!(matches!(
            keys.decode::<Claims>("not.a.jwt"),
            Err(AuthError::Malformed { .. })
        ));
        assert!(matches!(
            keys.decode::<Claims>(""),
            Err(AuthError::Malformed { .. })
        ));
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let keys = manager();
        let token = keys.encode(&claims("https://elsewhere")).unwrap();
        assert!(matches!(
            keys.decode::<Claims>(&token),
            Err(AuthError::Malformed { .. })
        ));
    }

    #[test]
    fn test_verification_key_accepts_old_tokens() {
        let secret = p384::SecretKey::random(&mut rand::rngs::OsRng);
        let old = KeyManager::new(
            SigningKeyPair::from_ec_secret_key("old", &secret).unwrap(),
            "https://issuer",
        );
        let token = old.encode(&claims("https://issuer")).unwrap();

        let rotated = manager()
            .with_verification_key(SigningKeyPair::from_ec_secret_key("old", &secret).unwrap());
        assert!(rotated.decode::<Claims>(&token).is_ok());
        assert_eq!(rotated.jwks().keys.len(), 2);

        let fresh = rotated.encode(&claims("https://issuer")).unwrap();
        let header = decode_header(&fresh).unwrap();
        assert_eq!(header.kid.as_deref(), Some(rotated.current_kid()));
        assert_ne!(rotated.current_kid(), "old");
    }

    #[test]
    fn test_same_kid_different_key_is_bad_signature() {
        let old = KeyManager::new(
            SigningKeyPair::from_ec_secret_key(
                "k1",
                &p384::SecretKey::random(&mut rand::rngs::OsRng),
            )
            .unwrap(),
            "https://issuer",
        );
        let token = old.encode(&claims("https://issuer")).unwrap();

        let impostor = KeyManager::new(
            SigningKeyPair::from_ec_secret_key(
                "k1",
                &p384::SecretKey::random(&mut rand::rngs::OsRng),
            )
            .unwrap(),
            "https://issuer",
        );
        assert!(matches!(
            impostor.decode::<Claims>(&token),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn test_load_from_keystore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.toml");

        let mut store = KeyStore::default();
        store.insert(KeyStoreEntry::generate("current", SigningAlgorithm::ES384, None).unwrap());
        store.insert(KeyStoreEntry::generate("previous", SigningAlgorithm::ES384, None).unwrap());
        std::fs::write(&path, store.to_toml_string().unwrap()).unwrap();

        let config = SigningConfig {
            keystore: Some(path),
            alias: "current".to_string(),
            verification_aliases: vec!["previous".to_string()],
            ..SigningConfig::default()
        };
        let keys = KeyManager::load(&config, "https://issuer").unwrap();
        assert_eq!(keys.current_kid(), "current");

        let jwks = keys.jwks();
        let kids: Vec<_> = jwks.keys.iter().map(|k| k.kid.as_str()).collect();
        assert_eq!(kids, vec!["current", "previous"]);
    }

    #[test]
    fn test_load_missing_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.toml");
        let mut store = KeyStore::default();
        store.insert(KeyStoreEntry::generate("current", SigningAlgorithm::ES384, None).unwrap());
        std::fs::write(&path, store.to_toml_string().unwrap()).unwrap();

        let config = SigningConfig {
            keystore: Some(path),
            alias: "other".to_string(),
            ..SigningConfig::default()
        };
        assert!(matches!(
            KeyManager::load(&config, "https://issuer"),
            Err(KeyError::AliasNotFound { .. })
        ));
    }

    #[test]
    fn test_load_without_source_fails() {
        let config = SigningConfig::default();
        assert!(matches!(
            KeyManager::load(&config, "https://issuer"),
            Err(KeyError::NoKeySource)
        ));
    }

    #[test]
    fn test_load_ephemeral() {
        let config = SigningConfig {
            generate_ephemeral: true,
            algorithm: SigningAlgorithm::ES384,
            ..SigningConfig::default()
        };
        let keys = KeyManager::load(&config, "https://issuer").unwrap();
        assert_eq!(keys.active_key().algorithm, SigningAlgorithm::ES384);
        assert_eq!(keys.jwks().keys.len(), 1);
    }
}
