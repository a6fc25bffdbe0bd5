//! Built-in column algorithm.

use crate::algorithm::EncryptionAlgorithm;
use crate::cipher::{open_deterministic, seal_deterministic};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, DerivedKey, KdfParams, Salt};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Marker prepended to every ciphertext produced by the default algorithm.
///
/// Tagging is in-band: a plaintext that itself starts with the marker is
/// taken for ciphertext. `encrypt` stores it unchanged and `decrypt` then
/// rejects it as malformed, so such values cannot round-trip.
pub const ENCRYPT_PREFIX: &str = "_sensitive_start_";

/// Seed of the built-in development key. Deployments are expected to
/// supply their own key through [`DefaultEncryptionAlgorithm::with_key`] or
/// [`DefaultEncryptionAlgorithm::from_passphrase`].
const DEVELOPMENT_KEY_SEED: &[u8] = b"fieldseal-development-key-v1";

/// Default algorithm: deterministic ChaCha20-Poly1305, base64 encoded and
/// tagged with [`ENCRYPT_PREFIX`].
///
/// - `encrypt` is a no-op on input that already carries the prefix.
/// - `decrypt` returns untagged input unchanged (plaintext legacy rows).
#[derive(Debug, Clone)]
pub struct DefaultEncryptionAlgorithm {
    key: DerivedKey,
}

impl DefaultEncryptionAlgorithm {
    /// Algorithm keyed with the built-in development key.
    pub fn new() -> Self {
        let digest = Sha256::digest(DEVELOPMENT_KEY_SEED);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self {
            key: DerivedKey::from_bytes(bytes),
        }
    }

    pub fn with_key(key: DerivedKey) -> Self {
        Self { key }
    }

    /// Derives the key from a passphrase with Argon2id.
    pub fn from_passphrase(passphrase: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<Self> {
        Ok(Self {
            key: derive_key(passphrase, salt, params)?,
        })
    }

    /// Whether `value` carries the ciphertext marker.
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPT_PREFIX)
    }
}

impl Default for DefaultEncryptionAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionAlgorithm for DefaultEncryptionAlgorithm {
    fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        if Self::is_encrypted(plaintext) {
            return Ok(plaintext.to_string());
        }
        let sealed = seal_deterministic(&self.key, plaintext.as_bytes())?;
        Ok(format!("{ENCRYPT_PREFIX}{}", STANDARD.encode(sealed)))
    }

    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String> {
        let Some(encoded) = ciphertext.strip_prefix(ENCRYPT_PREFIX) else {
            return Ok(ciphertext.to_string());
        };
        let blob = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        let plaintext = open_deterministic(&self.key, &blob)?;
        String::from_utf8(plaintext).map_err(|e| CryptoError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;

    #[test]
    fn ciphertext_carries_prefix() {
        let algo = DefaultEncryptionAlgorithm::new();
        let ct = algo.encrypt("13800000000").unwrap();
        assert!(ct.starts_with(ENCRYPT_PREFIX));
        assert_ne!(ct, "13800000000");
    }

    #[test]
    fn development_key_is_stable_across_instances() {
        let a = DefaultEncryptionAlgorithm::new().encrypt("x").unwrap();
        let b = DefaultEncryptionAlgorithm::new().encrypt("x").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn untagged_input_passes_through_decrypt() {
        let algo = DefaultEncryptionAlgorithm::new();
        assert_eq!(algo.decrypt("plain legacy").unwrap(), "plain legacy");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let ct = DefaultEncryptionAlgorithm::with_key(generate_random_key())
            .encrypt("secret")
            .unwrap();
        let other = DefaultEncryptionAlgorithm::with_key(generate_random_key());
        assert!(matches!(other.decrypt(&ct), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn plaintext_starting_with_prefix_is_not_encrypted() {
        let algo = DefaultEncryptionAlgorithm::new();
        let lookalike = format!("{ENCRYPT_PREFIX}not base64!");
        assert_eq!(algo.encrypt(&lookalike).unwrap(), lookalike);
        assert!(matches!(algo.decrypt(&lookalike), Err(CryptoError::Encoding(_))));
    }

    #[test]
    fn garbage_after_prefix_is_an_encoding_error() {
        let algo = DefaultEncryptionAlgorithm::new();
        let err = algo.decrypt("_sensitive_start_@@not-base64@@").unwrap_err();
        assert!(matches!(err, CryptoError::Encoding(_)));
    }
}
