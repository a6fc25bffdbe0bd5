//! Deterministic ChaCha20-Poly1305 sealing.
//!
//! The nonce is derived from the key and the plaintext (SHA-256, truncated),
//! so sealing the same plaintext under the same key always yields the same
//! bytes. Output layout: `nonce || ciphertext || tag`.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

const NONCE_DOMAIN: &[u8] = b"fieldseal-synthetic-nonce-v1";

fn synthetic_nonce(key: &DerivedKey, plaintext: &[u8]) -> [u8; NONCE_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(NONCE_DOMAIN);
    hasher.update(key.as_bytes());
    hasher.update((plaintext.len() as u64).to_le_bytes());
    hasher.update(plaintext);
    let digest = hasher.finalize();

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

/// Seals `plaintext`, returning `nonce || ciphertext || tag`.
pub fn seal_deterministic(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = synthetic_nonce(key, plaintext);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Opens a blob produced by [`seal_deterministic`].
pub fn open_deterministic(key: &DerivedKey, blob: &[u8]) -> CryptoResult<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption(format!(
            "ciphertext too short: {} bytes",
            blob.len()
        )));
    }
    let (nonce, sealed) = blob.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;

    #[test]
    fn seal_is_deterministic() {
        let key = generate_random_key();
        let a = seal_deterministic(&key, b"13800000000").unwrap();
        let b = seal_deterministic(&key, b"13800000000").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_plaintexts_get_distinct_nonces() {
        let key = generate_random_key();
        let a = seal_deterministic(&key, b"alice").unwrap();
        let b = seal_deterministic(&key, b"bob").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }

    #[test]
    fn roundtrip_empty() {
        let key = generate_random_key();
        let sealed = seal_deterministic(&key, b"").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
        assert_eq!(open_deterministic(&key, &sealed).unwrap(), b"");
    }

    #[test]
    fn tampered_blob_fails() {
        let key = generate_random_key();
        let mut sealed = seal_deterministic(&key, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(open_deterministic(&key, &sealed).is_err());
    }

    #[test]
    fn short_blob_is_rejected() {
        let key = generate_random_key();
        let err = open_deterministic(&key, &[0u8; 4]).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }
}
