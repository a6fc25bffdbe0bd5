//! Encryption layer for fieldseal.
//!
//! Defines the two-method strategy contract every column algorithm
//! implements, plus the built-in default algorithm:
//! - ChaCha20-Poly1305 authenticated encryption
//! - Deterministic (synthetic) nonces so equal plaintexts produce equal
//!   ciphertexts and `WHERE col = ?` keeps matching stored rows
//! - A textual prefix marker so already-encrypted values are recognised
//! - Optional Argon2id key derivation from a passphrase
//!
//! # Architecture
//!
//! Algorithms are addressed by an [`AlgorithmId`]. The middleware resolves
//! an identifier to an `Arc<dyn EncryptionAlgorithm>` once and caches it, so
//! implementations must be `Send + Sync` and cheap to share.

mod algorithm;
mod cipher;
mod default_algorithm;
mod error;
mod key;

pub use algorithm::{AlgorithmId, EncryptionAlgorithm, PlaintextAlgorithm};
pub use cipher::{open_deterministic, seal_deterministic, NONCE_SIZE, TAG_SIZE};
pub use default_algorithm::{DefaultEncryptionAlgorithm, ENCRYPT_PREFIX};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
