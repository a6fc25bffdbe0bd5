//! The encryption strategy contract.

use crate::error::CryptoResult;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Identifier naming a concrete encryption strategy.
///
/// Identifiers are opaque strings; the container resolves them to
/// instances. Two identifiers are reserved: [`AlgorithmId::default_algorithm`]
/// for the built-in algorithm and [`AlgorithmId::abstract_algorithm`], which
/// names the contract itself and always resolves to the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(Cow<'static, str>);

impl AlgorithmId {
    pub const DEFAULT: &'static str = "fieldseal.default";
    pub const ABSTRACT: &'static str = "fieldseal.algorithm";

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub const fn default_algorithm() -> Self {
        Self::from_static(Self::DEFAULT)
    }

    pub const fn abstract_algorithm() -> Self {
        Self::from_static(Self::ABSTRACT)
    }

    pub fn is_abstract(&self) -> bool {
        self.0 == Self::ABSTRACT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlgorithmId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AlgorithmId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Strategy for encrypting and decrypting a single column value.
///
/// Implementations own their key material. Failures are reported as
/// `Err`; whether the middleware propagates them or passes the original
/// value through is decided by [`EncryptionAlgorithm::throw_on_crypto_error`].
pub trait EncryptionAlgorithm: Send + Sync {
    /// Encrypt a plaintext value.
    fn encrypt(&self, plaintext: &str) -> CryptoResult<String>;

    /// Decrypt a value previously produced by `encrypt`.
    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String>;

    /// Whether crypto failures should abort the operation instead of
    /// passing the original value through.
    fn throw_on_crypto_error(&self) -> bool {
        false
    }
}

/// No-op algorithm. Values pass through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextAlgorithm;

impl EncryptionAlgorithm for PlaintextAlgorithm {
    fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String> {
        Ok(ciphertext.to_string())
    }
}
