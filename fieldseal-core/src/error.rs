//! Error types for the encryption pipeline.

use fieldseal_crypto::{AlgorithmId, CryptoError};
use fieldseal_sql::AnalysisError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type SealResult<T> = Result<T, SealError>;

/// Errors raised while reading or writing a value inside a carrier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("no such property: {0}")]
    NoSuchProperty(String),

    #[error("`{segment}` in `{path}` does not hold a nested value")]
    NotAContainer { path: String, segment: String },

    #[error("index {index} out of bounds in `{path}`")]
    IndexOutOfBounds { path: String, index: usize },

    #[error("malformed property path: {0:?}")]
    MalformedPath(String),

    #[error("property `{0}` is read-only")]
    ReadOnly(String),

    #[error("dynamic query wrapper `{0}` not found")]
    MissingWrapper(String),

    #[error("{locator} locator cannot address a {carrier} carrier")]
    CarrierMismatch {
        locator: &'static str,
        carrier: &'static str,
    },
}

/// Errors that can occur while encrypting parameters or decrypting results.
#[derive(Debug, Error)]
pub enum SealError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("encryption algorithm `{id}` unavailable: {reason}")]
    AlgorithmUnavailable { id: AlgorithmId, reason: String },

    #[error("SQL analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("failed to encrypt parameter {table}.{column}: {source}")]
    Mutation {
        table: String,
        column: String,
        #[source]
        source: Box<SealError>,
    },

    #[error("failed to restore parameter at {locator}: {source}")]
    Restore {
        locator: String,
        #[source]
        source: AccessError,
    },

    #[error("value access failed: {0}")]
    Access(#[from] AccessError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
