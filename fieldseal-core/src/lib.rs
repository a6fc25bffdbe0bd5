//! Transparent column-level field encryption.
//!
//! Sits between application code and a SQL backend. Before a statement
//! runs, parameters bound to encrypted columns are encrypted in place;
//! after it runs they are put back, so the caller never sees ciphertext in
//! its own objects. Results coming back are decrypted field by field.
//!
//! # Pieces
//!
//! - [`ColumnRegistry`]: which `(table, column)` pairs are encrypted, and
//!   with which algorithm. Built once from the host's [`SchemaSource`].
//! - [`AlgorithmContainer`]: resolves algorithm identifiers to shared
//!   instances, falling back to the default algorithm.
//! - [`ParameterAnalyzer`]: pairs statement parameters with columns for
//!   map, object and dynamic-query carriers.
//! - [`EncryptionOrchestrator`] and [`RestoreContext`]: encrypt, record,
//!   restore.
//! - [`ResultDecryptor`]: decrypts result graphs.
//! - [`StatementInterceptor`]: the hooks a host calls around execution.
//! - [`EncryptedText`] and [`SealedText`]: single-column conversion for
//!   hosts that map a column through a type handler.

mod analyzer;
mod carrier;
mod config;
mod container;
mod context;
mod decryptor;
mod error;
mod interceptor;
pub mod locator;
pub mod naming;
mod orchestrator;
mod registry;
mod sealed;
mod task;
mod value;

pub use analyzer::{ColumnMatch, ParameterAnalyzer};
pub use carrier::{BoundStatement, ParameterCarrier, ParameterMapping, mappings};
pub use config::SealConfig;
pub use container::{
    AlgorithmContainer, AlgorithmFactory, DefaultSupplier, EncryptedText, PLAINTEXT_ALGORITHM,
    SharedAlgorithm, decrypt_with_policy, encrypt_with_policy,
};
pub use context::{RestoreContext, RestoreGuard};
pub use decryptor::{AnnotatedFieldRef, ResultDecryptor};
pub use error::{AccessError, SealError, SealResult};
pub use interceptor::StatementInterceptor;
pub use locator::{ComponentLocator, ComponentTable};
pub use naming::IdentifierCase;
pub use orchestrator::EncryptionOrchestrator;
pub use registry::{ColumnKey, ColumnRegistry, Schema, SchemaSource};
pub use sealed::SealedText;
pub use task::{EncryptionTask, Locator, RestoreTask};
pub use value::{
    DynamicQuery, EncryptedMarker, FieldDef, Getter, ParamMap, Record, RecordType, Setter,
    SharedRecord, Value, get_path, get_record_path, lock_record, set_path, set_record_path,
};

pub use fieldseal_crypto::{AlgorithmId, CryptoError, DefaultEncryptionAlgorithm, EncryptionAlgorithm};
pub use fieldseal_sql::{AnalysisError, ParamBinding, RegexSqlAnalyzer, SqlAnalyzer, TableRef};
