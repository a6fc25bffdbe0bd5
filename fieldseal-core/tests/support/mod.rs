//! Shared fixtures for fieldseal-core integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fieldseal_core::{
    AlgorithmContainer, AlgorithmId, ColumnRegistry, CryptoError, EncryptionAlgorithm, FieldDef,
    ParamMap, Record, RecordType, RegexSqlAnalyzer, Schema, SealConfig, StatementInterceptor,
    Value,
};
use fieldseal_crypto::CryptoResult;

pub const PHONE: &str = "13800138000";

/// `user(id, name, phone_number*, email*)`; `*` marks encrypted columns.
pub fn user_type() -> Arc<RecordType> {
    RecordType::new("User")
        .table("user")
        .field(FieldDef::new("id"))
        .field(FieldDef::new("name"))
        .field(FieldDef::new("phoneNumber").encrypted())
        .field(FieldDef::new("email").encrypted())
        .build()
}

/// `orders(id, user_id, address*)` with a nested buyer.
pub fn order_type() -> Arc<RecordType> {
    RecordType::new("Order")
        .table("orders")
        .field(FieldDef::new("id"))
        .field(FieldDef::new("address").encrypted())
        .field(FieldDef::new("buyer").nested())
        .field(FieldDef::new("cachedSummary").transient())
        .build()
}

/// A type with no encrypted data.
pub fn audit_type() -> Arc<RecordType> {
    RecordType::new("AuditEntry")
        .table("audit_log")
        .field(FieldDef::new("id"))
        .field(FieldDef::new("message"))
        .build()
}

pub fn schema() -> Schema {
    Schema::new()
        .with(user_type())
        .with(order_type())
        .with(audit_type())
}

pub fn registry() -> Arc<ColumnRegistry> {
    Arc::new(ColumnRegistry::new(Arc::new(schema())))
}

pub fn interceptor() -> StatementInterceptor {
    interceptor_with(registry(), Arc::new(AlgorithmContainer::new()), SealConfig::default())
}

pub fn interceptor_with(
    registry: Arc<ColumnRegistry>,
    container: Arc<AlgorithmContainer>,
    config: SealConfig,
) -> StatementInterceptor {
    StatementInterceptor::new(registry, container, Arc::new(RegexSqlAnalyzer::new()), config)
}

pub fn user(id: i64, phone: &str, email: &str) -> Record {
    Record::new(user_type())
        .with("id", id)
        .with("name", "Ada")
        .with("phoneNumber", phone)
        .with("email", email)
}

pub fn params<const N: usize>(entries: [(&str, Value); N]) -> ParamMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn encrypted(plaintext: &str) -> String {
    AlgorithmContainer::new()
        .seal_text(plaintext)
        .expect("default algorithm must encrypt")
}

/// Reversible toy algorithm: reverses the text and tags it.
#[derive(Debug, Default)]
pub struct ReverseAlgorithm;

impl EncryptionAlgorithm for ReverseAlgorithm {
    fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        Ok(format!("rev:{}", plaintext.chars().rev().collect::<String>()))
    }

    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String> {
        match ciphertext.strip_prefix("rev:") {
            Some(body) => Ok(body.chars().rev().collect()),
            None => Ok(ciphertext.to_string()),
        }
    }
}

/// Always fails; optionally asks for the failure to propagate.
#[derive(Debug)]
pub struct FailingAlgorithm {
    pub throw: bool,
}

impl EncryptionAlgorithm for FailingAlgorithm {
    fn encrypt(&self, _plaintext: &str) -> CryptoResult<String> {
        Err(CryptoError::Encryption("hardware module offline".into()))
    }

    fn decrypt(&self, _ciphertext: &str) -> CryptoResult<String> {
        Err(CryptoError::Decryption("hardware module offline".into()))
    }

    fn throw_on_crypto_error(&self) -> bool {
        self.throw
    }
}

/// Registers a factory for `id` that counts how often it runs.
pub fn counting_factory(container: &AlgorithmContainer, id: &AlgorithmId) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    container.register(id.clone(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ReverseAlgorithm) as Arc<dyn EncryptionAlgorithm>)
    });
    calls
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fieldseal_core=debug")
        .with_test_writer()
        .try_init();
}
