//! Algorithm Container: resolves algorithm identifiers to shared instances.
//!
//! Resolution order for an identifier not yet cached:
//! 1. an instance registered with the host's [`ComponentLocator`],
//! 2. a factory registered on the container,
//! 3. the default algorithm (logged as a warning),
//!
//! and the result is cached under the requested identifier. The abstract
//! identifier bypasses the cache and yields the configured default.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fieldseal_crypto::{
    AlgorithmId, CryptoResult, DefaultEncryptionAlgorithm, EncryptionAlgorithm, PlaintextAlgorithm,
};
use tracing::{debug, error, warn};

use crate::error::{SealError, SealResult};
use crate::locator::{ComponentLocator, NoComponents, lookup_algorithm};

pub type SharedAlgorithm = Arc<dyn EncryptionAlgorithm>;

/// Builds a fresh algorithm instance.
pub type AlgorithmFactory = Arc<dyn Fn() -> CryptoResult<SharedAlgorithm> + Send + Sync>;

/// Supplies an overriding default; returning `None` degrades to the
/// built-in default algorithm.
pub type DefaultSupplier = Arc<dyn Fn() -> Option<SharedAlgorithm> + Send + Sync>;

/// Identifier of the built-in identity algorithm.
pub const PLAINTEXT_ALGORITHM: &str = "fieldseal.plaintext";

pub struct AlgorithmContainer {
    cache: RwLock<HashMap<AlgorithmId, SharedAlgorithm>>,
    factories: RwLock<HashMap<AlgorithmId, AlgorithmFactory>>,
    locator: Arc<dyn ComponentLocator>,
    default_id: AlgorithmId,
    default_supplier: Option<DefaultSupplier>,
}

impl fmt::Debug for AlgorithmContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmContainer")
            .field("default_id", &self.default_id)
            .field("cached", &self.cache_size())
            .finish_non_exhaustive()
    }
}

impl Default for AlgorithmContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl AlgorithmContainer {
    /// Container with the built-in algorithms and no host components.
    pub fn new() -> Self {
        Self::with_locator(Arc::new(NoComponents))
    }

    pub fn with_locator(locator: Arc<dyn ComponentLocator>) -> Self {
        let container = Self {
            cache: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            locator,
            default_id: AlgorithmId::default_algorithm(),
            default_supplier: None,
        };
        container.register(AlgorithmId::default_algorithm(), || {
            Ok(Arc::new(DefaultEncryptionAlgorithm::new()) as SharedAlgorithm)
        });
        container.register(AlgorithmId::from_static(PLAINTEXT_ALGORITHM), || {
            Ok(Arc::new(PlaintextAlgorithm) as SharedAlgorithm)
        });
        container
    }

    /// Identifier resolved by [`resolve_default`](Self::resolve_default).
    pub fn default_id(mut self, id: AlgorithmId) -> Self {
        self.default_id = id;
        self
    }

    pub fn default_supplier(mut self, supplier: DefaultSupplier) -> Self {
        self.default_supplier = Some(supplier);
        self
    }

    /// Registers (or replaces) the factory for `id`. Already cached
    /// instances are kept until [`clear_cache`](Self::clear_cache).
    pub fn register<F>(&self, id: AlgorithmId, factory: F)
    where
        F: Fn() -> CryptoResult<SharedAlgorithm> + Send + Sync + 'static,
    {
        self.write_factories().insert(id, Arc::new(factory));
    }

    /// Resolves `id` to its shared instance.
    ///
    /// Concurrent first resolution of the same identifier yields the same
    /// instance; the factory runs once.
    pub fn resolve(&self, id: &AlgorithmId) -> SealResult<SharedAlgorithm> {
        if id.is_abstract() {
            return self.resolve_default();
        }
        if let Some(hit) = self.read_cache().get(id) {
            return Ok(Arc::clone(hit));
        }
        let mut cache = self.write_cache();
        self.get_or_create(&mut cache, id)
    }

    /// The configured default; never the abstract contract itself.
    pub fn resolve_default(&self) -> SealResult<SharedAlgorithm> {
        if let Some(supplier) = &self.default_supplier {
            if let Some(algorithm) = supplier() {
                return Ok(algorithm);
            }
            warn!("default algorithm supplier returned nothing, using {}", self.default_id);
        }
        if self.default_id.is_abstract() {
            warn!("abstract identifier configured as default, using {}", AlgorithmId::DEFAULT);
            return self.resolve(&AlgorithmId::default_algorithm());
        }
        self.resolve(&self.default_id)
    }

    pub fn clear_cache(&self) {
        self.write_cache().clear();
    }

    pub fn cache_size(&self) -> usize {
        self.read_cache().len()
    }

    fn get_or_create(
        &self,
        cache: &mut HashMap<AlgorithmId, SharedAlgorithm>,
        id: &AlgorithmId,
    ) -> SealResult<SharedAlgorithm> {
        if let Some(hit) = cache.get(id) {
            return Ok(Arc::clone(hit));
        }
        let algorithm = match self.create(id) {
            Ok(algorithm) => algorithm,
            Err(reason) if *id != AlgorithmId::default_algorithm() => {
                warn!("algorithm {id} unavailable ({reason}), falling back to {}", AlgorithmId::DEFAULT);
                self.get_or_create(cache, &AlgorithmId::default_algorithm())
                    .map_err(|e| SealError::AlgorithmUnavailable {
                        id: id.clone(),
                        reason: format!("{reason}; fallback failed: {e}"),
                    })?
            }
            Err(reason) => {
                return Err(SealError::AlgorithmUnavailable {
                    id: id.clone(),
                    reason,
                });
            }
        };
        cache.insert(id.clone(), Arc::clone(&algorithm));
        Ok(algorithm)
    }

    fn create(&self, id: &AlgorithmId) -> Result<SharedAlgorithm, String> {
        if let Some(algorithm) = lookup_algorithm(self.locator.as_ref(), id) {
            debug!("algorithm {id} supplied by component locator");
            return Ok(algorithm);
        }
        let factory = self.read_factories().get(id).cloned();
        match factory {
            Some(factory) => factory().map_err(|e| {
                error!("failed to construct algorithm {id}: {e}");
                e.to_string()
            }),
            None => Err("no constructor registered".to_string()),
        }
    }

    /// Encrypts with the default algorithm under the crypto failure policy.
    pub fn seal_text(&self, plaintext: &str) -> SealResult<String> {
        encrypt_with_policy(self.resolve_default()?.as_ref(), plaintext)
    }

    /// Decrypts with the default algorithm under the crypto failure policy.
    pub fn open_text(&self, ciphertext: &str) -> SealResult<String> {
        decrypt_with_policy(self.resolve_default()?.as_ref(), ciphertext)
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<AlgorithmId, SharedAlgorithm>> {
        self.cache.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<AlgorithmId, SharedAlgorithm>> {
        self.cache.write().unwrap_or_else(|p| p.into_inner())
    }

    fn read_factories(&self) -> RwLockReadGuard<'_, HashMap<AlgorithmId, AlgorithmFactory>> {
        self.factories.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_factories(&self) -> RwLockWriteGuard<'_, HashMap<AlgorithmId, AlgorithmFactory>> {
        self.factories.write().unwrap_or_else(|p| p.into_inner())
    }
}

/// Encrypts `plaintext`. A failure propagates only when the algorithm opts
/// in; otherwise it is logged and the plaintext is returned.
pub fn encrypt_with_policy(algorithm: &dyn EncryptionAlgorithm, plaintext: &str) -> SealResult<String> {
    match algorithm.encrypt(plaintext) {
        Ok(ciphertext) => Ok(ciphertext),
        Err(e) if algorithm.throw_on_crypto_error() => Err(e.into()),
        Err(e) => {
            warn!("encryption failed, value left as is: {e}");
            Ok(plaintext.to_string())
        }
    }
}

/// Decrypts `ciphertext` under the same policy as [`encrypt_with_policy`].
pub fn decrypt_with_policy(algorithm: &dyn EncryptionAlgorithm, ciphertext: &str) -> SealResult<String> {
    match algorithm.decrypt(ciphertext) {
        Ok(plaintext) => Ok(plaintext),
        Err(e) if algorithm.throw_on_crypto_error() => Err(e.into()),
        Err(e) => {
            warn!("decryption failed, value left as is: {e}");
            Ok(ciphertext.to_string())
        }
    }
}

/// Column value codec bound to the container's default algorithm.
///
/// For hosts that map a single column through a type handler rather than
/// through statement interception.
#[derive(Debug, Clone)]
pub struct EncryptedText {
    container: Arc<AlgorithmContainer>,
}

impl EncryptedText {
    pub fn new(container: Arc<AlgorithmContainer>) -> Self {
        Self { container }
    }

    /// Value to bind when writing the column. `None` stays `None`.
    pub fn to_column(&self, value: Option<&str>) -> SealResult<Option<String>> {
        value.map(|v| self.container.seal_text(v)).transpose()
    }

    /// Value to hand back when reading the column. `None` stays `None`.
    pub fn from_column(&self, value: Option<&str>) -> SealResult<Option<String>> {
        value.map(|v| self.container.open_text(v)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldseal_crypto::ENCRYPT_PREFIX;

    #[test]
    fn default_id_resolves_builtin() {
        let container = AlgorithmContainer::new();
        let algo = container.resolve(&AlgorithmId::default_algorithm()).unwrap();
        assert!(algo.encrypt("x").unwrap().starts_with(ENCRYPT_PREFIX));
        assert_eq!(container.cache_size(), 1);
    }

    #[test]
    fn plaintext_algorithm_is_registered() {
        let container = AlgorithmContainer::new();
        let algo = container
            .resolve(&AlgorithmId::from_static(PLAINTEXT_ALGORITHM))
            .unwrap();
        assert_eq!(algo.encrypt("x").unwrap(), "x");
    }

    #[test]
    fn abstract_id_bypasses_cache() {
        let container = AlgorithmContainer::new();
        container.resolve(&AlgorithmId::abstract_algorithm()).unwrap();
        // Only the default's own entry is cached, never the abstract id.
        assert_eq!(container.cache_size(), 1);
        assert!(
            container
                .read_cache()
                .get(&AlgorithmId::abstract_algorithm())
                .is_none()
        );
    }

    #[test]
    fn encrypted_text_passes_none_through() {
        let codec = EncryptedText::new(Arc::new(AlgorithmContainer::new()));
        assert_eq!(codec.to_column(None).unwrap(), None);
        let sealed = codec.to_column(Some("13800138000")).unwrap().unwrap();
        assert!(sealed.starts_with(ENCRYPT_PREFIX));
        assert_eq!(
            codec.from_column(Some(&sealed)).unwrap().as_deref(),
            Some("13800138000")
        );
    }
}
