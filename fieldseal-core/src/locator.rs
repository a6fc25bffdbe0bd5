//! Host component lookup.
//!
//! The host (an application container, a plugin registry) owns shared
//! components; the pipeline asks for them by a string type id.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use fieldseal_crypto::{AlgorithmId, EncryptionAlgorithm};
use fieldseal_sql::SqlAnalyzer;

pub type Component = Arc<dyn Any + Send + Sync>;

/// Type id under which a host registers the shared `ColumnRegistry`.
pub const COLUMN_REGISTRY: &str = "fieldseal.column_registry";
/// Type id under which a host registers the shared `AlgorithmContainer`.
pub const ALGORITHM_CONTAINER: &str = "fieldseal.algorithm_container";
/// Type id under which a host registers an `Arc<dyn SqlAnalyzer>`.
pub const SQL_ANALYZER: &str = "fieldseal.sql_analyzer";

pub trait ComponentLocator: Send + Sync {
    fn lookup(&self, type_id: &str) -> Option<Component>;
}

/// Looks up a component and downcasts it.
pub fn lookup_as<T: Any + Send + Sync>(locator: &dyn ComponentLocator, type_id: &str) -> Option<Arc<T>> {
    locator.lookup(type_id)?.downcast::<T>().ok()
}

/// Algorithm instances are registered as `Arc<dyn EncryptionAlgorithm>`
/// under their identifier.
pub fn lookup_algorithm(
    locator: &dyn ComponentLocator,
    id: &AlgorithmId,
) -> Option<Arc<dyn EncryptionAlgorithm>> {
    lookup_as::<Arc<dyn EncryptionAlgorithm>>(locator, id.as_str()).map(|a| Arc::clone(a.as_ref()))
}

pub fn lookup_analyzer(locator: &dyn ComponentLocator) -> Option<Arc<dyn SqlAnalyzer>> {
    lookup_as::<Arc<dyn SqlAnalyzer>>(locator, SQL_ANALYZER).map(|a| Arc::clone(a.as_ref()))
}

/// A locator that knows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoComponents;

impl ComponentLocator for NoComponents {
    fn lookup(&self, _type_id: &str) -> Option<Component> {
        None
    }
}

/// In-memory component table.
#[derive(Default)]
pub struct ComponentTable {
    entries: RwLock<HashMap<String, Component>>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&self, type_id: impl Into<String>, component: Arc<T>) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(type_id.into(), component);
    }

    pub fn insert_algorithm(&self, id: &AlgorithmId, algorithm: Arc<dyn EncryptionAlgorithm>) {
        self.insert(id.as_str(), Arc::new(algorithm));
    }

    pub fn insert_analyzer(&self, analyzer: Arc<dyn SqlAnalyzer>) {
        self.insert(SQL_ANALYZER, Arc::new(analyzer));
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ComponentLocator for ComponentTable {
    fn lookup(&self, type_id: &str) -> Option<Component> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.get(type_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldseal_crypto::PlaintextAlgorithm;
    use fieldseal_sql::RegexSqlAnalyzer;

    #[test]
    fn typed_lookup_downcasts() {
        let table = ComponentTable::new();
        table.insert("answer", Arc::new(42u32));
        assert_eq!(lookup_as::<u32>(&table, "answer").as_deref(), Some(&42));
        assert!(lookup_as::<String>(&table, "answer").is_none());
        assert!(lookup_as::<u32>(&table, "missing").is_none());
    }

    #[test]
    fn algorithm_and_analyzer_lookup() {
        let table = ComponentTable::new();
        let id = AlgorithmId::new("acme.plain");
        table.insert_algorithm(&id, Arc::new(PlaintextAlgorithm));
        table.insert_analyzer(Arc::new(RegexSqlAnalyzer::new()));
        assert_eq!(table.len(), 2);

        let algo = lookup_algorithm(&table, &id).unwrap();
        assert_eq!(algo.encrypt("x").unwrap(), "x");
        assert!(lookup_analyzer(&table).is_some());
        assert!(lookup_algorithm(&NoComponents, &id).is_none());
    }
}
