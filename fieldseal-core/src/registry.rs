//! Encrypted-Column Registry.
//!
//! Built lazily, exactly once, from the record types the host exposes.
//! Keys are `(table, column)` normalised by the backend's identifier case.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use fieldseal_crypto::AlgorithmId;
use once_cell::sync::OnceCell;
use tracing::{debug, error};

use crate::error::{SealError, SealResult};
use crate::naming::IdentifierCase;
use crate::value::RecordType;

/// Supplies the record types mapped to tables.
pub trait SchemaSource: Send + Sync {
    fn record_types(&self) -> SealResult<Vec<Arc<RecordType>>>;
}

/// A fixed list of record types.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: Vec<Arc<RecordType>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ty: Arc<RecordType>) -> Self {
        self.types.push(ty);
        self
    }
}

impl SchemaSource for Schema {
    fn record_types(&self) -> SealResult<Vec<Arc<RecordType>>> {
        Ok(self.types.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub table: String,
    pub column: String,
}

impl ColumnKey {
    pub fn new(table: &str, column: &str, case: IdentifierCase) -> Self {
        Self {
            table: case.normalize(table),
            column: case.normalize(column),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.column)
    }
}

type ColumnMap = HashMap<ColumnKey, AlgorithmId>;

pub struct ColumnRegistry {
    source: Arc<dyn SchemaSource>,
    case: IdentifierCase,
    default_algorithm: AlgorithmId,
    columns: RwLock<Arc<OnceCell<ColumnMap>>>,
    scans: AtomicUsize,
}

impl fmt::Debug for ColumnRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnRegistry")
            .field("case", &self.case)
            .field("default_algorithm", &self.default_algorithm)
            .field("scans", &self.scan_count())
            .finish_non_exhaustive()
    }
}

impl ColumnRegistry {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            case: IdentifierCase::default(),
            default_algorithm: AlgorithmId::default_algorithm(),
            columns: RwLock::new(Arc::new(OnceCell::new())),
            scans: AtomicUsize::new(0),
        }
    }

    pub fn identifier_case(mut self, case: IdentifierCase) -> Self {
        self.case = case;
        self
    }

    pub fn default_algorithm(mut self, id: AlgorithmId) -> Self {
        self.default_algorithm = id;
        self
    }

    /// Builds the registry if it has not been built yet. Concurrent callers
    /// block until the single scan finishes; a failed scan is retried on the
    /// next call.
    pub fn init(&self) -> SealResult<()> {
        self.cell().get_or_try_init(|| self.scan()).map(|_| ())
    }

    pub fn is_encrypted(&self, table: &str, column: &str) -> SealResult<bool> {
        Ok(self.lookup(table, column)?.is_some())
    }

    /// Algorithm for `(table, column)`, or `None` when it is not encrypted.
    pub fn lookup(&self, table: &str, column: &str) -> SealResult<Option<AlgorithmId>> {
        let key = ColumnKey::new(table, column, self.case);
        let cell = self.cell();
        let columns = cell.get_or_try_init(|| self.scan())?;
        Ok(columns.get(&key).cloned())
    }

    /// Algorithm for `(table, column)`; the default on a miss or when the
    /// registry cannot be built.
    pub fn algorithm_for(&self, table: &str, column: &str) -> AlgorithmId {
        match self.lookup(table, column) {
            Ok(Some(id)) => id,
            Ok(None) => self.default_algorithm.clone(),
            Err(e) => {
                error!("encrypted-column registry unavailable: {e}");
                self.default_algorithm.clone()
            }
        }
    }

    pub fn has_any_encrypted(&self) -> SealResult<bool> {
        Ok(!self.cell().get_or_try_init(|| self.scan())?.is_empty())
    }

    pub fn len(&self) -> SealResult<usize> {
        Ok(self.cell().get_or_try_init(|| self.scan())?.len())
    }

    /// Drops the built registry; the next access scans again.
    pub fn clear(&self) {
        let mut columns = self.columns.write().unwrap_or_else(|p| p.into_inner());
        *columns = Arc::new(OnceCell::new());
    }

    /// Number of schema scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn cell(&self) -> Arc<OnceCell<ColumnMap>> {
        Arc::clone(&self.columns.read().unwrap_or_else(|p| p.into_inner()))
    }

    fn scan(&self) -> SealResult<ColumnMap> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let mut columns = ColumnMap::new();

        for ty in self.source.record_types()? {
            let table = ty.table_name();
            if table.trim().is_empty() {
                return Err(SealError::Configuration(format!(
                    "record type `{}` maps to an empty table name",
                    ty.name()
                )));
            }
            for field in ty.fields() {
                let Some(marker) = &field.encrypted else {
                    continue;
                };
                if field.transient {
                    return Err(SealError::Configuration(format!(
                        "transient field `{}.{}` cannot be encrypted",
                        ty.name(),
                        field.name
                    )));
                }
                let column = field.column_name();
                if column.trim().is_empty() {
                    return Err(SealError::Configuration(format!(
                        "encrypted field `{}.{}` maps to an empty column name",
                        ty.name(),
                        field.name
                    )));
                }
                if marker.algorithm.is_abstract() {
                    debug!(
                        "{}.{} uses the abstract algorithm, resolved to the default at use",
                        ty.name(),
                        field.name
                    );
                }
                let key = ColumnKey::new(&table, &column, self.case);
                match columns.get(&key) {
                    Some(existing) if *existing != marker.algorithm => {
                        return Err(SealError::Configuration(format!(
                            "column {key} is encrypted with both `{existing}` and `{}`",
                            marker.algorithm
                        )));
                    }
                    _ => {
                        debug!("encrypted column {key} -> {}", marker.algorithm);
                        columns.insert(key, marker.algorithm.clone());
                    }
                }
            }
        }
        debug!("encrypted-column registry built with {} columns", columns.len());
        Ok(columns)
    }
}
