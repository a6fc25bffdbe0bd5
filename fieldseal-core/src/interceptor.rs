//! Host-facing hooks around statement execution.

use std::sync::Arc;

use fieldseal_sql::SqlAnalyzer;

use crate::carrier::BoundStatement;
use crate::config::SealConfig;
use crate::container::AlgorithmContainer;
use crate::context::{RestoreContext, RestoreGuard};
use crate::decryptor::ResultDecryptor;
use crate::error::{SealError, SealResult};
use crate::locator::{
    ALGORITHM_CONTAINER, COLUMN_REGISTRY, ComponentLocator, lookup_analyzer, lookup_as,
};
use crate::orchestrator::EncryptionOrchestrator;
use crate::registry::ColumnRegistry;
use crate::value::Value;

/// Encrypts parameters before a statement runs, restores them afterwards
/// and decrypts what comes back.
///
/// ```ignore
/// let mut ctx = RestoreContext::new();
/// let rows = interceptor.run(&mut ctx, &mut stmt, |s| db.query(s))?;
/// ```
pub struct StatementInterceptor {
    orchestrator: EncryptionOrchestrator,
    decryptor: ResultDecryptor,
}

impl StatementInterceptor {
    pub fn new(
        registry: Arc<ColumnRegistry>,
        container: Arc<AlgorithmContainer>,
        analyzer: Arc<dyn SqlAnalyzer>,
        config: SealConfig,
    ) -> Self {
        let decryptor =
            ResultDecryptor::new(Arc::clone(&container)).default_algorithm(config.default_algorithm.clone());
        Self {
            orchestrator: EncryptionOrchestrator::new(registry, container, analyzer, Arc::new(config)),
            decryptor,
        }
    }

    /// Builds the interceptor from components the host registered under
    /// [`COLUMN_REGISTRY`], [`ALGORITHM_CONTAINER`] and
    /// [`SQL_ANALYZER`](crate::locator::SQL_ANALYZER).
    pub fn from_locator(locator: &dyn ComponentLocator, config: SealConfig) -> SealResult<Self> {
        config.validate()?;
        let registry = lookup_as::<ColumnRegistry>(locator, COLUMN_REGISTRY).ok_or_else(|| {
            SealError::Configuration(format!("no `{COLUMN_REGISTRY}` component registered"))
        })?;
        let container =
            lookup_as::<AlgorithmContainer>(locator, ALGORITHM_CONTAINER).ok_or_else(|| {
                SealError::Configuration(format!("no `{ALGORITHM_CONTAINER}` component registered"))
            })?;
        let analyzer = lookup_analyzer(locator).ok_or_else(|| {
            SealError::Configuration("no SQL analyzer component registered".to_string())
        })?;
        Ok(Self::new(registry, container, analyzer, config))
    }

    pub fn orchestrator(&self) -> &EncryptionOrchestrator {
        &self.orchestrator
    }

    pub fn decryptor(&self) -> &ResultDecryptor {
        &self.decryptor
    }

    /// Prepare phase: encrypts parameters in place. Returns how many.
    pub fn prepare(&self, ctx: &mut RestoreContext, stmt: &mut BoundStatement<'_>) -> SealResult<usize> {
        self.orchestrator.apply(ctx, stmt)
    }

    /// Execute phase: runs `execute` and restores the parameters on every
    /// exit path, unwinding included.
    pub fn execute<'a, T, F>(
        &self,
        ctx: &mut RestoreContext,
        stmt: &mut BoundStatement<'a>,
        execute: F,
    ) -> SealResult<T>
    where
        F: FnOnce(&BoundStatement<'a>) -> T,
    {
        let guard = RestoreGuard::new(ctx, stmt);
        let output = execute(guard.statement());
        guard.finish()?;
        Ok(output)
    }

    /// Both phases in one call.
    pub fn run<'a, T, F>(&self, ctx: &mut RestoreContext, stmt: &mut BoundStatement<'a>, execute: F) -> SealResult<T>
    where
        F: FnOnce(&BoundStatement<'a>) -> T,
    {
        self.prepare(ctx, stmt)?;
        self.execute(ctx, stmt, execute)
    }

    pub fn decrypt_one(&self, result: &mut Value) -> SealResult<usize> {
        self.decryptor.decrypt_one(result)
    }

    pub fn decrypt_many(&self, results: &mut [Value]) -> SealResult<usize> {
        self.decryptor.decrypt_many(results)
    }
}
