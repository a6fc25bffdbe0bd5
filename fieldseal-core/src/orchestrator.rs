//! Encryption Orchestrator: the pre-execution half of the pipeline.

use std::sync::Arc;

use fieldseal_sql::{ParamBinding, SqlAnalyzer, TableRef};
use tracing::{debug, error, warn};

use crate::analyzer::ParameterAnalyzer;
use crate::carrier::{BoundStatement, ParameterCarrier};
use crate::config::SealConfig;
use crate::container::{AlgorithmContainer, encrypt_with_policy};
use crate::context::RestoreContext;
use crate::error::{SealError, SealResult};
use crate::registry::ColumnRegistry;
use crate::task::{EncryptionTask, RestoreTask};
use crate::value::Value;

pub struct EncryptionOrchestrator {
    registry: Arc<ColumnRegistry>,
    container: Arc<AlgorithmContainer>,
    analyzer: Arc<dyn SqlAnalyzer>,
    config: Arc<SealConfig>,
}

impl EncryptionOrchestrator {
    pub fn new(
        registry: Arc<ColumnRegistry>,
        container: Arc<AlgorithmContainer>,
        analyzer: Arc<dyn SqlAnalyzer>,
        config: Arc<SealConfig>,
    ) -> Self {
        Self {
            registry,
            container,
            analyzer,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ColumnRegistry> {
        &self.registry
    }

    pub fn container(&self) -> &Arc<AlgorithmContainer> {
        &self.container
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    /// Encrypts every parameter of `stmt` bound to an encrypted column and
    /// records how to undo it in `ctx`. Returns the number of parameters
    /// encrypted.
    ///
    /// Statements the analyzer cannot understand run unmodified. A failure
    /// while encrypting aborts the whole batch: parameters already
    /// encrypted are put back and nothing is recorded in `ctx`.
    pub fn apply(&self, ctx: &mut RestoreContext, stmt: &mut BoundStatement<'_>) -> SealResult<usize> {
        let stale = ctx.clear();
        if stale > 0 {
            warn!("discarded {stale} restore tasks left over from an unfinished statement");
        }

        self.registry.init()?;
        if self.config.skip_without_encrypted_columns && !self.registry.has_any_encrypted()? {
            return Ok(0);
        }
        let Some(carrier) = stmt.carrier.as_mut() else {
            return Ok(0);
        };
        if stmt.sql.trim().is_empty() {
            return Ok(0);
        }

        let (tables, bindings) = match self.analyze_sql(&stmt.sql) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("statement left unencrypted, SQL analysis failed: {e}");
                return Ok(0);
            }
        };
        if tables.is_empty() || bindings.is_empty() {
            return Ok(0);
        }

        let analyzer = ParameterAnalyzer::new(&self.registry, self.analyzer.as_ref(), &self.config);
        let tasks = match analyzer.analyze(&stmt.mappings, &bindings, &tables, carrier) {
            Ok(tasks) => tasks,
            Err(SealError::Analysis(e)) => {
                warn!("statement left unencrypted, dynamic query analysis failed: {e}");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        if tasks.is_empty() {
            return Ok(0);
        }

        let restores = self.encrypt_all(&tasks, carrier)?;
        let applied = restores.len();
        ctx.cache(restores);
        debug!("encrypted {applied} parameters");
        Ok(applied)
    }

    fn analyze_sql(&self, sql: &str) -> SealResult<(Vec<TableRef>, Vec<ParamBinding>)> {
        let tables = self.analyzer.tables(sql)?;
        let bindings = self.analyzer.param_bindings(sql)?;
        Ok((tables, bindings))
    }

    fn encrypt_all(
        &self,
        tasks: &[EncryptionTask],
        carrier: &mut ParameterCarrier<'_>,
    ) -> SealResult<Vec<RestoreTask>> {
        let mut restores = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Err(source) = self.encrypt_one(task, carrier) {
                rollback(&restores, carrier);
                return Err(SealError::Mutation {
                    table: task.table.clone(),
                    column: task.column.clone(),
                    source: Box::new(source),
                });
            }
            restores.push(task.restore_task());
        }
        Ok(restores)
    }

    fn encrypt_one(&self, task: &EncryptionTask, carrier: &mut ParameterCarrier<'_>) -> SealResult<()> {
        let algorithm = self.container.resolve(&task.algorithm)?;
        let ciphertext = encrypt_with_policy(algorithm.as_ref(), &task.original_value)?;
        task.locator.write(carrier, Value::Text(ciphertext))?;
        debug!("encrypted {}.{} at {}", task.table, task.column, task.locator);
        Ok(())
    }
}

fn rollback(applied: &[RestoreTask], carrier: &mut ParameterCarrier<'_>) {
    for task in applied.iter().rev() {
        if let Err(e) = task.apply(carrier) {
            error!("rollback of {} failed: {e}", task.locator);
        }
    }
}
