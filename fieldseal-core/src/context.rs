//! Scoped Restore Context.
//!
//! A [`RestoreContext`] belongs to one execution unit (a thread, a task, a
//! connection checkout) and carries the restore tasks recorded when
//! parameters were encrypted until the statement has run.

use tracing::{debug, error, warn};

use crate::carrier::{BoundStatement, ParameterCarrier};
use crate::error::{SealError, SealResult};
use crate::task::RestoreTask;

#[derive(Debug, Default)]
pub struct RestoreContext {
    pending: Vec<RestoreTask>,
}

impl RestoreContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `tasks` as the current scope. An empty list leaves the
    /// current scope untouched.
    pub fn cache(&mut self, tasks: Vec<RestoreTask>) {
        if tasks.is_empty() {
            return;
        }
        if !self.pending.is_empty() {
            warn!("replacing {} unrestored parameters", self.pending.len());
        }
        self.pending = tasks;
    }

    /// Applies every pending task in recording order and empties the scope.
    ///
    /// All tasks are attempted; the first failure is returned.
    pub fn restore_and_clear(&mut self, carrier: Option<&mut ParameterCarrier<'_>>) -> SealResult<()> {
        let tasks = std::mem::take(&mut self.pending);
        if tasks.is_empty() {
            return Ok(());
        }
        let Some(carrier) = carrier else {
            warn!("{} restore tasks dropped: statement has no parameters", tasks.len());
            return Ok(());
        };

        let mut first_error = None;
        for task in &tasks {
            match task.apply(carrier) {
                Ok(()) => debug!("restored {}", task.locator),
                Err(source) => {
                    error!("failed to restore {}: {source}", task.locator);
                    first_error.get_or_insert(SealError::Restore {
                        locator: task.locator.to_string(),
                        source,
                    });
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Discards the scope without restoring; returns how many tasks were
    /// dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending(&self) -> &[RestoreTask] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Restores a statement's parameters when dropped, including during
/// unwinding. Use [`finish`](Self::finish) to observe restore errors.
pub struct RestoreGuard<'g, 'a> {
    context: &'g mut RestoreContext,
    statement: &'g mut BoundStatement<'a>,
    done: bool,
}

impl<'g, 'a> RestoreGuard<'g, 'a> {
    pub fn new(context: &'g mut RestoreContext, statement: &'g mut BoundStatement<'a>) -> Self {
        Self {
            context,
            statement,
            done: false,
        }
    }

    /// The statement as it should be executed (parameters encrypted).
    pub fn statement(&self) -> &BoundStatement<'a> {
        &*self.statement
    }

    pub fn finish(mut self) -> SealResult<()> {
        self.done = true;
        self.restore()
    }

    fn restore(&mut self) -> SealResult<()> {
        self.context
            .restore_and_clear(self.statement.carrier.as_mut())
    }
}

impl Drop for RestoreGuard<'_, '_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.restore() {
            error!("restore on drop failed: {e}");
        }
    }
}
