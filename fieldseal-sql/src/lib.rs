//! SQL analysis for fieldseal.
//!
//! The middleware needs two facts about a statement: which tables it
//! touches, and which column each bound placeholder is compared with or
//! assigned to. [`SqlAnalyzer`] is that contract; hosts with a real SQL
//! parser implement it themselves. [`RegexSqlAnalyzer`] is a lightweight
//! implementation that understands the statement shapes ORMs generate
//! (`SELECT`/`UPDATE`/`DELETE` predicates, `SET` assignments and
//! `INSERT ... VALUES` column lists).

mod analyzer;
mod lexer;

pub use analyzer::RegexSqlAnalyzer;

use thiserror::Error;

/// Errors raised while analysing a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("empty SQL statement")]
    EmptySql,

    #[error("unable to parse SQL: {0}")]
    Parse(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// A table referenced by a statement, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Whether `qualifier` refers to this table by name or alias.
    pub fn answers_to(&self, qualifier: &str) -> bool {
        self.name.eq_ignore_ascii_case(qualifier)
            || self
                .alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
    }
}

/// The column bound to one placeholder.
///
/// `index` is the 0-based position of the placeholder in the statement.
/// `column` may be qualified (`u.phone`) and is empty when the analyzer
/// could not attribute the placeholder to a column. `placeholder` carries
/// the name of named placeholders (`:name`, `#{name}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub index: usize,
    pub column: String,
    pub placeholder: Option<String>,
}

impl ParamBinding {
    pub fn new(index: usize, column: impl Into<String>) -> Self {
        Self {
            index,
            column: column.into(),
            placeholder: None,
        }
    }

    pub fn named(index: usize, column: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            index,
            column: column.into(),
            placeholder: Some(placeholder.into()),
        }
    }

    /// Column name without its table qualifier.
    pub fn column_name(&self) -> &str {
        match self.column.rsplit_once('.') {
            Some((_, name)) => name,
            None => &self.column,
        }
    }

    /// Table qualifier of the column, if any.
    pub fn qualifier(&self) -> Option<&str> {
        self.column.rsplit_once('.').map(|(q, _)| q)
    }
}

/// Black-box SQL analysis used by the encryption pipeline.
pub trait SqlAnalyzer: Send + Sync {
    /// Tables referenced by `sql`, in declaration order, without duplicates.
    fn tables(&self, sql: &str) -> AnalysisResult<Vec<TableRef>>;

    /// Column bindings of every placeholder in `sql`, in placeholder order.
    fn param_bindings(&self, sql: &str) -> AnalysisResult<Vec<ParamBinding>>;
}
