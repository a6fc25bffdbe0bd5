//! Parameter Analyzer: decides which parameters of a statement must be
//! encrypted, and where they live.
//!
//! Matching a parameter to a column happens in three steps:
//! 1. the column bound at the parameter's placeholder position,
//! 2. the cleaned parameter name against every table, trying the raw,
//!    snake_case and camelCase forms,
//! 3. any bound column whose name matches the parameter name.

use std::collections::HashSet;

use fieldseal_crypto::AlgorithmId;
use fieldseal_sql::{ParamBinding, SqlAnalyzer, TableRef};
use tracing::debug;

use crate::carrier::{ParameterCarrier, ParameterMapping};
use crate::config::SealConfig;
use crate::error::SealResult;
use crate::naming::{clean_parameter_name, extract_field_name, name_variants, names_match};
use crate::registry::ColumnRegistry;
use crate::task::{EncryptionTask, Locator};
use crate::value::{DynamicQuery, ParamMap, Record, Value, get_path, get_record_path};

/// A parameter resolved to an encrypted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    pub table: String,
    pub column: String,
    pub algorithm: AlgorithmId,
}

pub struct ParameterAnalyzer<'r> {
    registry: &'r ColumnRegistry,
    sql: &'r dyn SqlAnalyzer,
    config: &'r SealConfig,
}

impl<'r> ParameterAnalyzer<'r> {
    pub fn new(registry: &'r ColumnRegistry, sql: &'r dyn SqlAnalyzer, config: &'r SealConfig) -> Self {
        Self {
            registry,
            sql,
            config,
        }
    }

    /// Encryption tasks for every text parameter bound to an encrypted
    /// column. The carrier is only read.
    pub fn analyze(
        &self,
        mappings: &[ParameterMapping],
        bindings: &[ParamBinding],
        tables: &[TableRef],
        carrier: &ParameterCarrier<'_>,
    ) -> SealResult<Vec<EncryptionTask>> {
        match carrier {
            ParameterCarrier::DynamicQuery {
                params,
                wrapper_key,
            } => self.analyze_dynamic_query(params, wrapper_key.as_deref(), bindings, tables),
            ParameterCarrier::Map(map) => self.analyze_map(map, mappings, bindings, tables),
            ParameterCarrier::Object(record) => self.analyze_object(record, mappings, bindings, tables),
        }
    }

    fn analyze_dynamic_query(
        &self,
        params: &ParamMap,
        wrapper_key: Option<&str>,
        bindings: &[ParamBinding],
        tables: &[TableRef],
    ) -> SealResult<Vec<EncryptionTask>> {
        let Some(wrapper_key) = wrapper_key else {
            debug!("dynamic query carrier without wrapper object, nothing to encrypt");
            return Ok(Vec::new());
        };
        let Some(Value::Query(query)) = params.get(wrapper_key) else {
            debug!("dynamic query wrapper `{wrapper_key}` missing or not a query");
            return Ok(Vec::new());
        };
        if query.params.is_empty() || query.sql_segment.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks = Vec::new();
        for (param_name, column) in self.synthetic_columns(query)? {
            let Some(Value::Text(text)) = query.params.get(&param_name) else {
                continue;
            };
            if let Some(m) = self.match_parameter_to_table_field(&column, bindings, tables)? {
                debug!("dynamic query parameter {param_name} bound to {}.{}", m.table, m.column);
                tasks.push(EncryptionTask {
                    table: m.table,
                    column: m.column,
                    original_value: text.clone(),
                    algorithm: m.algorithm,
                    locator: Locator::DynamicQuery {
                        wrapper_key: wrapper_key.to_string(),
                        param_name,
                    },
                });
            }
        }
        Ok(tasks)
    }

    /// Re-analyses the builder's condition fragment as a full statement and
    /// pairs each synthetic parameter name with its column.
    fn synthetic_columns(&self, query: &DynamicQuery) -> SealResult<Vec<(String, String)>> {
        let fragment = query.sql_segment.trim();
        let fragment = strip_keyword(fragment, "WHERE").unwrap_or(fragment);
        let sql = if strip_keyword(fragment, "SELECT").is_some() {
            fragment.to_string()
        } else {
            format!("SELECT * FROM {} WHERE {fragment}", self.config.dummy_table)
        };

        let pairs = self
            .sql
            .param_bindings(&sql)?
            .into_iter()
            .filter(|b| !b.column.is_empty())
            .map(|b| {
                let name = match b.placeholder.as_deref() {
                    Some(p) if !p.is_empty() => extract_field_name(p).to_string(),
                    _ => format!("{}{}", self.config.synthetic_param_prefix, b.index + 1),
                };
                (name, b.column_name().to_string())
            })
            .collect();
        Ok(pairs)
    }

    fn analyze_map(
        &self,
        map: &ParamMap,
        mappings: &[ParameterMapping],
        bindings: &[ParamBinding],
        tables: &[TableRef],
    ) -> SealResult<Vec<EncryptionTask>> {
        let mut tasks = Vec::new();
        let mut seen = HashSet::new();

        for (position, mapping) in mappings.iter().enumerate() {
            let property = mapping.property.as_str();
            if !seen.insert(property) {
                continue;
            }
            let value = get_path(map, property)
                .ok()
                .or_else(|| map.get(property).cloned());
            let Some(Value::Text(text)) = value else {
                continue;
            };
            if let Some(m) = self.match_parameter_to_sql_field(property, position, bindings, tables)? {
                debug!("parameter {property} bound to {}.{}", m.table, m.column);
                tasks.push(task(m, text, Locator::Map {
                    key: property.to_string(),
                }));
            }
        }

        // Entries the statement did not declare, e.g. extra named parameters.
        for (key, value) in map {
            if seen.contains(key.as_str()) {
                continue;
            }
            let Value::Text(text) = value else {
                continue;
            };
            if let Some(m) = self.match_parameter_to_table_field(key, bindings, tables)? {
                debug!("undeclared parameter {key} bound to {}.{}", m.table, m.column);
                tasks.push(task(m, text.clone(), Locator::Map { key: key.clone() }));
            }
        }
        Ok(tasks)
    }

    fn analyze_object(
        &self,
        record: &Record,
        mappings: &[ParameterMapping],
        bindings: &[ParamBinding],
        tables: &[TableRef],
    ) -> SealResult<Vec<EncryptionTask>> {
        let mut tasks = Vec::new();
        let mut seen = HashSet::new();

        for (position, mapping) in mappings.iter().enumerate() {
            let property = mapping.property.as_str();
            if !seen.insert(property) {
                continue;
            }
            let Ok(Value::Text(text)) = get_record_path(record, property) else {
                continue;
            };
            if let Some(m) = self.match_parameter_to_sql_field(property, position, bindings, tables)? {
                debug!(
                    "{} property {property} bound to {}.{}",
                    record.record_type().name(),
                    m.table,
                    m.column
                );
                tasks.push(task(m, text, Locator::Object {
                    property: property.to_string(),
                }));
            }
        }
        Ok(tasks)
    }

    /// Position first, then the name heuristics.
    pub fn match_parameter_to_sql_field(
        &self,
        property: &str,
        position: usize,
        bindings: &[ParamBinding],
        tables: &[TableRef],
    ) -> SealResult<Option<ColumnMatch>> {
        if let Some(binding) = bindings.get(position).filter(|b| !b.column.is_empty()) {
            if let Some(m) = self.match_binding(binding, tables)? {
                return Ok(Some(m));
            }
        }
        self.match_parameter_to_table_field(extract_field_name(property), bindings, tables)
    }

    /// Name heuristics: every table in order with the raw, snake_case and
    /// camelCase forms, then any bound column with a matching name.
    pub fn match_parameter_to_table_field(
        &self,
        param_name: &str,
        bindings: &[ParamBinding],
        tables: &[TableRef],
    ) -> SealResult<Option<ColumnMatch>> {
        let name = clean_parameter_name(param_name);
        if name.is_empty() {
            return Ok(None);
        }
        for table in tables {
            if let Some(m) = self.lookup_variants(&table.name, name)? {
                return Ok(Some(m));
            }
        }
        for binding in bindings {
            if binding.column.is_empty() || !names_match(name, binding.column_name()) {
                continue;
            }
            if let Some(m) = self.match_binding(binding, tables)? {
                return Ok(Some(m));
            }
        }
        Ok(None)
    }

    fn match_binding(&self, binding: &ParamBinding, tables: &[TableRef]) -> SealResult<Option<ColumnMatch>> {
        let column = binding.column_name();
        let qualified: Vec<&TableRef> = match binding.qualifier() {
            Some(q) => tables.iter().filter(|t| t.answers_to(q)).collect(),
            None => Vec::new(),
        };
        let candidates: Vec<&TableRef> = if qualified.is_empty() {
            tables.iter().collect()
        } else {
            qualified
        };
        for table in candidates {
            if let Some(m) = self.lookup_variants(&table.name, column)? {
                return Ok(Some(m));
            }
        }
        Ok(None)
    }

    fn lookup_variants(&self, table: &str, name: &str) -> SealResult<Option<ColumnMatch>> {
        for variant in name_variants(name) {
            if let Some(algorithm) = self.registry.lookup(table, &variant)? {
                return Ok(Some(ColumnMatch {
                    table: table.to_string(),
                    column: variant,
                    algorithm,
                }));
            }
        }
        Ok(None)
    }
}

fn task(m: ColumnMatch, original_value: String, locator: Locator) -> EncryptionTask {
    EncryptionTask {
        table: m.table,
        column: m.column,
        original_value,
        algorithm: m.algorithm,
        locator,
    }
}

/// `fragment` without a leading `keyword`, if it starts with it.
fn strip_keyword<'s>(fragment: &'s str, keyword: &str) -> Option<&'s str> {
    let head = fragment.get(..keyword.len())?;
    let rest = &fragment[keyword.len()..];
    let boundary = rest.chars().next().is_none_or(|c| c.is_whitespace() || c == '(');
    (head.eq_ignore_ascii_case(keyword) && boundary).then(|| rest.trim_start())
}
