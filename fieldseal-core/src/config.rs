//! Pipeline configuration.

use std::path::Path;

use fieldseal_crypto::AlgorithmId;
use serde::{Deserialize, Serialize};

use crate::error::{SealError, SealResult};
use crate::naming::IdentifierCase;

/// Configuration for the encryption pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    /// Algorithm used for registry misses and for markers without an
    /// explicit algorithm.
    pub default_algorithm: AlgorithmId,

    /// How the backend folds unquoted identifiers.
    pub identifier_case: IdentifierCase,

    /// Map keys whose value is a dynamic query builder.
    pub wrapper_keys: Vec<String>,

    /// A map key containing this substring also marks a dynamic query.
    pub wrapper_marker: String,

    /// Prefix of the builder's synthetic parameter names.
    pub synthetic_param_prefix: String,

    /// Table used to wrap a bare condition fragment into a statement.
    pub dummy_table: String,

    /// Skip SQL analysis entirely when no column is encrypted.
    pub skip_without_encrypted_columns: bool,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            default_algorithm: AlgorithmId::default_algorithm(),
            identifier_case: IdentifierCase::Lower,
            wrapper_keys: vec!["ew".to_string()],
            wrapper_marker: "paramNameValuePairs".to_string(),
            synthetic_param_prefix: "MPGENVAL".to_string(),
            dummy_table: "fieldseal_dummy".to_string(),
            skip_without_encrypted_columns: true,
        }
    }
}

impl SealConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> SealResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SealError::Configuration(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> SealResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SealError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> SealResult<()> {
        if self.default_algorithm.as_str().trim().is_empty() {
            return Err(SealError::Configuration(
                "default_algorithm must not be empty".to_string(),
            ));
        }
        if self.default_algorithm.is_abstract() {
            return Err(SealError::Configuration(format!(
                "default_algorithm cannot be the abstract identifier `{}`",
                self.default_algorithm
            )));
        }
        if self.wrapper_keys.iter().any(|k| k.is_empty()) {
            return Err(SealError::Configuration(
                "wrapper_keys must not contain empty keys".to_string(),
            ));
        }
        if self.dummy_table.trim().is_empty() {
            return Err(SealError::Configuration(
                "dummy_table must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a parameter map has the shape of a dynamic query carrier.
    pub fn is_dynamic_query_map<'k>(&self, mut keys: impl Iterator<Item = &'k String>) -> bool {
        keys.any(|k| {
            self.wrapper_keys.iter().any(|w| w == k)
                || (!self.wrapper_marker.is_empty() && k.contains(&self.wrapper_marker))
        })
    }
}
