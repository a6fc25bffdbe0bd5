//! Statement parameters as handed over by the host.

use crate::config::SealConfig;
use crate::value::{ParamMap, Record};

/// One declared placeholder binding: the property path the host reads the
/// value from, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMapping {
    pub property: String,
}

impl ParameterMapping {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

/// Builds mappings from a list of property names.
pub fn mappings<I, S>(properties: I) -> Vec<ParameterMapping>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    properties.into_iter().map(ParameterMapping::new).collect()
}

/// The object holding a statement's parameter values.
#[derive(Debug)]
pub enum ParameterCarrier<'a> {
    /// Named parameters.
    Map(&'a mut ParamMap),
    /// A single domain record.
    Object(&'a mut Record),
    /// Named parameters that include a dynamic query builder under
    /// `wrapper_key` (absent when only the marker key was seen).
    DynamicQuery {
        params: &'a mut ParamMap,
        wrapper_key: Option<String>,
    },
}

impl<'a> ParameterCarrier<'a> {
    /// Classifies a parameter map using the default configuration.
    pub fn from_map(map: &'a mut ParamMap) -> Self {
        Self::detect(map, &SealConfig::default())
    }

    /// Classifies a parameter map: any configured wrapper key, or a key
    /// containing the wrapper marker, makes it a dynamic-query carrier.
    pub fn detect(map: &'a mut ParamMap, config: &SealConfig) -> Self {
        if !config.is_dynamic_query_map(map.keys()) {
            return ParameterCarrier::Map(map);
        }
        let wrapper_key = config
            .wrapper_keys
            .iter()
            .find(|k| map.contains_key(k.as_str()))
            .cloned();
        ParameterCarrier::DynamicQuery {
            params: map,
            wrapper_key,
        }
    }

    pub fn object(record: &'a mut Record) -> Self {
        ParameterCarrier::Object(record)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParameterCarrier::Map(_) => "map",
            ParameterCarrier::Object(_) => "object",
            ParameterCarrier::DynamicQuery { .. } => "dynamic query",
        }
    }
}

/// A statement about to be executed.
#[derive(Debug)]
pub struct BoundStatement<'a> {
    pub sql: String,
    pub mappings: Vec<ParameterMapping>,
    pub carrier: Option<ParameterCarrier<'a>>,
}

impl<'a> BoundStatement<'a> {
    pub fn new(
        sql: impl Into<String>,
        mappings: Vec<ParameterMapping>,
        carrier: ParameterCarrier<'a>,
    ) -> Self {
        Self {
            sql: sql.into(),
            mappings,
            carrier: Some(carrier),
        }
    }

    /// A statement without parameters.
    pub fn bare(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            mappings: Vec::new(),
            carrier: None,
        }
    }
}
