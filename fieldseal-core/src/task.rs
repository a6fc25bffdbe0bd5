//! Encryption and restore tasks, and the locators they write through.

use std::fmt;

use fieldseal_crypto::AlgorithmId;

use crate::carrier::ParameterCarrier;
use crate::error::AccessError;
use crate::value::{ParamMap, Value, get_path, get_record_path, set_path, set_record_path};

/// Addresses one parameter slot inside a [`ParameterCarrier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A key (or dotted path) of a map carrier.
    Map { key: String },
    /// A property (or dotted path) of an object carrier.
    Object { property: String },
    /// A synthetic parameter of the dynamic query stored under `wrapper_key`.
    DynamicQuery {
        wrapper_key: String,
        param_name: String,
    },
}

impl Locator {
    fn mismatch(&self, carrier: &ParameterCarrier<'_>) -> AccessError {
        AccessError::CarrierMismatch {
            locator: self.kind(),
            carrier: carrier.kind(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Locator::Map { .. } => "map",
            Locator::Object { .. } => "object",
            Locator::DynamicQuery { .. } => "dynamic query",
        }
    }

    /// Reads the slot. Map keys are tried as a path first, then literally.
    pub fn read(&self, carrier: &ParameterCarrier<'_>) -> Result<Value, AccessError> {
        let mismatch = self.mismatch(carrier);
        match (self, carrier) {
            (Locator::Map { key }, ParameterCarrier::Map(map))
            | (Locator::Map { key }, ParameterCarrier::DynamicQuery { params: map, .. }) => {
                match MapSlot::resolve(map, key)? {
                    MapSlot::Path(value) => Ok(value),
                    MapSlot::Literal => map
                        .get(key)
                        .cloned()
                        .ok_or_else(|| AccessError::NoSuchProperty(key.clone())),
                }
            }
            (Locator::Object { property }, ParameterCarrier::Object(record)) => {
                get_record_path(record, property)
            }
            (
                Locator::DynamicQuery {
                    wrapper_key,
                    param_name,
                },
                ParameterCarrier::DynamicQuery { params, .. },
            ) => match params.get(wrapper_key) {
                Some(Value::Query(query)) => query
                    .params
                    .get(param_name)
                    .cloned()
                    .ok_or_else(|| AccessError::NoSuchProperty(param_name.clone())),
                _ => Err(AccessError::MissingWrapper(wrapper_key.clone())),
            },
            _ => Err(mismatch),
        }
    }

    /// Overwrites the slot [`read`](Self::read) resolves to. The slot must
    /// already exist.
    pub fn write(&self, carrier: &mut ParameterCarrier<'_>, value: Value) -> Result<(), AccessError> {
        let mismatch = self.mismatch(carrier);
        match (self, carrier) {
            (Locator::Map { key }, ParameterCarrier::Map(map))
            | (Locator::Map { key }, ParameterCarrier::DynamicQuery { params: map, .. }) => {
                match MapSlot::resolve(map, key)? {
                    MapSlot::Path(_) => set_path(map, key, value).map(|_| ()),
                    MapSlot::Literal => {
                        map.insert(key.clone(), value);
                        Ok(())
                    }
                }
            }
            (Locator::Object { property }, ParameterCarrier::Object(record)) => {
                set_record_path(record, property, value).map(|_| ())
            }
            (
                Locator::DynamicQuery {
                    wrapper_key,
                    param_name,
                },
                ParameterCarrier::DynamicQuery { params, .. },
            ) => match params.get_mut(wrapper_key) {
                Some(Value::Query(query)) => {
                    query.params.insert(param_name.clone(), value);
                    Ok(())
                }
                _ => Err(AccessError::MissingWrapper(wrapper_key.clone())),
            },
            _ => Err(mismatch),
        }
    }
}

/// Where a map key points: a value reachable as a path, or an entry
/// whose key is the whole dotted string.
enum MapSlot {
    Path(Value),
    Literal,
}

impl MapSlot {
    fn resolve(map: &ParamMap, key: &str) -> Result<Self, AccessError> {
        match get_path(map, key) {
            Ok(value) => Ok(MapSlot::Path(value)),
            Err(_) if map.contains_key(key) => Ok(MapSlot::Literal),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Map { key } => write!(f, "map[{key}]"),
            Locator::Object { property } => write!(f, "object.{property}"),
            Locator::DynamicQuery {
                wrapper_key,
                param_name,
            } => write!(f, "{wrapper_key}.paramNameValuePairs[{param_name}]"),
        }
    }
}

/// One parameter to encrypt before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionTask {
    pub table: String,
    pub column: String,
    pub original_value: String,
    pub algorithm: AlgorithmId,
    pub locator: Locator,
}

impl EncryptionTask {
    /// The task that puts the original value back after execution.
    pub fn restore_task(&self) -> RestoreTask {
        RestoreTask {
            original_value: self.original_value.clone(),
            locator: self.locator.clone(),
        }
    }
}

/// Puts a plaintext value back into a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTask {
    pub original_value: String,
    pub locator: Locator,
}

impl RestoreTask {
    pub fn apply(&self, carrier: &mut ParameterCarrier<'_>) -> Result<(), AccessError> {
        self.locator
            .write(carrier, Value::Text(self.original_value.clone()))
    }
}
