//! Dynamic value model for statement parameters and query results.
//!
//! Records are instances of a [`RecordType`], an accessor table that
//! plays the part of runtime reflection: it lists the fields in
//! declaration order, marks encrypted ones and optionally registers
//! property getters and setters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use fieldseal_crypto::AlgorithmId;
use tracing::warn;

use crate::error::AccessError;
use crate::naming::{camel_to_snake, capitalize};

pub type ParamMap = BTreeMap<String, Value>;

/// A record reachable from several places in a graph.
pub type SharedRecord = Arc<Mutex<Record>>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Map(ParamMap),
    Record(Record),
    Shared(SharedRecord),
    Query(DynamicQuery),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn shared(record: Record) -> Self {
        Value::Shared(Arc::new(Mutex::new(record)))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value can contain further values.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Value::List(_) | Value::Map(_) | Value::Record(_) | Value::Shared(_) | Value::Query(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Shared(_) => "shared record",
            Value::Query(_) => "dynamic query",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Shared(a), Value::Shared(b)) => Arc::ptr_eq(a, b),
            (Value::Query(a), Value::Query(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<ParamMap> for Value {
    fn from(m: ParamMap) -> Self {
        Value::Map(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<DynamicQuery> for Value {
    fn from(q: DynamicQuery) -> Self {
        Value::Query(q)
    }
}

/// Locks a shared record, recovering from poisoning.
pub fn lock_record(record: &SharedRecord) -> MutexGuard<'_, Record> {
    record.lock().unwrap_or_else(|poisoned| {
        warn!("shared record mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

// ── Record descriptors ──────────────────────────────────────────

/// Marks a field as encrypted at rest with the named algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMarker {
    pub algorithm: AlgorithmId,
}

impl Default for EncryptedMarker {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmId::default_algorithm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// Column name when it differs from the field name.
    pub column: Option<String>,
    pub encrypted: Option<EncryptedMarker>,
    /// Transient fields are not persisted and never inspected for results.
    pub transient: bool,
    /// Declares that the field may hold records or collections.
    pub nested: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            encrypted: None,
            transient: false,
            nested: false,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = Some(EncryptedMarker::default());
        self
    }

    pub fn encrypted_with(mut self, algorithm: impl Into<AlgorithmId>) -> Self {
        self.encrypted = Some(EncryptedMarker {
            algorithm: algorithm.into(),
        });
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }

    /// Explicit column, else the field name as declared. Naming-convention
    /// differences are bridged at lookup time.
    pub fn column_name(&self) -> String {
        self.column.clone().unwrap_or_else(|| self.name.clone())
    }
}

pub type Getter = fn(&Record) -> Option<Value>;
pub type Setter = fn(&mut Record, Value) -> Result<(), AccessError>;

/// A registered property accessor. `getter` named `isActive` backs the
/// boolean property `active`.
#[derive(Clone)]
pub struct PropertyAccessor {
    pub name: String,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("name", &self.name)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// Describes one record type: its fields, table mapping and accessors.
///
/// Type names identify types in the decryptor's caches, so each distinct
/// type needs a distinct name.
#[derive(Debug, Clone)]
pub struct RecordType {
    name: String,
    table: Option<String>,
    fields: Vec<FieldDef>,
    generic: bool,
    accessors: Vec<PropertyAccessor>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
            generic: false,
            accessors: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Marks the type as a generic container whose contents vary by instance.
    pub fn generic(mut self) -> Self {
        self.generic = true;
        self
    }

    pub fn getter(mut self, property: impl Into<String>, getter: Getter) -> Self {
        self.accessor_mut(property.into()).getter = Some(getter);
        self
    }

    pub fn setter(mut self, property: impl Into<String>, setter: Setter) -> Self {
        self.accessor_mut(property.into()).setter = Some(setter);
        self
    }

    fn accessor_mut(&mut self, name: String) -> &mut PropertyAccessor {
        let idx = match self.accessors.iter().position(|a| a.name == name) {
            Some(idx) => idx,
            None => {
                self.accessors.push(PropertyAccessor {
                    name,
                    getter: None,
                    setter: None,
                });
                self.accessors.len() - 1
            }
        };
        &mut self.accessors[idx]
    }

    pub fn build(self) -> Arc<RecordType> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared table, or the snake_case type name.
    pub fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| camel_to_snake(&self.name))
    }

    pub fn has_table(&self) -> bool {
        self.table.is_some()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_generic(&self) -> bool {
        self.generic
    }

    fn accessor(&self, name: &str) -> Option<&PropertyAccessor> {
        self.accessors.iter().find(|a| a.name == name)
    }
}

// ── Records ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<RecordType>,
    values: BTreeMap<String, Value>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ty.name == other.ty.name && self.values == other.values
    }
}

impl Record {
    /// A record with every declared field set to `Null`.
    pub fn new(ty: Arc<RecordType>) -> Self {
        let values = ty
            .fields
            .iter()
            .map(|f| (f.name.clone(), Value::Null))
            .collect();
        Self { ty, values }
    }

    /// Builder-style field assignment; undeclared names are ignored.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        if let Some(slot) = self.values.get_mut(field) {
            *slot = value.into();
        }
        self
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    /// Writes a declared field directly, bypassing accessors.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<Value, AccessError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| AccessError::NoSuchProperty(format!("{}.{name}", self.ty.name)))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Reads a property: registered getter, then `is`-prefixed boolean
    /// getter, then the field itself.
    pub fn get_property(&self, name: &str) -> Option<Value> {
        if let Some(getter) = self.ty.accessor(name).and_then(|a| a.getter) {
            return getter(self);
        }
        let is_name = format!("is{}", capitalize(name));
        if let Some(getter) = self.ty.accessor(&is_name).and_then(|a| a.getter) {
            if let Some(value @ Value::Bool(_)) = getter(self) {
                return Some(value);
            }
        }
        self.values.get(name).cloned()
    }

    /// Writes a property through its setter, or the field directly.
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        if let Some(setter) = self.ty.accessor(name).and_then(|a| a.setter) {
            return setter(self, value);
        }
        self.set_field(name, value).map(|_| ())
    }
}

// ── Dynamic queries ─────────────────────────────────────────────

/// Condition fragment built by a query builder, with its bound values.
///
/// Conditions added with [`DynamicQuery::condition`] reference their value
/// as `#{ew.paramNameValuePairs.MPGENVAL<n>}`, the shape ORMs generate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicQuery {
    pub sql_segment: String,
    pub params: ParamMap,
}

impl DynamicQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segment(segment: impl Into<String>) -> Self {
        Self {
            sql_segment: segment.into(),
            params: ParamMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn condition(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        let name = format!("MPGENVAL{}", self.params.len() + 1);
        let clause = format!("{column} {op} #{{ew.paramNameValuePairs.{name}}}");
        if self.sql_segment.is_empty() {
            self.sql_segment = format!("({clause})");
        } else {
            let open = self.sql_segment.trim_end_matches(')').to_string();
            self.sql_segment = format!("{open} AND {clause})");
        }
        self.params.insert(name, value.into());
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.condition(column, "=", value)
    }
}

// ── Path access ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parses `a.b[2].c` into segments.
fn parse_path(path: &str) -> Result<Vec<Segment>, AccessError> {
    let malformed = || AccessError::MalformedPath(path.to_string());
    if path.is_empty() {
        return Err(malformed());
    }
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if key.is_empty() && (segments.is_empty() || rest.is_empty()) {
            return Err(malformed());
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(malformed)?;
            let index = rest[1..close].parse::<usize>().map_err(|_| malformed())?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(malformed());
            }
        }
    }
    Ok(segments)
}

const QUERY_PARAMS: &str = "paramNameValuePairs";

fn child_of(value: &Value, seg: &Segment, path: &str) -> Result<Value, AccessError> {
    let not_container = |s: &Segment| AccessError::NotAContainer {
        path: path.to_string(),
        segment: match s {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => format!("[{i}]"),
        },
    };
    match (value, seg) {
        (Value::Map(m), Segment::Key(k)) => m
            .get(k)
            .cloned()
            .ok_or_else(|| AccessError::NoSuchProperty(path.to_string())),
        (Value::List(l), Segment::Index(i)) => l.get(*i).cloned().ok_or_else(|| {
            AccessError::IndexOutOfBounds {
                path: path.to_string(),
                index: *i,
            }
        }),
        (Value::Record(r), Segment::Key(k)) => r
            .get_property(k)
            .ok_or_else(|| AccessError::NoSuchProperty(path.to_string())),
        (Value::Shared(s), Segment::Key(k)) => lock_record(s)
            .get_property(k)
            .ok_or_else(|| AccessError::NoSuchProperty(path.to_string())),
        (Value::Query(q), Segment::Key(k)) if k == QUERY_PARAMS => Ok(Value::Map(q.params.clone())),
        (Value::Query(q), Segment::Key(k)) if k == "sqlSegment" => {
            Ok(Value::Text(q.sql_segment.clone()))
        }
        _ => Err(not_container(seg)),
    }
}

/// Reads the value at `path` below `map`.
pub fn get_path(map: &ParamMap, path: &str) -> Result<Value, AccessError> {
    let segments = parse_path(path)?;
    let Some((Segment::Key(first), rest)) = segments.split_first() else {
        return Err(AccessError::MalformedPath(path.to_string()));
    };
    let mut current = map
        .get(first)
        .cloned()
        .ok_or_else(|| AccessError::NoSuchProperty(path.to_string()))?;
    for seg in rest {
        current = child_of(&current, seg, path)?;
    }
    Ok(current)
}

/// Reads the value at `path` below `record`.
pub fn get_record_path(record: &Record, path: &str) -> Result<Value, AccessError> {
    let segments = parse_path(path)?;
    let Some((Segment::Key(first), rest)) = segments.split_first() else {
        return Err(AccessError::MalformedPath(path.to_string()));
    };
    let mut current = record
        .get_property(first)
        .ok_or_else(|| AccessError::NoSuchProperty(path.to_string()))?;
    for seg in rest {
        current = child_of(&current, seg, path)?;
    }
    Ok(current)
}

/// Writes `value` at `path` below `map`, returning the previous value.
/// Intermediate containers must already exist.
pub fn set_path(map: &mut ParamMap, path: &str, value: Value) -> Result<Value, AccessError> {
    let segments = parse_path(path)?;
    set_in_map(map, &segments, value, path)
}

/// Writes `value` at `path` below `record`, returning the previous value.
pub fn set_record_path(record: &mut Record, path: &str, value: Value) -> Result<Value, AccessError> {
    let segments = parse_path(path)?;
    set_in_record(record, &segments, value, path)
}

fn set_in_map(
    map: &mut ParamMap,
    segments: &[Segment],
    value: Value,
    path: &str,
) -> Result<Value, AccessError> {
    let Some((Segment::Key(key), rest)) = segments.split_first() else {
        return Err(AccessError::NotAContainer {
            path: path.to_string(),
            segment: "map".to_string(),
        });
    };
    if rest.is_empty() {
        return Ok(map.insert(key.clone(), value).unwrap_or(Value::Null));
    }
    let child = map
        .get_mut(key)
        .ok_or_else(|| AccessError::NoSuchProperty(path.to_string()))?;
    set_in_value(child, rest, value, path)
}

fn set_in_record(
    record: &mut Record,
    segments: &[Segment],
    value: Value,
    path: &str,
) -> Result<Value, AccessError> {
    let Some((Segment::Key(key), rest)) = segments.split_first() else {
        return Err(AccessError::NotAContainer {
            path: path.to_string(),
            segment: record.ty.name.clone(),
        });
    };
    if rest.is_empty() {
        let previous = record.get_property(key).unwrap_or(Value::Null);
        record.set_property(key, value)?;
        return Ok(previous);
    }
    let child = record
        .field_mut(key)
        .ok_or_else(|| AccessError::NoSuchProperty(path.to_string()))?;
    set_in_value(child, rest, value, path)
}

fn set_in_value(
    target: &mut Value,
    segments: &[Segment],
    value: Value,
    path: &str,
) -> Result<Value, AccessError> {
    match target {
        Value::Map(m) => set_in_map(m, segments, value, path),
        Value::Record(r) => set_in_record(r, segments, value, path),
        Value::Shared(s) => set_in_record(&mut lock_record(s), segments, value, path),
        Value::List(items) => {
            let Some((Segment::Index(i), rest)) = segments.split_first() else {
                return Err(AccessError::NotAContainer {
                    path: path.to_string(),
                    segment: "list".to_string(),
                });
            };
            let slot = items.get_mut(*i).ok_or(AccessError::IndexOutOfBounds {
                path: path.to_string(),
                index: *i,
            })?;
            if rest.is_empty() {
                Ok(std::mem::replace(slot, value))
            } else {
                set_in_value(slot, rest, value, path)
            }
        }
        Value::Query(q) => match segments.split_first() {
            Some((Segment::Key(k), rest)) if k == QUERY_PARAMS && !rest.is_empty() => {
                set_in_map(&mut q.params, rest, value, path)
            }
            Some((Segment::Key(k), _)) => Err(AccessError::ReadOnly(format!("{path} ({k})"))),
            _ => Err(AccessError::MalformedPath(path.to_string())),
        },
        other => Err(AccessError::NotAContainer {
            path: path.to_string(),
            segment: other.kind().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user_type() -> Arc<RecordType> {
        RecordType::new("User")
            .table("user")
            .field(FieldDef::new("id"))
            .field(FieldDef::new("phoneNumber").encrypted())
            .field(FieldDef::new("active"))
            .field(FieldDef::new("address").nested())
            .build()
    }

    #[test]
    fn path_parsing() {
        assert_eq!(
            parse_path("a.b[2].c").unwrap(),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(2),
                Segment::Key("c".into()),
            ]
        );
        assert_eq!(
            parse_path("m[0][1]").unwrap(),
            vec![Segment::Key("m".into()), Segment::Index(0), Segment::Index(1)]
        );
        assert!(parse_path("").is_err());
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a[x]").is_err());
        assert!(parse_path("a[1").is_err());
        assert!(parse_path("a[1]b").is_err());
    }

    #[test]
    fn set_nested_map_and_list() {
        let mut inner = ParamMap::new();
        inner.insert("phone".into(), Value::text("1"));
        let mut map = ParamMap::new();
        map.insert(
            "list".into(),
            Value::List(vec![Value::Map(inner.clone()), Value::Map(inner)]),
        );

        let prev = set_path(&mut map, "list[1].phone", Value::text("2")).unwrap();
        assert_eq!(prev, Value::text("1"));
        assert_eq!(get_path(&map, "list[1].phone").unwrap(), Value::text("2"));
        assert_eq!(get_path(&map, "list[0].phone").unwrap(), Value::text("1"));
    }

    #[test]
    fn set_top_level_inserts_missing_key() {
        let mut map = ParamMap::new();
        let prev = set_path(&mut map, "phone", Value::text("x")).unwrap();
        assert_eq!(prev, Value::Null);
        assert_eq!(map.get("phone"), Some(&Value::text("x")));
    }

    #[test]
    fn missing_intermediate_is_an_error() {
        let mut map = ParamMap::new();
        let err = set_path(&mut map, "user.phone", Value::text("x")).unwrap_err();
        assert_eq!(err, AccessError::NoSuchProperty("user.phone".into()));
    }

    #[test]
    fn record_property_access_and_paths() {
        let mut map = ParamMap::new();
        map.insert(
            "user".into(),
            Record::new(user_type()).with("phoneNumber", "123").into(),
        );
        assert_eq!(get_path(&map, "user.phoneNumber").unwrap(), Value::text("123"));
        set_path(&mut map, "user.phoneNumber", Value::text("456")).unwrap();
        assert_eq!(get_path(&map, "user.phoneNumber").unwrap(), Value::text("456"));
        assert!(get_path(&map, "user.nope").is_err());
    }

    #[test]
    fn shared_record_is_written_through_the_lock() {
        let shared = Value::shared(Record::new(user_type()).with("phoneNumber", "1"));
        let mut map = ParamMap::new();
        map.insert("u".into(), shared.clone());
        set_path(&mut map, "u.phoneNumber", Value::text("2")).unwrap();
        let Value::Shared(rc) = shared else {
            panic!("expected shared record");
        };
        assert_eq!(lock_record(&rc).field("phoneNumber"), Some(&Value::text("2")));
    }

    #[test]
    fn getter_takes_priority_over_field() {
        let ty = RecordType::new("Masked")
            .field(FieldDef::new("phone"))
            .getter("phone", |_| Some(Value::text("from-getter")))
            .build();
        let record = Record::new(ty).with("phone", "from-field");
        assert_eq!(record.get_property("phone"), Some(Value::text("from-getter")));
    }

    #[test]
    fn is_getter_backs_boolean_property() {
        let ty = RecordType::new("Flagged")
            .field(FieldDef::new("enabled"))
            .getter("isActive", |r| {
                Some(Value::Bool(r.field("enabled") == Some(&Value::Bool(true))))
            })
            .build();
        let record = Record::new(ty).with("enabled", true);
        assert_eq!(record.get_property("active"), Some(Value::Bool(true)));
    }

    #[test]
    fn setter_takes_priority_over_field() {
        let ty = RecordType::new("Trimmed")
            .field(FieldDef::new("email"))
            .setter("email", |r, v| {
                let trimmed = v.as_str().map(|s| Value::text(s.trim())).unwrap_or(v);
                r.set_field("email", trimmed).map(|_| ())
            })
            .build();
        let mut record = Record::new(ty);
        record.set_property("email", Value::text("  a@b.c ")).unwrap();
        assert_eq!(record.field("email"), Some(&Value::text("a@b.c")));
    }

    #[test]
    fn undeclared_field_is_rejected() {
        let mut record = Record::new(user_type());
        assert!(matches!(
            record.set_property("nope", Value::Null),
            Err(AccessError::NoSuchProperty(_))
        ));
    }

    #[test]
    fn dynamic_query_builder_generates_synthetic_names() {
        let q = DynamicQuery::new()
            .eq("phone_number", "138")
            .condition("name", "LIKE", "%a%");
        assert_eq!(
            q.sql_segment,
            "(phone_number = #{ew.paramNameValuePairs.MPGENVAL1} AND name LIKE #{ew.paramNameValuePairs.MPGENVAL2})"
        );
        assert_eq!(q.params.get("MPGENVAL1"), Some(&Value::text("138")));
        assert_eq!(q.params.get("MPGENVAL2"), Some(&Value::text("%a%")));
    }

    #[test]
    fn dynamic_query_params_are_path_addressable() {
        let mut map = ParamMap::new();
        map.insert("ew".into(), DynamicQuery::new().eq("phone", "1").into());
        set_path(&mut map, "ew.paramNameValuePairs.MPGENVAL1", Value::text("2")).unwrap();
        assert_eq!(
            get_path(&map, "ew.paramNameValuePairs.MPGENVAL1").unwrap(),
            Value::text("2")
        );
        assert!(matches!(
            set_path(&mut map, "ew.sqlSegment", Value::text("x")),
            Err(AccessError::ReadOnly(_))
        ));
    }

    #[test]
    fn column_name_defaults_to_field_name() {
        assert_eq!(FieldDef::new("phoneNumber").column_name(), "phoneNumber");
        assert_eq!(FieldDef::new("phone").column("tel").column_name(), "tel");
        assert_eq!(RecordType::new("UserAccount").table_name(), "user_account");
    }
}
