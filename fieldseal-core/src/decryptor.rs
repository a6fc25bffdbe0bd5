//! Result Decryptor: the post-execution half of the pipeline.
//!
//! Walks a result graph depth-first, decrypting every text field whose
//! descriptor carries an [`EncryptedMarker`](crate::value::EncryptedMarker).
//! Lists and maps are descended element by element; scalars terminate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use fieldseal_crypto::AlgorithmId;
use tracing::{debug, trace};

use crate::container::{AlgorithmContainer, decrypt_with_policy};
use crate::error::SealResult;
use crate::value::{EncryptedMarker, FieldDef, Record, RecordType, Value, lock_record};

/// One encrypted field met during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedFieldRef {
    /// Type owning the field.
    pub owner: String,
    pub field: String,
    pub marker: EncryptedMarker,
    /// Location below the root, e.g. `orders[2].customer.phone`.
    pub path: String,
}

#[derive(Debug, Default)]
struct Walk {
    visited: HashSet<usize>,
    annotated: usize,
    decrypted: usize,
}

pub struct ResultDecryptor {
    container: Arc<AlgorithmContainer>,
    default_algorithm: AlgorithmId,
    plain_types: RwLock<HashSet<String>>,
    field_plans: RwLock<HashMap<String, Arc<[FieldDef]>>>,
    scans: AtomicU64,
}

impl ResultDecryptor {
    pub fn new(container: Arc<AlgorithmContainer>) -> Self {
        Self {
            container,
            default_algorithm: AlgorithmId::default_algorithm(),
            plain_types: RwLock::new(HashSet::new()),
            field_plans: RwLock::new(HashMap::new()),
            scans: AtomicU64::new(0),
        }
    }

    /// Algorithm used for markers naming the abstract algorithm.
    pub fn default_algorithm(mut self, id: AlgorithmId) -> Self {
        self.default_algorithm = id;
        self
    }

    /// Decrypts one result in place. Returns the number of fields decrypted.
    pub fn decrypt_one(&self, result: &mut Value) -> SealResult<usize> {
        if let Some(name) = root_type(result) {
            if self.is_known_plain(&name) {
                trace!("skipping {name}: no encrypted fields");
                return Ok(0);
            }
        }
        self.scans.fetch_add(1, Ordering::Relaxed);
        let mut walk = Walk::default();
        self.walk_value(result, "", &mut walk)?;
        if walk.annotated > 0 {
            debug!("decrypted {} of {} encrypted fields", walk.decrypted, walk.annotated);
        }
        Ok(walk.decrypted)
    }

    /// Decrypts every result of a list query.
    pub fn decrypt_many(&self, results: &mut [Value]) -> SealResult<usize> {
        let mut total = 0;
        for result in results {
            total += self.decrypt_one(result)?;
        }
        Ok(total)
    }

    pub fn decrypt_record(&self, record: &mut Record) -> SealResult<usize> {
        if self.is_known_plain(record.record_type().name()) {
            return Ok(0);
        }
        self.scans.fetch_add(1, Ordering::Relaxed);
        let mut walk = Walk::default();
        self.walk_record(record, "", &mut walk)?;
        Ok(walk.decrypted)
    }

    /// Encrypted fields reachable from `result`, without decrypting.
    pub fn annotated_fields(&self, result: &Value) -> Vec<AnnotatedFieldRef> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        collect_annotated(result, "", &mut visited, &mut out);
        out
    }

    /// Number of full walks performed; cached plain types are not walked.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn is_known_plain(&self, type_name: &str) -> bool {
        self.plain_types
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains(type_name)
    }

    pub fn clear_caches(&self) {
        self.plain_types.write().unwrap_or_else(|p| p.into_inner()).clear();
        self.field_plans.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    fn walk_value(&self, value: &mut Value, path: &str, walk: &mut Walk) -> SealResult<()> {
        match value {
            Value::Record(record) => self.walk_record(record, path, walk),
            Value::Shared(shared) => {
                let id = Arc::as_ptr(shared) as *const () as usize;
                if !walk.visited.insert(id) {
                    return Ok(());
                }
                let mut record = lock_record(shared);
                self.walk_record(&mut record, path, walk)
            }
            Value::List(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    if item.is_composite() {
                        self.walk_value(item, &format!("{path}[{i}]"), walk)?;
                    }
                }
                Ok(())
            }
            Value::Map(map) => {
                for (key, item) in map.iter_mut() {
                    if item.is_composite() {
                        self.walk_value(item, &format!("{path}[{key}]"), walk)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn walk_record(&self, record: &mut Record, path: &str, walk: &mut Walk) -> SealResult<()> {
        let ty = Arc::clone(record.record_type());
        if self.is_known_plain(ty.name()) {
            return Ok(());
        }
        let before = walk.annotated;
        // Set when a slot's runtime value leaves open whether another
        // instance of the type could carry records there.
        let mut open_slot = false;

        for field in self.field_plan(&ty).iter() {
            let field_path = join(path, &field.name);
            let Some(slot) = record.field_mut(&field.name) else {
                continue;
            };
            if slot.is_composite() || slot.is_null() {
                open_slot = true;
            }
            if let Some(marker) = &field.encrypted {
                walk.annotated += 1;
                if let Value::Text(text) = slot {
                    let algorithm = if marker.algorithm.is_abstract() {
                        self.container.resolve(&self.default_algorithm)?
                    } else {
                        self.container.resolve(&marker.algorithm)?
                    };
                    *text = decrypt_with_policy(algorithm.as_ref(), text)?;
                    walk.decrypted += 1;
                    trace!("decrypted {field_path}");
                }
                continue;
            }
            if slot.is_composite() {
                self.walk_value(slot, &field_path, walk)?;
            }
        }

        if walk.annotated == before && !open_slot && is_plain_type(&ty) {
            self.plain_types
                .write()
                .unwrap_or_else(|p| p.into_inner())
                .insert(ty.name().to_string());
        }
        Ok(())
    }

    /// Non-transient fields of `ty`, cached per type.
    fn field_plan(&self, ty: &RecordType) -> Arc<[FieldDef]> {
        if let Some(plan) = self
            .field_plans
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(ty.name())
        {
            return Arc::clone(plan);
        }
        let plan: Arc<[FieldDef]> = ty.fields().iter().filter(|f| !f.transient).cloned().collect();
        self.field_plans
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(ty.name().to_string(), Arc::clone(&plan));
        plan
    }
}

/// Static half of the plain-type test: no encrypted or nested fields and
/// not a generic container. The walk adds the runtime half, since an
/// undeclared field may still hold a list or map of records.
fn is_plain_type(ty: &RecordType) -> bool {
    !ty.is_generic()
        && ty
            .fields()
            .iter()
            .all(|f| f.encrypted.is_none() && !f.nested)
}

fn root_type(value: &Value) -> Option<String> {
    match value {
        Value::Record(r) => Some(r.record_type().name().to_string()),
        Value::Shared(s) => Some(lock_record(s).record_type().name().to_string()),
        _ => None,
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn collect_annotated(
    value: &Value,
    path: &str,
    visited: &mut HashSet<usize>,
    out: &mut Vec<AnnotatedFieldRef>,
) {
    match value {
        Value::Record(record) => collect_record(record, path, visited, out),
        Value::Shared(shared) => {
            if visited.insert(Arc::as_ptr(shared) as *const () as usize) {
                collect_record(&lock_record(shared), path, visited, out);
            }
        }
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_annotated(item, &format!("{path}[{i}]"), visited, out);
            }
        }
        Value::Map(map) => {
            for (key, item) in map {
                collect_annotated(item, &format!("{path}[{key}]"), visited, out);
            }
        }
        _ => {}
    }
}

fn collect_record(
    record: &Record,
    path: &str,
    visited: &mut HashSet<usize>,
    out: &mut Vec<AnnotatedFieldRef>,
) {
    let ty = record.record_type();
    for field in ty.fields().iter().filter(|f| !f.transient) {
        let field_path = join(path, &field.name);
        match (&field.encrypted, record.field(&field.name)) {
            (Some(marker), _) => out.push(AnnotatedFieldRef {
                owner: ty.name().to_string(),
                field: field.name.clone(),
                marker: marker.clone(),
                path: field_path,
            }),
            (None, Some(child)) => collect_annotated(child, &field_path, visited, out),
            (None, None) => {}
        }
    }
}
