// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] for tests.
//!
//! Objects are kept as JSON keyed by (kind, namespace, name). The store
//! assigns `uid` and `resourceVersion`, rejects stale updates with a 409,
//! keeps `status` out of plain updates the way the API server does for kinds
//! with a status subresource, and counts every write per kind so tests can
//! assert that a pass issued no updates.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{api_error, ObjectStore, StoredObject};

/// Write verbs counted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Create,
    Update,
    Delete,
    UpdateStatus,
}

type ObjectKey = (String, String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Value>,
    next_version: u64,
    writes: BTreeMap<(String, Verb), usize>,
    failures: BTreeSet<(String, Verb)>,
}

impl Inner {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn record(&mut self, kind: &str, verb: Verb) -> Result<(), kube::Error> {
        if self.failures.contains(&(kind.to_string(), verb)) {
            return Err(api_error(
                500,
                "InternalError",
                format!("injected {verb:?} failure for {kind}"),
            ));
        }
        *self.writes.entry((kind.to_string(), verb)).or_default() += 1;
        Ok(())
    }
}

/// Shared, cloneable in-memory object store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn kind_of<K: StoredObject>() -> String {
    K::kind(&()).to_string()
}

fn key(kind: &str, namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        kind.to_string(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn to_value<K: StoredObject>(object: &K) -> Result<Value, kube::Error> {
    serde_json::to_value(object).map_err(kube::Error::SerdeError)
}

fn from_value<K: StoredObject>(value: Value) -> Result<K, kube::Error> {
    serde_json::from_value(value).map_err(kube::Error::SerdeError)
}

fn metadata_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get("metadata")?.get(field)?.as_str()
}

fn set_metadata(value: &mut Value, field: &str, content: String) {
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert(field.to_string(), Value::String(content));
    }
}

fn object_key<K: StoredObject>(value: &Value) -> Result<ObjectKey, kube::Error> {
    let name = metadata_str(value, "name")
        .ok_or_else(|| api_error(422, "Invalid", "metadata.name is required".to_string()))?;
    Ok(key(&kind_of::<K>(), metadata_str(value, "namespace"), name))
}

/// Equality-only label selector: `k=v,k2=v2`.
fn matches_selector(value: &Value, selector: &str) -> bool {
    let labels = value.get("metadata").and_then(|m| m.get("labels"));
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels
                .and_then(|l| l.get(k.trim()))
                .and_then(Value::as_str)
                == Some(v.trim()),
            None => labels.and_then(|l| l.get(term.trim())).is_some(),
        })
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite an object without counting a write.
    ///
    /// Used to seed fixtures and to simulate out-of-band changes by other actors.
    ///
    /// # Errors
    ///
    /// Returns an error when the object has no name or cannot be serialized.
    pub fn put<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error> {
        let mut value = to_value(object)?;
        let object_key = object_key::<K>(&value)?;
        let mut inner = self.lock();
        let uid = inner
            .objects
            .get(&object_key)
            .and_then(|existing| metadata_str(existing, "uid").map(str::to_string))
            .unwrap_or_else(|| format!("uid-{}", object_key.2));
        let version = inner.bump_version();
        set_metadata(&mut value, "uid", uid);
        set_metadata(&mut value, "resourceVersion", version);
        inner.objects.insert(object_key, value.clone());
        from_value(value)
    }

    /// Read an object synchronously.
    #[must_use]
    pub fn fetch<K: StoredObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let inner = self.lock();
        inner
            .objects
            .get(&key(&kind_of::<K>(), namespace, name))
            .cloned()
            .and_then(|value| from_value(value).ok())
    }

    /// Number of objects of a kind.
    #[must_use]
    pub fn count<K: StoredObject>(&self) -> usize {
        let kind = kind_of::<K>();
        self.lock()
            .objects
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    /// Writes of one verb issued for one kind.
    #[must_use]
    pub fn writes<K: StoredObject>(&self, verb: Verb) -> usize {
        self.lock()
            .writes
            .get(&(kind_of::<K>(), verb))
            .copied()
            .unwrap_or_default()
    }

    /// Writes of one verb across every kind.
    #[must_use]
    pub fn total_writes(&self, verb: Verb) -> usize {
        self.lock()
            .writes
            .iter()
            .filter(|((_, v), _)| *v == verb)
            .map(|(_, count)| count)
            .sum()
    }

    /// Forget every recorded write.
    pub fn reset_counts(&self) {
        self.lock().writes.clear();
    }

    /// Make every `verb` on kind `K` fail with a 500 until cleared.
    pub fn fail_on<K: StoredObject>(&self, verb: Verb) {
        self.lock().failures.insert((kind_of::<K>(), verb));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, kube::Error> {
        let value = self
            .lock()
            .objects
            .get(&key(&kind_of::<K>(), namespace, name))
            .cloned();
        value.map(from_value).transpose()
    }

    async fn list<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>, kube::Error> {
        let kind = kind_of::<K>();
        let values: Vec<Value> = self
            .lock()
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && namespace.is_none_or(|want| ns == want))
            .filter(|(_, value)| label_selector.is_none_or(|s| matches_selector(value, s)))
            .map(|(_, value)| value.clone())
            .collect();
        values.into_iter().map(from_value::<K>).collect()
    }

    async fn create<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error> {
        let mut value = to_value(object)?;
        let object_key = object_key::<K>(&value)?;
        let mut inner = self.lock();
        if inner.objects.contains_key(&object_key) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("{} \"{}\" already exists", object_key.0, object_key.2),
            ));
        }
        inner.record(&object_key.0, Verb::Create)?;
        let version = inner.bump_version();
        set_metadata(&mut value, "uid", format!("uid-{}", object_key.2));
        set_metadata(&mut value, "resourceVersion", version);
        inner.objects.insert(object_key, value.clone());
        from_value(value)
    }

    async fn update<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error> {
        let mut value = to_value(object)?;
        let object_key = object_key::<K>(&value)?;
        let mut inner = self.lock();
        let Some(existing) = inner.objects.get(&object_key).cloned() else {
            return Err(api_error(
                404,
                "NotFound",
                format!("{} \"{}\" not found", object_key.0, object_key.2),
            ));
        };
        if let Some(version) = metadata_str(&value, "resourceVersion") {
            if Some(version) != metadata_str(&existing, "resourceVersion") {
                return Err(api_error(
                    409,
                    "Conflict",
                    format!(
                        "operation cannot be fulfilled on {} \"{}\": the object has been modified",
                        object_key.0, object_key.2
                    ),
                ));
            }
        }
        inner.record(&object_key.0, Verb::Update)?;
        if let Some(map) = value.as_object_mut() {
            match existing.get("status") {
                Some(status) => {
                    map.insert("status".to_string(), status.clone());
                }
                None => {
                    map.remove("status");
                }
            }
        }
        let uid = metadata_str(&existing, "uid").unwrap_or_default().to_string();
        let version = inner.bump_version();
        set_metadata(&mut value, "uid", uid);
        set_metadata(&mut value, "resourceVersion", version);
        inner.objects.insert(object_key, value.clone());
        from_value(value)
    }

    async fn delete<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), kube::Error> {
        let kind = kind_of::<K>();
        let mut inner = self.lock();
        let object_key = key(&kind, namespace, name);
        if inner.objects.contains_key(&object_key) {
            inner.record(&kind, Verb::Delete)?;
            inner.objects.remove(&object_key);
        }
        Ok(())
    }

    async fn update_status<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error> {
        let value = to_value(object)?;
        let object_key = object_key::<K>(&value)?;
        let mut inner = self.lock();
        let Some(mut existing) = inner.objects.get(&object_key).cloned() else {
            return Err(api_error(
                404,
                "NotFound",
                format!("{} \"{}\" not found", object_key.0, object_key.2),
            ));
        };
        inner.record(&object_key.0, Verb::UpdateStatus)?;
        if let (Some(map), Some(status)) = (existing.as_object_mut(), value.get("status")) {
            map.insert("status".to_string(), status.clone());
        }
        let version = inner.bump_version();
        set_metadata(&mut existing, "resourceVersion", version);
        inner.objects.insert(object_key, existing.clone());
        from_value(existing)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
