// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`ObjectStore`] with Kubernetes write semantics.
//!
//! Objects are kept as JSON so the store can treat metadata, spec and status the way
//! the API server does:
//!
//! - every write bumps `resourceVersion`; a stale version is a [`StoreError::Conflict`]
//! - `update` ignores status, `update_status` ignores everything but status
//! - `generation` increases only when the spec changes
//! - `generateName` gets a unique suffix
//! - deleting an object with finalizers only sets `deletionTimestamp`; the object is
//!   purged once an update leaves its finalizer list empty
//!
//! The controllers run against it in tests, and the solver endpoints can run against
//! it in a dry-run setup.

use super::{kind_of, ListFilter, ObjectStore, StoreObject};
use crate::dns_errors::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

type ObjectKey = (String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Value>,
    next_version: u64,
    next_uid: u64,
}

impl Inner {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn next_uid(&mut self) -> u64 {
        self.next_uid += 1;
        self.next_uid
    }
}

/// Versioned in-memory object store for one kind.
pub struct MemoryStore<K> {
    inner: Mutex<Inner>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StoreObject> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StoreObject> MemoryStore<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            _kind: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an object including its status, as if it had been reconciled before.
    ///
    /// # Errors
    ///
    /// Fails like [`ObjectStore::create`].
    pub fn seed(&self, obj: &K) -> Result<K, StoreError> {
        let value = serde_json::to_value(obj)?;
        let stored = self.insert(value, true)?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Number of objects currently stored, including ones pending deletion
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, mut value: Value, keep_status: bool) -> Result<Value, StoreError> {
        let mut inner = self.lock();
        let uid = inner.next_uid();

        if value.pointer("/metadata/name").and_then(Value::as_str).is_none() {
            let prefix = value
                .pointer("/metadata/generateName")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid::<K>("object has neither name nor generateName"))?
                .to_string();
            set_meta(&mut value, "name", Value::String(format!("{prefix}{uid:05x}")));
        }

        let key = key_of(&value);
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: kind_of::<K>(),
                name: key.1,
            });
        }

        let version = inner.bump_version();
        set_meta(&mut value, "uid", Value::String(format!("uid-{uid}")));
        set_meta(&mut value, "resourceVersion", Value::String(version));
        set_meta(&mut value, "generation", Value::from(1));
        set_meta(&mut value, "creationTimestamp", Value::String(timestamp()));
        remove_meta(&mut value, "deletionTimestamp");
        if !keep_status {
            remove_field(&mut value, "status");
        }

        inner.objects.insert(key, value.clone());
        Ok(value)
    }

    /// Apply `merge` to the stored copy of `incoming` under optimistic concurrency.
    fn write(
        &self,
        incoming: Value,
        merge: impl FnOnce(&Value, Value) -> Value,
    ) -> Result<Value, StoreError> {
        let key = key_of(&incoming);
        let mut inner = self.lock();

        let existing = inner
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: kind_of::<K>(),
                name: key.1.clone(),
            })?;

        if let Some(expected) = incoming
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
        {
            let current = existing
                .pointer("/metadata/resourceVersion")
                .and_then(Value::as_str);
            if current != Some(expected) {
                return Err(StoreError::Conflict {
                    kind: kind_of::<K>(),
                    name: key.1,
                });
            }
        }

        let mut updated = merge(&existing, incoming);
        let version = inner.bump_version();
        set_meta(&mut updated, "resourceVersion", Value::String(version));

        let deleting = updated.pointer("/metadata/deletionTimestamp").is_some();
        let finalizers_left = updated
            .pointer("/metadata/finalizers")
            .and_then(Value::as_array)
            .is_some_and(|f| !f.is_empty());

        if deleting && !finalizers_left {
            inner.objects.remove(&key);
        } else {
            inner.objects.insert(key, updated.clone());
        }
        Ok(updated)
    }
}

#[async_trait]
impl<K: StoreObject> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<K, StoreError> {
        let key = (namespace.unwrap_or_default().to_string(), name.to_string());
        let value = self
            .lock()
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: kind_of::<K>(),
                name: name.to_string(),
            })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<K>, StoreError> {
        let values: Vec<Value> = self
            .lock()
            .objects
            .iter()
            .filter(|((ns, _), _)| filter.namespace.as_deref().is_none_or(|want| want == ns))
            .filter(|(_, value)| {
                let labels: BTreeMap<String, String> = value
                    .pointer("/metadata/labels")
                    .cloned()
                    .and_then(|l| serde_json::from_value(l).ok())
                    .unwrap_or_default();
                filter.matches_labels(&labels)
            })
            .map(|(_, value)| value.clone())
            .collect();

        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let stored = self.insert(serde_json::to_value(obj)?, false)?;
        Ok(serde_json::from_value(stored)?)
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let stored = self.write(serde_json::to_value(obj)?, |existing, mut incoming| {
            let spec_changed = existing.get("spec") != incoming.get("spec");
            let generation = existing
                .pointer("/metadata/generation")
                .and_then(Value::as_i64)
                .unwrap_or(1);

            for field in ["uid", "creationTimestamp", "deletionTimestamp"] {
                match existing.pointer(&format!("/metadata/{field}")) {
                    Some(v) => set_meta(&mut incoming, field, v.clone()),
                    None => remove_meta(&mut incoming, field),
                }
            }
            let generation = if spec_changed { generation + 1 } else { generation };
            set_meta(&mut incoming, "generation", Value::from(generation));

            match existing.get("status") {
                Some(status) => incoming["status"] = status.clone(),
                None => remove_field(&mut incoming, "status"),
            }
            incoming
        })?;
        Ok(serde_json::from_value(stored)?)
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let stored = self.write(serde_json::to_value(obj)?, |existing, incoming| {
            let mut updated = existing.clone();
            match incoming.get("status") {
                Some(status) => updated["status"] = status.clone(),
                None => remove_field(&mut updated, "status"),
            }
            updated
        })?;
        Ok(serde_json::from_value(stored)?)
    }

    async fn delete(&self, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        let key = (namespace.unwrap_or_default().to_string(), name.to_string());
        let mut inner = self.lock();

        let Some(existing) = inner.objects.get(&key).cloned() else {
            return Err(StoreError::NotFound {
                kind: kind_of::<K>(),
                name: name.to_string(),
            });
        };

        let has_finalizers = existing
            .pointer("/metadata/finalizers")
            .and_then(Value::as_array)
            .is_some_and(|f| !f.is_empty());

        if !has_finalizers {
            inner.objects.remove(&key);
            return Ok(());
        }

        if existing.pointer("/metadata/deletionTimestamp").is_none() {
            let version = inner.bump_version();
            let mut marked = existing;
            set_meta(&mut marked, "deletionTimestamp", Value::String(timestamp()));
            set_meta(&mut marked, "resourceVersion", Value::String(version));
            inner.objects.insert(key, marked);
        }
        Ok(())
    }
}

fn set_meta(value: &mut Value, field: &str, v: Value) {
    value["metadata"][field] = v;
}

fn remove_meta(value: &mut Value, field: &str) {
    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove(field);
    }
}

fn remove_field(value: &mut Value, field: &str) {
    if let Some(obj) = value.as_object_mut() {
        obj.remove(field);
    }
}

fn key_of(value: &Value) -> ObjectKey {
    let field = |f: &str| {
        value
            .pointer(&format!("/metadata/{f}"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    (field("namespace"), field("name"))
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn invalid<K: StoreObject>(reason: &str) -> StoreError {
    StoreError::Invalid {
        kind: kind_of::<K>(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
