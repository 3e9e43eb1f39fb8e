// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mutual-exclusion lock over one condition of one object.
//!
//! A [`Lock`] owns a single condition type while a [`Task`] runs, then commits the
//! task's outcome with one versioned status write:
//!
//! - task succeeds: its returned condition is written to the ledger
//! - task fails: the condition is forced to `Error` with the error text as reason,
//!   whatever the task tried to set
//! - the write hits a stale `resourceVersion`: nothing is persisted, the in-memory
//!   object is restored and [`LockError::Conflict`] is returned so the caller requeues
//!
//! When the ledger and the rest of the status are unchanged after the task, no write
//! happens at all.
//!
//! Exclusivity per object comes from the controller runtime, which never reconciles
//! the same object twice concurrently; across processes it comes from the
//! `resourceVersion` precondition.

use crate::crd::{Condition, ConditionStatus, Conditional};
use crate::dns_errors::{LockError, StoreError};
use crate::reconcilers::status::{find_condition, set_condition};
use crate::store::{ObjectStore, StoreObject};
use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Work executed while holding a [`Lock`].
///
/// The task receives the object (it may mutate other status fields on it) and the
/// current condition, and returns the condition to commit.
#[async_trait]
pub trait Task<K>: Send {
    async fn run(&mut self, obj: &mut K, condition: Condition) -> anyhow::Result<Condition>;
}

/// Exclusive handle on one condition type of an object.
pub struct Lock<'a, K: StoreObject> {
    store: &'a dyn ObjectStore<K>,
    condition: Condition,
}

impl<'a, K> Lock<'a, K>
where
    K: StoreObject + Conditional,
{
    /// Take the lock for `condition_type` on `obj`.
    ///
    /// When the ledger has no such entry, the lock starts from a fresh `Initialized`
    /// condition. It is not persisted until [`Lock::execute`] commits.
    pub fn new(store: &'a dyn ObjectStore<K>, obj: &K, condition_type: &str) -> Self {
        let condition = find_condition(obj.conditions(), condition_type)
            .cloned()
            .unwrap_or_else(|| Condition::initialized(condition_type));
        Self { store, condition }
    }

    /// Condition as last observed or committed by this lock
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Run `task` and commit its outcome.
    ///
    /// On success `obj` is replaced by the persisted object.
    ///
    /// # Errors
    ///
    /// - [`LockError::Conflict`] when the status write (or the task) hit a version
    ///   conflict. Nothing was persisted.
    /// - [`LockError::Task`] when the task failed. The `Error` condition was persisted.
    /// - [`LockError::Store`] when the status write failed for another reason.
    pub async fn execute<T>(&mut self, obj: &mut K, task: &mut T) -> Result<(), LockError>
    where
        T: Task<K> + ?Sized,
    {
        let condition_type = self.condition.r#type.clone();
        let snapshot = obj.clone();
        let before = status_of(obj);

        let (mut next, task_error) = match task.run(obj, self.condition.clone()).await {
            Ok(condition) => (condition, None),
            Err(err) if is_conflict(&err) => {
                *obj = snapshot;
                return Err(self.conflict(obj));
            }
            Err(err) => {
                *obj = snapshot.clone();
                let mut failed = self.condition.clone();
                failed.status = ConditionStatus::Error;
                failed.reason = format!("{err:#}");
                (failed, Some(err))
            }
        };
        next.r#type.clone_from(&condition_type);
        set_condition(obj.conditions_mut(), next);

        if status_of(obj) == before {
            debug!(
                resource = %obj.name_any(),
                condition = %condition_type,
                "Condition unchanged, skipping status write"
            );
            self.refresh(obj);
            return task_error.map_or(Ok(()), |e| Err(LockError::Task(e)));
        }

        match self.store.update_status(obj).await {
            Ok(persisted) => {
                *obj = persisted;
                self.refresh(obj);
                info!(
                    resource = %obj.name_any(),
                    condition = %condition_type,
                    status = %self.condition.status,
                    reason = %self.condition.reason,
                    "Committed condition"
                );
                task_error.map_or(Ok(()), |e| Err(LockError::Task(e)))
            }
            Err(StoreError::Conflict { .. }) => {
                *obj = snapshot;
                Err(self.conflict(obj))
            }
            Err(source) => {
                *obj = snapshot;
                if let Some(e) = &task_error {
                    warn!(condition = %condition_type, error = %e, "Task error could not be persisted");
                }
                Err(LockError::Store {
                    condition: condition_type,
                    source,
                })
            }
        }
    }

    fn refresh(&mut self, obj: &K) {
        if let Some(current) = find_condition(obj.conditions(), &self.condition.r#type) {
            self.condition = current.clone();
        }
    }

    fn conflict(&self, obj: &K) -> LockError {
        debug!(
            resource = %obj.name_any(),
            condition = %self.condition.r#type,
            "Conflict while committing condition"
        );
        crate::metrics::record_lock_conflict(&K::kind(&()));
        LockError::Conflict {
            condition: self.condition.r#type.clone(),
        }
    }
}

fn status_of<K: StoreObject>(obj: &K) -> Value {
    serde_json::to_value(obj)
        .ok()
        .and_then(|v| v.get("status").cloned())
        .unwrap_or(Value::Null)
}

/// `true` when an error chain contains a store conflict.
pub(crate) fn is_conflict(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_conflict)
            || cause
                .downcast_ref::<LockError>()
                .is_some_and(LockError::is_conflict)
    })
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod lock_tests;
