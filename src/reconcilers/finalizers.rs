// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management over an [`ObjectStore`].
//!
//! Finalizers are written with a full update guarded by `resourceVersion`, so a
//! concurrent writer makes these calls fail with [`StoreError::Conflict`] instead of
//! silently overwriting the finalizer list.
//!
//! # Example
//!
//! ```rust,ignore
//! use phonebook::reconcilers::finalizers::{ensure_finalizer, has_finalizer};
//! use phonebook::labels::FINALIZER_DNS_RECORD;
//!
//! if !has_finalizer(&record, FINALIZER_DNS_RECORD) {
//!     ensure_finalizer(store, &record, FINALIZER_DNS_RECORD).await?;
//!     // requeue: resolution happens on the next pass
//! }
//! ```

use crate::dns_errors::StoreError;
use crate::store::{ObjectStore, StoreObject};
use kube::ResourceExt;
use tracing::info;

/// `true` when `resource` carries `finalizer`
#[must_use]
pub fn has_finalizer<K: ResourceExt>(resource: &K, finalizer: &str) -> bool {
    resource.finalizers().iter().any(|f| f == finalizer)
}

/// `true` when the store has marked `resource` for deletion
#[must_use]
pub fn is_deleting<K: ResourceExt>(resource: &K) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Add a finalizer to a resource if not already present.
///
/// Returns the object as persisted, or an unchanged copy when the finalizer was
/// already there.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] when the resource changed since it was read,
/// or any other store error from the update.
pub async fn ensure_finalizer<K>(
    store: &dyn ObjectStore<K>,
    resource: &K,
    finalizer: &str,
) -> Result<K, StoreError>
where
    K: StoreObject,
{
    if has_finalizer(resource, finalizer) {
        return Ok(resource.clone());
    }

    info!(
        "Adding finalizer {} to {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        K::kind(&())
    );

    let mut updated = resource.clone();
    updated.finalizers_mut().push(finalizer.to_string());
    store.update(&updated).await
}

/// Remove a finalizer from a resource.
///
/// When the resource is being deleted and this was its last finalizer, the store
/// purges it.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] when the resource changed since it was read,
/// or any other store error from the update.
pub async fn remove_finalizer<K>(
    store: &dyn ObjectStore<K>,
    resource: &K,
    finalizer: &str,
) -> Result<K, StoreError>
where
    K: StoreObject,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(resource.clone());
    }

    info!(
        "Removing finalizer {} from {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        K::kind(&())
    );

    let mut updated = resource.clone();
    updated.finalizers_mut().retain(|f| f != finalizer);
    store.update(&updated).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
