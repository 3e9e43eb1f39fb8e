// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Versioned object store used by every reconciler.
//!
//! Reconcilers never talk to `kube::Api` directly. They go through [`ObjectStore`],
//! which exposes the small set of operations the condition ledger needs, with
//! optimistic concurrency on every write:
//!
//! - [`ObjectStore::update`] replaces metadata and spec, guarded by `resourceVersion`
//! - [`ObjectStore::update_status`] replaces the status, guarded by `resourceVersion`
//! - a stale `resourceVersion` fails with [`StoreError::Conflict`]
//!
//! Two implementations exist: [`KubeStore`] backed by the Kubernetes API server and
//! [`MemoryStore`], an in-process double with the same semantics (finalizers, generation,
//! `generateName`, label filtering).

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

use crate::crd::{DNSIntegration, DNSRecord};
use crate::dns_errors::StoreError;
use kube::{Api, Client, Resource};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Resource types that can be kept in an [`ObjectStore`].
///
/// `api` hides the namespaced/cluster scope split of `kube::Api`.
pub trait StoreObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Build an API handle for this kind, scoped to `namespace` when the kind is namespaced
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

impl StoreObject for DNSRecord {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

impl StoreObject for DNSIntegration {
    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }
}

impl StoreObject for Deployment {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

/// Filter for [`ObjectStore::list`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Restrict to one namespace. `None` lists across all namespaces.
    pub namespace: Option<String>,
    /// Every label must be present with the given value.
    pub labels: BTreeMap<String, String>,
}

impl ListFilter {
    /// Match everything
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a namespace
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Require a label
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Kubernetes label selector string (`k1=v1,k2=v2`)
    #[must_use]
    pub fn label_selector(&self) -> Option<String> {
        if self.labels.is_empty() {
            return None;
        }
        Some(
            self.labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// `true` when `labels` satisfy this filter's label requirements
    #[must_use]
    pub fn matches_labels(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Minimal versioned store contract.
///
/// All writes return the object as persisted, including its new `resourceVersion`.
#[async_trait]
pub trait ObjectStore<K: StoreObject>: Send + Sync {
    /// Fetch an object by namespace (ignored for cluster-scoped kinds) and name
    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<K, StoreError>;

    /// List objects matching `filter`
    async fn list(&self, filter: &ListFilter) -> Result<Vec<K>, StoreError>;

    /// Create an object. `metadata.generateName` is honoured when `name` is unset.
    async fn create(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace metadata and spec. Fails with a conflict on a stale `resourceVersion`.
    async fn update(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace the status subresource. Fails with a conflict on a stale `resourceVersion`.
    async fn update_status(&self, obj: &K) -> Result<K, StoreError>;

    /// Request deletion. Objects with finalizers are only marked for deletion.
    async fn delete(&self, namespace: Option<&str>, name: &str) -> Result<(), StoreError>;
}

/// Kind name of `K`, for error messages and logs
pub(crate) fn kind_of<K: StoreObject>() -> String {
    K::kind(&()).to_string()
}
