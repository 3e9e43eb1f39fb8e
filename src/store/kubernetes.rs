// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] backed by the Kubernetes API server.

use super::{kind_of, ListFilter, ObjectStore, StoreObject};
use crate::dns_errors::StoreError;
use crate::reconcilers::pagination::list_all_paginated;
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde_json::{json, Value};
use std::marker::PhantomData;
use tracing::debug;

/// Kubernetes-backed object store for one kind.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StoreObject> KubeStore<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

/// Translate a Kubernetes API error into the store taxonomy.
///
/// 409 on create means the name is taken. 409 anywhere else is an optimistic
/// concurrency conflict.
pub(crate) fn map_kube_error<K: StoreObject>(err: kube::Error, name: &str) -> StoreError {
    match &err {
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists {
                kind: kind_of::<K>(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
            kind: kind_of::<K>(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound {
            kind: kind_of::<K>(),
            name: name.to_string(),
        },
        _ => StoreError::Kube(err),
    }
}

fn object_name<K: StoreObject>(obj: &K) -> Result<String, StoreError> {
    obj.meta().name.clone().ok_or_else(|| StoreError::Invalid {
        kind: kind_of::<K>(),
        reason: "object has no name".to_string(),
    })
}

#[async_trait]
impl<K: StoreObject> ObjectStore<K> for KubeStore<K> {
    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<K, StoreError> {
        K::api(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error::<K>(e, name))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<K>, StoreError> {
        let api = K::api(self.client.clone(), filter.namespace.as_deref());
        let mut params = ListParams::default();
        if let Some(selector) = filter.label_selector() {
            params = params.labels(&selector);
        }
        list_all_paginated(&api, params)
            .await
            .map_err(|e| map_kube_error::<K>(e, "list"))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let api = K::api(self.client.clone(), obj.meta().namespace.as_deref());
        let name = obj
            .meta()
            .name
            .clone()
            .or_else(|| obj.meta().generate_name.clone())
            .unwrap_or_default();
        debug!(kind = %kind_of::<K>(), name = %name, "Creating object");
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error::<K>(e, &name))
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let name = object_name(obj)?;
        let api = K::api(self.client.clone(), obj.meta().namespace.as_deref());
        api.replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error::<K>(e, &name))
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let name = object_name(obj)?;
        let api = K::api(self.client.clone(), obj.meta().namespace.as_deref());

        // resourceVersion in a merge patch acts as a precondition
        let status = serde_json::to_value(obj)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        let patch = json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": status,
        });

        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error::<K>(e, &name))
    }

    async fn delete(&self, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        K::api(self.client.clone(), namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error::<K>(e, name))
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
