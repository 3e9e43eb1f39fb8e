// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording.
//!
//! Events are best effort: a failure to record one is logged and never fails a
//! reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::PostParams;
use kube::{Api, Client, Resource};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Namespace receiving events about cluster-scoped objects
const CLUSTER_EVENT_NAMESPACE: &str = "default";

/// Build an `ObjectReference` pointing at `obj`.
pub fn object_reference<K>(obj: &K) -> ObjectReference
where
    K: Resource<DynamicType = ()>,
{
    ObjectReference {
        api_version: Some(K::api_version(&()).to_string()),
        kind: Some(K::kind(&()).to_string()),
        name: obj.meta().name.clone(),
        namespace: obj.meta().namespace.clone(),
        uid: obj.meta().uid.clone(),
        ..Default::default()
    }
}

/// Sink for user-visible events.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Record an event about `object`. `event_type` is `Normal` or `Warning`.
    async fn record(&self, object: ObjectReference, event_type: &str, reason: &str, message: &str);
}

/// Records events through the Kubernetes API.
pub struct KubeEventRecorder {
    client: Client,
}

impl KubeEventRecorder {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, object: ObjectReference, event_type: &str, reason: &str, message: &str) {
        let namespace = object
            .namespace
            .clone()
            .unwrap_or_else(|| CLUSTER_EVENT_NAMESPACE.to_string());
        let name = object.name.clone().unwrap_or_default();
        let event_api: Api<Event> = Api::namespaced(self.client.clone(), &namespace);

        let now = Time(k8s_openapi::jiff::Timestamp::now());
        let event = Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{name}-")),
                namespace: Some(namespace),
                ..Default::default()
            },
            involved_object: object,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            type_: Some(event_type.to_string()),
            first_timestamp: Some(now.clone()),
            last_timestamp: Some(now),
            count: Some(1),
            ..Default::default()
        };

        if let Err(e) = event_api.create(&PostParams::default(), &event).await {
            warn!(object = %name, error = %e, "Failed to create event");
        }
    }
}

/// One event captured by [`MemoryEventRecorder`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub object: String,
    pub event_type: String,
    pub reason: String,
    pub message: String,
}

/// Keeps events in memory, for tests and dry runs.
#[derive(Default)]
pub struct MemoryEventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryEventRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events of type `Warning`
    #[must_use]
    pub fn warnings(&self) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == crate::status_reasons::EVENT_TYPE_WARNING)
            .collect()
    }
}

#[async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record(&self, object: ObjectReference, event_type: &str, reason: &str, message: &str) {
        let name = match (object.namespace, object.name) {
            (Some(ns), Some(name)) => format!("{ns}/{name}"),
            (None, Some(name)) => name,
            (_, None) => String::new(),
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                object: name,
                event_type: event_type.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
            });
    }
}

/// Convenience for recording a warning about a typed object.
pub async fn warn_event<K>(recorder: &dyn EventRecorder, obj: &K, reason: &str, message: &str)
where
    K: Resource<DynamicType = ()>,
{
    recorder
        .record(
            object_reference(obj),
            crate::status_reasons::EVENT_TYPE_WARNING,
            reason,
            message,
        )
        .await;
}
