// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the controllers.
//!
//! Every reconciler receives an `Arc` of one of these:
//!
//! - [`Context`] for the record and integration controllers in the main process
//! - [`ProviderContext`] for the dispatch reconciler in a provider worker
//!
//! Both carry their stores as trait objects, so tests swap the Kubernetes-backed
//! stores for [`MemoryStore`]s without touching the reconcilers.

use crate::config::ControllerConfig;
use crate::crd::{DNSIntegration, DNSRecord};
use crate::events::{EventRecorder, KubeEventRecorder, MemoryEventRecorder};
use crate::providers::ProviderStore;
use crate::store::{KubeStore, MemoryStore, ObjectStore};
use k8s_openapi::api::apps::v1::Deployment;
use kube::Client;
use std::sync::Arc;

/// Object stores used by the controllers.
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn ObjectStore<DNSRecord>>,
    pub integrations: Arc<dyn ObjectStore<DNSIntegration>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
}

impl Stores {
    /// Stores backed by the Kubernetes API server
    #[must_use]
    pub fn kubernetes(client: &Client) -> Self {
        Self {
            records: Arc::new(KubeStore::<DNSRecord>::new(client.clone())),
            integrations: Arc::new(KubeStore::<DNSIntegration>::new(client.clone())),
            deployments: Arc::new(KubeStore::<Deployment>::new(client.clone())),
        }
    }

    /// Empty in-memory stores
    #[must_use]
    pub fn memory() -> Self {
        Self {
            records: Arc::new(MemoryStore::<DNSRecord>::new()),
            integrations: Arc::new(MemoryStore::<DNSIntegration>::new()),
            deployments: Arc::new(MemoryStore::<Deployment>::new()),
        }
    }
}

/// Context of the record and integration controllers.
#[derive(Clone)]
pub struct Context {
    pub stores: Stores,

    /// Sink for user-visible events
    pub events: Arc<dyn EventRecorder>,

    pub config: ControllerConfig,
}

impl Context {
    #[must_use]
    pub fn new(stores: Stores, events: Arc<dyn EventRecorder>, config: ControllerConfig) -> Self {
        Self {
            stores,
            events,
            config,
        }
    }

    /// Context talking to the Kubernetes API server
    #[must_use]
    pub fn kubernetes(client: &Client, config: ControllerConfig) -> Self {
        Self::new(
            Stores::kubernetes(client),
            Arc::new(KubeEventRecorder::new(client.clone())),
            config,
        )
    }
}

/// Context of the provider dispatch reconciler, one per worker process.
#[derive(Clone)]
pub struct ProviderContext {
    pub records: Arc<dyn ObjectStore<DNSRecord>>,
    pub events: Arc<dyn EventRecorder>,
    pub providers: Arc<ProviderStore>,

    /// Integration this worker serves. Its name keys the worker's condition on records.
    pub integration: String,
}

impl ProviderContext {
    #[must_use]
    pub fn new(
        records: Arc<dyn ObjectStore<DNSRecord>>,
        events: Arc<dyn EventRecorder>,
        providers: Arc<ProviderStore>,
        integration: impl Into<String>,
    ) -> Self {
        Self {
            records,
            events,
            providers,
            integration: integration.into(),
        }
    }
}

/// In-memory contexts sharing the same record store, for driving both sides of the
/// system in tests.
#[must_use]
pub fn memory_contexts(
    providers: Arc<ProviderStore>,
    integration: &str,
) -> (Context, ProviderContext, Arc<MemoryEventRecorder>) {
    let stores = Stores::memory();
    let events = Arc::new(MemoryEventRecorder::new());
    let provider_ctx = ProviderContext::new(
        stores.records.clone(),
        events.clone(),
        providers,
        integration,
    );
    let ctx = Context::new(stores, events.clone(), ControllerConfig::default());
    (ctx, provider_ctx, events)
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
