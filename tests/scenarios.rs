// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end scenarios over in-memory stores.
//!
//! The record reconciler and one or more provider dispatch reconcilers share a single
//! record store, the way the controller and its provider workers share the API server.
//! Each step re-reads the record first, like a fresh watch event would.

mod common;

use common::{a_record, fetch, integration, Call, RecordingProvider, TEST_NAMESPACE};
use kube::runtime::controller::Action;
use phonebook::context::{memory_contexts, Context, ProviderContext};
use phonebook::crd::{ConditionStatus, Conditional, DNSRecord};
use phonebook::dns_errors::StoreError;
use phonebook::events::MemoryEventRecorder;
use phonebook::labels::{provider_claim_key, FINALIZER_DNS_RECORD};
use phonebook::providers::ProviderStore;
use phonebook::reconcilers::finalizers::has_finalizer;
use phonebook::reconcilers::status::condition_status;
use phonebook::reconcilers::{reconcile_dnsrecord, reconcile_provider_record};
use phonebook::status_reasons::CONDITION_TYPE_INTEGRATION;
use phonebook::store::ObjectStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const ZONE: &str = "example.com";

struct World {
    ctx: Arc<Context>,
    workers: Vec<(Arc<ProviderContext>, Arc<RecordingProvider>)>,
    events: Arc<MemoryEventRecorder>,
}

impl World {
    /// Controller plus one provider worker per `(integration, provider)`.
    fn new(workers: Vec<(&str, Arc<RecordingProvider>)>) -> Self {
        let (first_name, first_provider) = workers
            .first()
            .cloned()
            .expect("at least one worker");
        let (ctx, first_ctx, events) = memory_contexts(
            Arc::new(ProviderStore::with_provider(first_provider.clone())),
            first_name,
        );

        let mut contexts = vec![(Arc::new(first_ctx), first_provider)];
        for (name, provider) in workers.into_iter().skip(1) {
            let worker_ctx = ProviderContext::new(
                ctx.stores.records.clone(),
                events.clone(),
                Arc::new(ProviderStore::with_provider(provider.clone())),
                name,
            );
            contexts.push((Arc::new(worker_ctx), provider));
        }

        Self {
            ctx: Arc::new(ctx),
            workers: contexts,
            events,
        }
    }

    async fn add_integration(&self, name: &str, zones: &[&str]) {
        self.ctx
            .stores
            .integrations
            .create(&integration(name, zones))
            .await
            .unwrap();
    }

    async fn create_record(&self, name: &str) {
        self.ctx.stores.records.create(&a_record(name, ZONE)).await.unwrap();
    }

    async fn record(&self, name: &str) -> DNSRecord {
        fetch(self.ctx.stores.records.as_ref(), name).await
    }

    async fn try_record(&self, name: &str) -> Result<DNSRecord, StoreError> {
        self.ctx.stores.records.get(Some(TEST_NAMESPACE), name).await
    }

    /// One pass of the record reconciler
    async fn reconcile(&self, name: &str) -> Action {
        let record = self.record(name).await;
        reconcile_dnsrecord(self.ctx.clone(), record).await.unwrap()
    }

    /// Finalizer pass followed by the resolution pass
    async fn resolve(&self, name: &str) -> DNSRecord {
        self.reconcile(name).await;
        self.reconcile(name).await;
        self.record(name).await
    }

    /// One pass of worker `index`'s dispatch reconciler
    async fn dispatch(&self, index: usize, name: &str) -> anyhow::Result<Action> {
        let record = self.record(name).await;
        reconcile_provider_record(self.workers[index].0.clone(), record).await
    }

    fn provider(&self, index: usize) -> &RecordingProvider {
        &self.workers[index].1
    }

    async fn delete(&self, name: &str) {
        self.ctx
            .stores
            .records
            .delete(Some(TEST_NAMESPACE), name)
            .await
            .unwrap();
    }
}

fn create_call(fqdn: &str) -> Call {
    Call {
        operation: "create",
        record: fqdn.to_string(),
    }
}

// ============================================================================
// Scenario A: one integration publishes a record
// ============================================================================

#[tokio::test]
async fn test_single_integration_publishes_record() {
    let world = World::new(vec![("cf", RecordingProvider::new(&[ZONE], "rec-1"))]);
    world.add_integration("cf", &[ZONE]).await;
    world.create_record("www").await;

    let record = world.resolve("www").await;
    assert!(has_finalizer(&record, FINALIZER_DNS_RECORD));
    assert_eq!(
        condition_status(record.conditions(), CONDITION_TYPE_INTEGRATION),
        Some(ConditionStatus::Completed)
    );
    assert_eq!(
        condition_status(record.conditions(), &provider_claim_key("cf")),
        Some(ConditionStatus::Completed)
    );

    world.dispatch(0, "www").await.unwrap();

    let record = world.record("www").await;
    assert_eq!(
        condition_status(record.conditions(), "cf"),
        Some(ConditionStatus::Created)
    );
    let remote_info = &record.status.as_ref().unwrap().remote_info;
    assert_eq!(remote_info["cf"]["recordID"], "rec-1");
    assert_eq!(world.provider(0).calls(), vec![create_call("www.example.com")]);

    // Created records are not dispatched again
    world.dispatch(0, "www").await.unwrap();
    assert_eq!(world.provider(0).calls().len(), 1);
    assert!(world.events.warnings().is_empty());
}

// ============================================================================
// Scenario B: no integration owns the zone
// ============================================================================

#[tokio::test]
async fn test_unowned_zone_fails_resolution_without_provider_calls() {
    let world = World::new(vec![("cf", RecordingProvider::new(&[ZONE], "rec-1"))]);
    world.add_integration("cf", &["example.org"]).await;
    world.create_record("www").await;

    let record = world.resolve("www").await;
    let condition = record
        .conditions()
        .iter()
        .find(|c| c.r#type == CONDITION_TYPE_INTEGRATION)
        .unwrap();
    assert_eq!(condition.status, ConditionStatus::Error);
    assert!(condition.reason.contains(ZONE));
    assert!(condition_status(record.conditions(), &provider_claim_key("cf")).is_none());

    assert_eq!(world.dispatch(0, "www").await.unwrap(), Action::await_change());
    assert!(world.provider(0).calls().is_empty());
    assert_eq!(world.events.warnings().len(), 1);
}

// ============================================================================
// Scenario C: split horizon
// ============================================================================

#[tokio::test]
async fn test_split_horizon_publishes_through_both_integrations() {
    let world = World::new(vec![
        ("external", RecordingProvider::new(&[ZONE], "ext-1")),
        ("internal", RecordingProvider::new(&[ZONE], "int-1")),
    ]);
    world.add_integration("external", &[ZONE]).await;
    world.add_integration("internal", &[ZONE, "corp.example.com"]).await;
    world.create_record("www").await;

    let record = world.resolve("www").await;
    for name in ["external", "internal"] {
        assert_eq!(
            condition_status(record.conditions(), &provider_claim_key(name)),
            Some(ConditionStatus::Completed)
        );
    }

    world.dispatch(1, "www").await.unwrap();
    world.dispatch(0, "www").await.unwrap();

    let record = world.record("www").await;
    let remote_info = &record.status.as_ref().unwrap().remote_info;
    assert_eq!(remote_info.len(), 2);
    assert_eq!(remote_info["external"]["recordID"], "ext-1");
    assert_eq!(remote_info["internal"]["recordID"], "int-1");
    for name in ["external", "internal"] {
        assert_eq!(
            condition_status(record.conditions(), name),
            Some(ConditionStatus::Created)
        );
    }
    assert_eq!(world.provider(0).calls(), vec![create_call("www.example.com")]);
    assert_eq!(world.provider(1).calls(), vec![create_call("www.example.com")]);
}

#[tokio::test]
async fn test_integration_hint_limits_claims() {
    let world = World::new(vec![("internal", RecordingProvider::new(&[ZONE], "int-1"))]);
    world.add_integration("external", &[ZONE]).await;
    world.add_integration("internal", &[ZONE]).await;

    let mut record = a_record("www", ZONE);
    record.spec.integration = Some("internal".to_string());
    world.ctx.stores.records.create(&record).await.unwrap();

    let record = world.resolve("www").await;
    assert!(condition_status(record.conditions(), &provider_claim_key("external")).is_none());
    assert_eq!(
        condition_status(record.conditions(), &provider_claim_key("internal")),
        Some(ConditionStatus::Completed)
    );
}

// ============================================================================
// Scenario D: deletion waits for every provider
// ============================================================================

#[tokio::test]
async fn test_deletion_waits_for_every_provider() {
    let world = World::new(vec![
        ("external", RecordingProvider::new(&[ZONE], "ext-1")),
        ("internal", RecordingProvider::new(&[ZONE], "int-1")),
    ]);
    world.add_integration("external", &[ZONE]).await;
    world.add_integration("internal", &[ZONE]).await;
    world.create_record("www").await;
    world.resolve("www").await;

    // Only the first worker got to the record before it was deleted
    world.dispatch(0, "www").await.unwrap();
    world.delete("www").await;

    world.reconcile("www").await;
    assert!(has_finalizer(&world.record("www").await, FINALIZER_DNS_RECORD));

    world.dispatch(0, "www").await.unwrap();
    let record = world.record("www").await;
    assert_eq!(
        condition_status(record.conditions(), "external"),
        Some(ConditionStatus::Terminated)
    );
    world.reconcile("www").await;
    assert!(
        has_finalizer(&world.record("www").await, FINALIZER_DNS_RECORD),
        "finalizer must stay while internal has not settled"
    );

    world.dispatch(1, "www").await.unwrap();
    let record = world.record("www").await;
    let internal = record
        .conditions()
        .iter()
        .find(|c| c.r#type == "internal")
        .unwrap();
    assert_eq!(internal.status, ConditionStatus::Terminated);
    // The internal worker never committed a create, but still asks its provider to
    // delete in case the record exists remotely
    assert_eq!(
        world.provider(1).calls(),
        vec![Call {
            operation: "delete",
            record: "www.example.com".to_string(),
        }]
    );

    world.reconcile("www").await;
    assert!(world.try_record("www").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_failed_provider_releases_record_on_delete() {
    let world = World::new(vec![("cf", RecordingProvider::failing(&[ZONE]))]);
    world.add_integration("cf", &[ZONE]).await;
    world.create_record("www").await;
    world.resolve("www").await;

    assert!(world.dispatch(0, "www").await.is_err());
    world.delete("www").await;

    // Error is a releasing status, and Error records are never dispatched again
    assert_eq!(world.dispatch(0, "www").await.unwrap(), Action::await_change());
    world.reconcile("www").await;
    assert!(world.try_record("www").await.unwrap_err().is_not_found());
    assert_eq!(world.provider(0).calls().len(), 1);
}

// ============================================================================
// Scenario E: conflicting writes
// ============================================================================

#[tokio::test]
async fn test_conflicting_dispatch_persists_nothing() {
    let world = World::new(vec![("cf", RecordingProvider::new(&[ZONE], "rec-1"))]);
    world.add_integration("cf", &[ZONE]).await;
    world.create_record("www").await;
    world.resolve("www").await;

    let stale = world.record("www").await;
    let mut newer = stale.clone();
    newer.metadata.labels = Some(BTreeMap::from([("team".to_string(), "web".to_string())]));
    world.ctx.stores.records.update(&newer).await.unwrap();

    let action = reconcile_provider_record(world.workers[0].0.clone(), stale)
        .await
        .unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(1)));

    let record = world.record("www").await;
    assert!(condition_status(record.conditions(), "cf").is_none());
    assert!(record.status.as_ref().unwrap().remote_info.is_empty());
    assert!(world.events.events().is_empty());

    // The retry sees the current version and goes through
    world.dispatch(0, "www").await.unwrap();
    assert_eq!(
        condition_status(world.record("www").await.conditions(), "cf"),
        Some(ConditionStatus::Created)
    );
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let world = World::new(vec![("cf", RecordingProvider::new(&[ZONE], "rec-1"))]);
    world.add_integration("cf", &[ZONE]).await;
    world.add_integration("backup", &[ZONE]).await;
    world.create_record("www").await;

    let first = world.resolve("www").await;
    world.reconcile("www").await;
    let second = world.record("www").await;

    let keys = |r: &DNSRecord| {
        r.conditions()
            .iter()
            .map(|c| (c.r#type.clone(), c.status.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&first), keys(&second));
    assert_eq!(first.conditions().len(), 3);
}

#[tokio::test]
async fn test_staged_success_never_outlives_provider_error() {
    let world = World::new(vec![("cf", RecordingProvider::failing(&[ZONE]))]);
    world.add_integration("cf", &[ZONE]).await;
    world.create_record("www").await;
    world.resolve("www").await;

    let err = world.dispatch(0, "www").await.unwrap_err();
    assert!(format!("{err:#}").contains("upstream unavailable"));

    let record = world.record("www").await;
    assert_eq!(
        condition_status(record.conditions(), "cf"),
        Some(ConditionStatus::Error)
    );
    assert!(record.status.as_ref().unwrap().remote_info.is_empty());

    let warnings = world.events.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].reason, "cf");
}
