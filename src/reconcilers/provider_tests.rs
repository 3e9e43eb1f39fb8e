// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `provider.rs`

#[cfg(test)]
mod tests {
    use crate::context::ProviderContext;
    use crate::crd::{ConditionStatus, Conditional, DNSRecord, DNSRecordSpec};
    use crate::dns_errors::ProviderError;
    use crate::events::MemoryEventRecorder;
    use crate::labels::{provider_claim_key, FINALIZER_DNS_RECORD};
    use crate::providers::{Provider, ProviderStore};
    use crate::reconcilers::provider::{reconcile_provider_record, should_dispatch};
    use crate::reconcilers::staging::StagingUpdater;
    use crate::reconcilers::status::{condition_status, find_condition, set_status};
    use crate::store::{MemoryStore, ObjectStore};
    use async_trait::async_trait;
    use kube::runtime::controller::Action;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const INTEGRATION: &str = "cf";

    #[derive(Clone, Copy)]
    enum Behaviour {
        Stage,
        StageThenFail,
        Silent,
    }

    struct FakeProvider {
        zones: Vec<String>,
        behaviour: Behaviour,
        calls: Mutex<Vec<String>>,
        /// When set, `create` deletes the record from this store before returning
        delete_during_create: Mutex<Option<Arc<MemoryStore<DNSRecord>>>>,
    }

    impl FakeProvider {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                zones: vec!["example.com".to_string()],
                behaviour,
                calls: Mutex::new(Vec::new()),
                delete_during_create: Mutex::new(None),
            })
        }

        fn delete_record_during_create(&self, store: Arc<MemoryStore<DNSRecord>>) {
            *self.delete_during_create.lock().unwrap() = Some(store);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn respond(
            &self,
            op: &str,
            status: ConditionStatus,
            updater: &mut dyn StagingUpdater,
        ) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(op.to_string());
            match self.behaviour {
                Behaviour::Stage => {
                    updater.stage_condition(status, op);
                    updater.stage_remote_info(BTreeMap::from([("id".into(), "42".into())]));
                    Ok(())
                }
                Behaviour::StageThenFail => {
                    updater.stage_condition(status, op);
                    Err(ProviderError::Api {
                        provider: "fake".into(),
                        status: 500,
                        message: "backend on fire".into(),
                    })
                }
                Behaviour::Silent => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn configure(&mut self, _integration: &str, _zones: Vec<String>) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn create(&self, _record: &DNSRecord, updater: &mut dyn StagingUpdater) -> Result<(), ProviderError> {
            let store = self.delete_during_create.lock().unwrap().clone();
            if let Some(store) = store {
                store.delete(Some("default"), "www").await.unwrap();
            }
            self.respond("create", ConditionStatus::Created, updater)
        }

        async fn delete(&self, _record: &DNSRecord, updater: &mut dyn StagingUpdater) -> Result<(), ProviderError> {
            self.respond("delete", ConditionStatus::Terminated, updater)
        }

        fn zones(&self) -> &[String] {
            &self.zones
        }
    }

    struct Harness {
        ctx: Arc<ProviderContext>,
        store: Arc<MemoryStore<DNSRecord>>,
        events: Arc<MemoryEventRecorder>,
    }

    fn harness(provider: Arc<FakeProvider>) -> Harness {
        let store = Arc::new(MemoryStore::<DNSRecord>::new());
        let events = Arc::new(MemoryEventRecorder::new());
        let ctx = ProviderContext::new(
            store.clone(),
            events.clone(),
            Arc::new(ProviderStore::with_provider(provider)),
            INTEGRATION,
        );
        Harness {
            ctx: Arc::new(ctx),
            store,
            events,
        }
    }

    fn record(zone: &str) -> DNSRecord {
        let mut rec = DNSRecord::new(
            "www",
            DNSRecordSpec {
                zone: zone.into(),
                record_type: "A".into(),
                name: "www".into(),
                targets: vec!["1.2.3.4".into()],
                properties: None,
                ttl: None,
                integration: None,
            },
        );
        rec.metadata.namespace = Some("default".into());
        rec.metadata.finalizers = Some(vec![FINALIZER_DNS_RECORD.to_string()]);
        rec
    }

    fn claimed(zone: &str) -> DNSRecord {
        let mut rec = record(zone);
        set_status(
            rec.conditions_mut(),
            &provider_claim_key(INTEGRATION),
            ConditionStatus::Completed,
            "claimed",
        );
        rec
    }

    async fn stored(h: &Harness) -> DNSRecord {
        h.store.get(Some("default"), "www").await.unwrap()
    }

    #[test]
    fn test_should_dispatch_requires_claim() {
        assert!(!should_dispatch(&record("example.com"), INTEGRATION));
        assert!(should_dispatch(&claimed("example.com"), INTEGRATION));
    }

    #[test]
    fn test_should_dispatch_drops_errored_claim() {
        let mut rec = record("example.com");
        set_status(
            rec.conditions_mut(),
            &provider_claim_key(INTEGRATION),
            ConditionStatus::Error,
            "nope",
        );
        assert!(!should_dispatch(&rec, INTEGRATION));
    }

    #[test]
    fn test_should_dispatch_by_own_condition() {
        for (status, expected) in [
            (ConditionStatus::Initialized, true),
            (ConditionStatus::Created, true),
            (ConditionStatus::Completed, false),
            (ConditionStatus::Terminated, false),
            (ConditionStatus::Error, false),
        ] {
            let mut rec = claimed("example.com");
            set_status(rec.conditions_mut(), INTEGRATION, status.clone(), "");
            assert_eq!(should_dispatch(&rec, INTEGRATION), expected, "{status}");
        }
    }

    #[test]
    fn test_should_dispatch_ignores_other_integrations() {
        let mut rec = record("example.com");
        set_status(
            rec.conditions_mut(),
            &provider_claim_key("other"),
            ConditionStatus::Completed,
            "claimed",
        );
        assert!(!should_dispatch(&rec, INTEGRATION));
    }

    #[tokio::test]
    async fn test_create_commits_staged_outcome() {
        let provider = FakeProvider::new(Behaviour::Stage);
        let h = harness(provider.clone());
        let rec = h.store.seed(&claimed("example.com")).unwrap();

        let action = reconcile_provider_record(h.ctx.clone(), rec).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(provider.calls(), vec!["create"]);

        let rec = stored(&h).await;
        let own = find_condition(rec.conditions(), INTEGRATION).unwrap();
        assert_eq!(own.status, ConditionStatus::Created);
        assert_eq!(own.reason, "create");
        assert_eq!(rec.remote_info(INTEGRATION).unwrap()["id"], "42");
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_created_record_is_not_created_twice() {
        let provider = FakeProvider::new(Behaviour::Stage);
        let h = harness(provider.clone());
        let rec = h.store.seed(&claimed("example.com")).unwrap();

        reconcile_provider_record(h.ctx.clone(), rec).await.unwrap();
        let rec = stored(&h).await;
        reconcile_provider_record(h.ctx.clone(), rec).await.unwrap();

        assert_eq!(provider.calls(), vec!["create"]);
    }

    #[tokio::test]
    async fn test_provider_error_wins_over_staged_status() {
        let provider = FakeProvider::new(Behaviour::StageThenFail);
        let h = harness(provider.clone());
        let rec = h.store.seed(&claimed("example.com")).unwrap();

        let err = reconcile_provider_record(h.ctx.clone(), rec).await.unwrap_err();
        assert!(err.to_string().contains("backend on fire"));

        let rec = stored(&h).await;
        let own = find_condition(rec.conditions(), INTEGRATION).unwrap();
        assert_eq!(own.status, ConditionStatus::Error);
        assert!(own.reason.contains("backend on fire"));
        assert!(rec.remote_info(INTEGRATION).is_none());

        let warnings = h.events.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, INTEGRATION);
        assert!(warnings[0].message.contains("backend on fire"));
    }

    #[tokio::test]
    async fn test_provider_that_stages_nothing_is_an_error() {
        let provider = FakeProvider::new(Behaviour::Silent);
        let h = harness(provider);
        let rec = h.store.seed(&claimed("example.com")).unwrap();

        assert!(reconcile_provider_record(h.ctx.clone(), rec).await.is_err());

        let rec = stored(&h).await;
        assert_eq!(
            condition_status(rec.conditions(), INTEGRATION),
            Some(ConditionStatus::Error)
        );
        assert_eq!(h.events.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_zone_outside_provider_is_dropped() {
        let provider = FakeProvider::new(Behaviour::Stage);
        let h = harness(provider.clone());
        let rec = h.store.seed(&claimed("example.org")).unwrap();

        reconcile_provider_record(h.ctx.clone(), rec).await.unwrap();

        assert!(provider.calls().is_empty());
        assert!(condition_status(stored(&h).await.conditions(), INTEGRATION).is_none());
    }

    #[tokio::test]
    async fn test_delete_without_committed_create_calls_provider() {
        let provider = FakeProvider::new(Behaviour::Stage);
        let h = harness(provider.clone());
        h.store.seed(&claimed("example.com")).unwrap();
        h.store.delete(Some("default"), "www").await.unwrap();

        reconcile_provider_record(h.ctx.clone(), stored(&h).await).await.unwrap();

        assert_eq!(provider.calls(), vec!["delete"]);
        assert_eq!(
            condition_status(stored(&h).await.conditions(), INTEGRATION),
            Some(ConditionStatus::Terminated)
        );
    }

    #[tokio::test]
    async fn test_create_lost_to_conflict_is_deleted_remotely() {
        let provider = FakeProvider::new(Behaviour::Stage);
        let h = harness(provider.clone());
        provider.delete_record_during_create(h.store.clone());
        let rec = h.store.seed(&claimed("example.com")).unwrap();

        // The record is deleted while the provider creates it, so the commit conflicts
        let action = reconcile_provider_record(h.ctx.clone(), rec).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(1)));
        let rec = stored(&h).await;
        assert!(rec.metadata.deletion_timestamp.is_some());
        assert!(condition_status(rec.conditions(), INTEGRATION).is_none());

        *provider.delete_during_create.lock().unwrap() = None;
        reconcile_provider_record(h.ctx.clone(), rec).await.unwrap();

        assert_eq!(provider.calls(), vec!["create", "delete"]);
        let rec = stored(&h).await;
        let own = find_condition(rec.conditions(), INTEGRATION).unwrap();
        assert_eq!(own.status, ConditionStatus::Terminated);
        assert_eq!(own.reason, "delete");
    }

    #[tokio::test]
    async fn test_delete_of_created_record_calls_provider() {
        let provider = FakeProvider::new(Behaviour::Stage);
        let h = harness(provider.clone());
        let mut rec = claimed("example.com");
        set_status(rec.conditions_mut(), INTEGRATION, ConditionStatus::Created, "create");
        h.store.seed(&rec).unwrap();
        h.store.delete(Some("default"), "www").await.unwrap();

        reconcile_provider_record(h.ctx.clone(), stored(&h).await).await.unwrap();

        assert_eq!(provider.calls(), vec!["delete"]);
        assert_eq!(
            condition_status(stored(&h).await.conditions(), INTEGRATION),
            Some(ConditionStatus::Terminated)
        );
    }

    #[tokio::test]
    async fn test_conflict_requeues_without_event() {
        let provider = FakeProvider::new(Behaviour::Stage);
        let h = harness(provider);
        let stale = h.store.seed(&claimed("example.com")).unwrap();

        let mut newer = stale.clone();
        newer.metadata.labels = Some(BTreeMap::from([("touched".into(), "yes".into())]));
        h.store.update(&newer).await.unwrap();

        let action = reconcile_provider_record(h.ctx.clone(), stale).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(1)));
        assert!(h.events.events().is_empty());
        assert!(condition_status(stored(&h).await.conditions(), INTEGRATION).is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_store_fails() {
        let store = Arc::new(MemoryStore::<DNSRecord>::new());
        let ctx = Arc::new(ProviderContext::new(
            store.clone(),
            Arc::new(MemoryEventRecorder::new()),
            Arc::new(ProviderStore::new()),
            INTEGRATION,
        ));
        let rec = store.seed(&claimed("example.com")).unwrap();

        assert!(reconcile_provider_record(ctx, rec).await.is_err());
    }
}
