// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dnsrecord.rs`

#[cfg(test)]
mod tests {
    use crate::config::ControllerConfig;
    use crate::context::{Context, Stores};
    use crate::crd::{
        ConditionStatus, Conditional, DNSIntegration, DNSIntegrationSpec, DNSProviderSpec,
        DNSRecord, DNSRecordSpec,
    };
    use crate::events::MemoryEventRecorder;
    use crate::labels::{provider_claim_key, FINALIZER_DNS_RECORD};
    use crate::reconcilers::dnsrecord::{needs_resolution, reconcile_dnsrecord};
    use crate::reconcilers::finalizers::has_finalizer;
    use crate::reconcilers::status::{condition_status, find_condition, set_status};
    use crate::status_reasons::{CONDITION_TYPE_INTEGRATION, EVENT_REASON_RESOLUTION_FAILED};
    use crate::store::{MemoryStore, ObjectStore};
    use k8s_openapi::api::apps::v1::Deployment;
    use kube::runtime::controller::Action;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        ctx: Arc<Context>,
        records: Arc<MemoryStore<DNSRecord>>,
        integrations: Arc<MemoryStore<DNSIntegration>>,
        events: Arc<MemoryEventRecorder>,
    }

    fn harness() -> Harness {
        let records = Arc::new(MemoryStore::<DNSRecord>::new());
        let integrations = Arc::new(MemoryStore::<DNSIntegration>::new());
        let events = Arc::new(MemoryEventRecorder::new());
        let stores = Stores {
            records: records.clone(),
            integrations: integrations.clone(),
            deployments: Arc::new(MemoryStore::<Deployment>::new()),
        };
        Harness {
            ctx: Arc::new(Context::new(stores, events.clone(), ControllerConfig::default())),
            records,
            integrations,
            events,
        }
    }

    fn integration(name: &str, zones: &[&str]) -> DNSIntegration {
        DNSIntegration::new(
            name,
            DNSIntegrationSpec {
                provider: DNSProviderSpec {
                    name: "cloudflare".into(),
                    ..Default::default()
                },
                zones: zones.iter().map(ToString::to_string).collect(),
                env: None,
                secret_ref: None,
            },
        )
    }

    fn record(with_finalizer: bool) -> DNSRecord {
        let mut rec = DNSRecord::new(
            "www",
            DNSRecordSpec {
                zone: "example.com".into(),
                record_type: "A".into(),
                name: "www".into(),
                targets: vec!["1.2.3.4".into()],
                properties: None,
                ttl: None,
                integration: None,
            },
        );
        rec.metadata.namespace = Some("default".into());
        if with_finalizer {
            rec.metadata.finalizers = Some(vec![FINALIZER_DNS_RECORD.to_string()]);
        }
        rec
    }

    async fn stored(h: &Harness) -> DNSRecord {
        h.records.get(Some("default"), "www").await.unwrap()
    }

    #[tokio::test]
    async fn test_finalizer_is_added_before_resolution() {
        let h = harness();
        h.integrations.seed(&integration("cf", &["example.com"])).unwrap();
        let rec = h.records.create(&record(false)).await.unwrap();

        let action = reconcile_dnsrecord(h.ctx.clone(), rec).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(1)));
        let rec = stored(&h).await;
        assert!(has_finalizer(&rec, FINALIZER_DNS_RECORD));
        assert!(rec.conditions().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_claims_matching_integrations() {
        let h = harness();
        h.integrations.seed(&integration("cf", &["example.com"])).unwrap();
        let rec = h.records.create(&record(true)).await.unwrap();

        reconcile_dnsrecord(h.ctx.clone(), rec).await.unwrap();

        let rec = stored(&h).await;
        let resolution = find_condition(rec.conditions(), CONDITION_TYPE_INTEGRATION).unwrap();
        assert_eq!(resolution.status, ConditionStatus::Completed);
        assert_eq!(
            condition_status(rec.conditions(), &provider_claim_key("cf")),
            Some(ConditionStatus::Completed)
        );
        assert_eq!(rec.status.unwrap().observed_generation, Some(1));
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_failure_is_committed_and_reported() {
        let h = harness();
        h.integrations.seed(&integration("other", &["example.org"])).unwrap();
        let rec = h.records.create(&record(true)).await.unwrap();

        let action = reconcile_dnsrecord(h.ctx.clone(), rec).await.unwrap();
        assert_eq!(action, Action::await_change());

        let rec = stored(&h).await;
        let resolution = find_condition(rec.conditions(), CONDITION_TYPE_INTEGRATION).unwrap();
        assert_eq!(resolution.status, ConditionStatus::Error);
        assert!(resolution.reason.contains("example.com"));

        let warnings = h.events.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, EVENT_REASON_RESOLUTION_FAILED);
        assert_eq!(warnings[0].object, "default/www");
    }

    #[tokio::test]
    async fn test_failed_resolution_waits_for_spec_change() {
        let h = harness();
        let rec = h.records.create(&record(true)).await.unwrap();
        reconcile_dnsrecord(h.ctx.clone(), rec).await.unwrap();

        // A new integration alone does not retry the resolution
        h.integrations.seed(&integration("cf", &["example.com", "example.net"])).unwrap();
        let rec = stored(&h).await;
        assert!(!needs_resolution(&rec));
        reconcile_dnsrecord(h.ctx.clone(), rec).await.unwrap();
        assert_eq!(
            condition_status(stored(&h).await.conditions(), CONDITION_TYPE_INTEGRATION),
            Some(ConditionStatus::Error)
        );

        // Editing the spec does
        let mut rec = stored(&h).await;
        rec.spec.zone = "example.net".into();
        let rec = h.records.update(&rec).await.unwrap();
        assert!(needs_resolution(&rec));
        reconcile_dnsrecord(h.ctx.clone(), rec).await.unwrap();

        let rec = stored(&h).await;
        assert_eq!(
            condition_status(rec.conditions(), CONDITION_TYPE_INTEGRATION),
            Some(ConditionStatus::Completed)
        );
        assert_eq!(rec.status.unwrap().observed_generation, Some(2));
    }

    #[test]
    fn test_completed_resolution_is_final() {
        let mut rec = record(true);
        rec.metadata.generation = Some(5);
        set_status(rec.conditions_mut(), CONDITION_TYPE_INTEGRATION, ConditionStatus::Completed, "");
        rec.status.as_mut().unwrap().observed_generation = Some(1);
        assert!(!needs_resolution(&rec));
    }

    #[tokio::test]
    async fn test_deletion_waits_for_every_provider() {
        let h = harness();
        let mut rec = record(true);
        for name in ["a", "b"] {
            set_status(rec.conditions_mut(), &provider_claim_key(name), ConditionStatus::Completed, "");
        }
        set_status(rec.conditions_mut(), "a", ConditionStatus::Terminated, "");
        set_status(rec.conditions_mut(), "b", ConditionStatus::Created, "");
        h.records.seed(&rec).unwrap();
        h.records.delete(Some("default"), "www").await.unwrap();

        reconcile_dnsrecord(h.ctx.clone(), stored(&h).await).await.unwrap();
        assert!(has_finalizer(&stored(&h).await, FINALIZER_DNS_RECORD));

        let mut rec = stored(&h).await;
        set_status(rec.conditions_mut(), "b", ConditionStatus::Error, "gone wrong");
        let rec = h.records.update_status(&rec).await.unwrap();

        reconcile_dnsrecord(h.ctx.clone(), rec).await.unwrap();
        assert!(h.records.is_empty());
    }

    #[tokio::test]
    async fn test_deletion_without_claims_releases_immediately() {
        let h = harness();
        h.records.seed(&record(true)).unwrap();
        h.records.delete(Some("default"), "www").await.unwrap();

        reconcile_dnsrecord(h.ctx.clone(), stored(&h).await).await.unwrap();
        assert!(h.records.is_empty());
    }

    #[tokio::test]
    async fn test_claim_without_provider_condition_blocks_deletion() {
        let h = harness();
        let mut rec = record(true);
        set_status(rec.conditions_mut(), &provider_claim_key("a"), ConditionStatus::Completed, "");
        h.records.seed(&rec).unwrap();
        h.records.delete(Some("default"), "www").await.unwrap();

        // The claim itself is the effective status until the provider writes its own
        reconcile_dnsrecord(h.ctx.clone(), stored(&h).await).await.unwrap();
        assert!(!h.records.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_requeues_and_persists_nothing() {
        let h = harness();
        h.integrations.seed(&integration("cf", &["example.com"])).unwrap();
        let stale = h.records.create(&record(true)).await.unwrap();

        let mut newer = stale.clone();
        newer.metadata.labels = Some(BTreeMap::from([("touched".into(), "yes".into())]));
        h.records.update(&newer).await.unwrap();

        let action = reconcile_dnsrecord(h.ctx.clone(), stale).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(1)));
        assert!(stored(&h).await.conditions().is_empty());
        assert!(h.events.events().is_empty());
    }
}
