// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::client::Client;
use phonebook::crd::{
    ConditionStatus, DNSIntegration, DNSIntegrationSpec, DNSProviderSpec, DNSRecord,
    DNSRecordSpec,
};
use phonebook::dns_errors::ProviderError;
use phonebook::providers::Provider;
use phonebook::reconcilers::staging::StagingUpdater;
use phonebook::store::ObjectStore;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const TEST_NAMESPACE: &str = "default";

// ============================================================================
// Cluster helpers
// ============================================================================

/// Get a Kubernetes client or skip the test if no cluster is reachable
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => {
            println!("✓ Successfully connected to Kubernetes cluster");
            Some(client)
        }
        Err(e) => {
            eprintln!("⊘ Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let test_ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([
                ("test".to_string(), "integration".to_string()),
                ("managed-by".to_string(), "phonebook-test".to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &test_ns).await {
        Ok(_) => {
            println!("✓ Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("  Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Delete a test namespace
pub async fn delete_test_namespace(client: &Client, name: &str) {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => println!("✓ Deleted test namespace: {name}"),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("  Test namespace already deleted: {name}");
        }
        Err(e) => eprintln!("⚠ Failed to delete test namespace {name}: {e}"),
    }
}

// ============================================================================
// Resource builders
// ============================================================================

/// An A record `name.zone -> 1.2.3.4` in [`TEST_NAMESPACE`]
pub fn a_record(name: &str, zone: &str) -> DNSRecord {
    let mut record = DNSRecord::new(
        name,
        DNSRecordSpec {
            zone: zone.to_string(),
            record_type: "A".to_string(),
            name: name.to_string(),
            targets: vec!["1.2.3.4".to_string()],
            properties: None,
            ttl: None,
            integration: None,
        },
    );
    record.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    record
}

/// A Cloudflare integration with authority over `zones`
pub fn integration(name: &str, zones: &[&str]) -> DNSIntegration {
    DNSIntegration::new(
        name,
        DNSIntegrationSpec {
            provider: DNSProviderSpec {
                name: "cloudflare".to_string(),
                ..Default::default()
            },
            zones: zones.iter().map(ToString::to_string).collect(),
            env: None,
            secret_ref: None,
        },
    )
}

/// Re-read `record` so the next write carries its current resource version
pub async fn fetch(store: &dyn ObjectStore<DNSRecord>, name: &str) -> DNSRecord {
    store
        .get(Some(TEST_NAMESPACE), name)
        .await
        .unwrap_or_else(|e| panic!("record {name} should exist: {e}"))
}

// ============================================================================
// Recording provider
// ============================================================================

/// One provider call as seen by [`RecordingProvider`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub record: String,
}

/// Provider that records its calls and stages a successful outcome for each.
///
/// With `fail_after_staging` set it stages the outcome and then fails, which must
/// never be persisted as a success.
pub struct RecordingProvider {
    zones: Vec<String>,
    remote_id: String,
    fail_after_staging: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingProvider {
    pub fn new(zones: &[&str], remote_id: &str) -> Arc<Self> {
        Arc::new(Self {
            zones: zones.iter().map(ToString::to_string).collect(),
            remote_id: remote_id.to_string(),
            fail_after_staging: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(zones: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            zones: zones.iter().map(ToString::to_string).collect(),
            remote_id: String::new(),
            fail_after_staging: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(
        &self,
        operation: &'static str,
        record: &DNSRecord,
        status: ConditionStatus,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(Call {
            operation,
            record: record.fqdn(),
        });

        updater.stage_condition(status, operation);
        if self.fail_after_staging {
            return Err(ProviderError::Api {
                provider: "recording".to_string(),
                status: 503,
                message: "upstream unavailable".to_string(),
            });
        }
        updater.stage_remote_info(BTreeMap::from([(
            "recordID".to_string(),
            self.remote_id.clone(),
        )]));
        Ok(())
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn configure(&mut self, _integration: &str, zones: Vec<String>) -> Result<(), ProviderError> {
        self.zones = zones;
        Ok(())
    }

    async fn create(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        self.respond("create", record, ConditionStatus::Created, updater)
    }

    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        self.respond("delete", record, ConditionStatus::Terminated, updater)
    }

    fn zones(&self) -> &[String] {
        &self.zones
    }
}
