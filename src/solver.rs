// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS-01 challenge presentation for ACME clients.
//!
//! A challenge is published as an ordinary `DNSRecord` of type `TXT`, labelled
//! `phonebook.se.quencer.io/solver=dns-01-challenge`, so it goes through the same
//! resolution and provider dispatch as any other record. Cleanup deletes the
//! labelled records carrying the challenge key; their finalizer keeps them around
//! until every provider removed them remotely.

use crate::crd::{DNSRecord, DNSRecordSpec};
use crate::dns_errors::ChallengeError;
use crate::labels::{SOLVER_LABEL, SOLVER_LABEL_VALUE};
use crate::store::{ListFilter, ObjectStore};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Name prefix of challenge records
pub const CHALLENGE_NAME_PREFIX: &str = "challenge-";

/// A challenge as sent by the ACME client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Namespace the challenge record is created in
    pub resource_namespace: String,

    /// Zone the challenge is published in (e.g., `example.com.`)
    pub resolved_zone: String,

    /// Fully qualified challenge name (e.g., `_acme-challenge.www.example.com.`)
    #[serde(rename = "resolvedFQDN")]
    pub resolved_fqdn: String,

    /// Value of the TXT record
    pub key: String,
}

impl ChallengeRequest {
    /// Zone without its trailing dot
    #[must_use]
    pub fn zone(&self) -> &str {
        self.resolved_zone.trim_end_matches('.')
    }

    /// Challenge name relative to the zone
    #[must_use]
    pub fn record_name(&self) -> String {
        let fqdn = self.resolved_fqdn.trim_end_matches('.');
        let zone = self.zone();
        if fqdn == zone {
            return "@".to_string();
        }
        fqdn.strip_suffix(zone)
            .and_then(|name| name.strip_suffix('.'))
            .unwrap_or(fqdn)
            .to_string()
    }
}

/// Presents and cleans up DNS-01 challenges through `DNSRecord`s.
pub struct ChallengeSolver {
    records: Arc<dyn ObjectStore<DNSRecord>>,
}

impl ChallengeSolver {
    #[must_use]
    pub fn new(records: Arc<dyn ObjectStore<DNSRecord>>) -> Self {
        Self { records }
    }

    /// Create the challenge record for `key`.
    ///
    /// # Errors
    ///
    /// Returns the store error when the record cannot be created.
    pub async fn present(
        &self,
        namespace: &str,
        zone: &str,
        name: &str,
        key: &str,
    ) -> Result<DNSRecord, ChallengeError> {
        let mut record = DNSRecord::new(
            "",
            DNSRecordSpec {
                zone: zone.to_string(),
                record_type: "TXT".to_string(),
                name: name.to_string(),
                targets: vec![key.to_string()],
                properties: None,
                ttl: None,
                integration: None,
            },
        );
        record.metadata.name = None;
        record.metadata.generate_name = Some(CHALLENGE_NAME_PREFIX.to_string());
        record.metadata.namespace = Some(namespace.to_string());
        record.metadata.labels = Some(BTreeMap::from([(
            SOLVER_LABEL.to_string(),
            SOLVER_LABEL_VALUE.to_string(),
        )]));

        let created = self.records.create(&record).await?;
        info!(record = %created.name_any(), namespace, zone, name, "Presented DNS-01 challenge");
        Ok(created)
    }

    /// Delete every challenge record in `namespace` whose target is `key`.
    ///
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns [`ChallengeError::UnexpectedTargets`] as soon as a challenge record
    /// without exactly one target is found, or the store error of a failed call.
    pub async fn cleanup(&self, namespace: &str, key: &str) -> Result<usize, ChallengeError> {
        let filter = ListFilter::all()
            .in_namespace(namespace)
            .with_label(SOLVER_LABEL, SOLVER_LABEL_VALUE);
        let challenges = self.records.list(&filter).await?;

        let mut deleted = 0;
        for record in challenges {
            let [target] = record.spec.targets.as_slice() else {
                return Err(ChallengeError::UnexpectedTargets {
                    targets: record.spec.targets.clone(),
                });
            };
            if target != key {
                continue;
            }
            self.records
                .delete(record.namespace().as_deref(), &record.name_any())
                .await?;
            info!(record = %record.name_any(), namespace, "Cleaned up DNS-01 challenge");
            deleted += 1;
        }
        Ok(deleted)
    }
}
