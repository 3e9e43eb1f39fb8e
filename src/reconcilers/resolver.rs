// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone to integration resolution for `DNSRecord` resources.
//!
//! A record is served by every `DNSIntegration` whose zones contain the record's
//! zone. When the record names an integration explicitly, only that integration is
//! considered, and it must still own the zone.
//!
//! Each match gets a `provider://<integration>` claim in the record's ledger. The
//! top-level `Integration` condition summarizes the outcome. Running the resolver
//! again over the same integrations rewrites the same entries.

use crate::crd::{Condition, ConditionStatus, Conditional, DNSIntegration, DNSRecord, DNSRecordSpec};
use crate::labels::provider_claim_key;
use crate::reconcilers::lock::Task;
use crate::reconcilers::status::set_status;
use crate::status_reasons::{reason_found_integrations, reason_has_authority, reason_no_integration};
use crate::store::{ListFilter, ObjectStore};
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info};

/// Integrations allowed to serve a record with `spec`, sorted by name.
#[must_use]
pub fn matching_integrations<'a>(
    spec: &DNSRecordSpec,
    integrations: &'a [DNSIntegration],
) -> Vec<&'a DNSIntegration> {
    let mut matches: Vec<&DNSIntegration> = integrations
        .iter()
        .filter(|i| spec.integration.as_deref().is_none_or(|hint| i.name_any() == hint))
        .filter(|i| i.has_authority_over(&spec.zone))
        .collect();
    matches.sort_by_key(|i| i.name_any());
    matches
}

/// Resolve a record's zone into provider claims.
///
/// Runs under the lock of the `Integration` condition. Both outcomes are returned as
/// a condition (`Completed` or `Error`), so the record's `observedGeneration` is
/// stamped either way.
pub struct ResolveTask<'a> {
    integrations: &'a dyn ObjectStore<DNSIntegration>,
}

impl<'a> ResolveTask<'a> {
    #[must_use]
    pub fn new(integrations: &'a dyn ObjectStore<DNSIntegration>) -> Self {
        Self { integrations }
    }
}

#[async_trait]
impl Task<DNSRecord> for ResolveTask<'_> {
    async fn run(&mut self, record: &mut DNSRecord, mut condition: Condition) -> anyhow::Result<Condition> {
        let integrations = self.integrations.list(&ListFilter::all()).await?;
        let matches = matching_integrations(&record.spec, &integrations);
        let zone = record.spec.zone.clone();

        record.status.get_or_insert_with(Default::default).observed_generation =
            record.metadata.generation;

        if matches.is_empty() {
            info!(record = %record.name_any(), zone = %zone, "No integration has authority over zone");
            condition.status = ConditionStatus::Error;
            condition.reason = reason_no_integration(&zone);
            return Ok(condition);
        }

        for integration in &matches {
            debug!(record = %record.name_any(), integration = %integration.name_any(), "Claiming record");
            set_status(
                record.conditions_mut(),
                &provider_claim_key(&integration.name_any()),
                ConditionStatus::Completed,
                reason_has_authority(&zone),
            );
        }

        condition.status = ConditionStatus::Completed;
        condition.reason = reason_found_integrations(matches.len(), &zone);
        Ok(condition)
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
