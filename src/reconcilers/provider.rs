// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider dispatch: the reconciler running inside each provider worker.
//!
//! A worker serves exactly one integration. For every record it observes it:
//!
//! 1. drops records it has no business with ([`should_dispatch`])
//! 2. drops records outside the adapter's zones
//! 3. locks its own condition (keyed by the integration name) and runs the adapter's
//!    `create` or `delete` against a [`StagedUpdate`]
//! 4. commits the staged outcome through the lock
//!
//! A record pending deletion is always handed to the adapter's `delete`, even when the
//! worker never committed a `Created` condition for it. Adapters treat a record that
//! is already gone remotely as deleted.
//!
//! Adapters never write status themselves. An adapter error forces the condition to
//! `Error` whatever was staged, and an adapter that returns success without staging a
//! status is an error too.

use crate::constants::{CONFLICT_REQUEUE_DURATION_SECS, KIND_PROVIDER_DISPATCH};
use crate::context::ProviderContext;
use crate::crd::{Condition, ConditionStatus, Conditional, DNSRecord};
use crate::events::warn_event;
use crate::labels::provider_claim_key;
use crate::metrics::{record_provider_operation, record_reconciliation_requeue};
use crate::providers::Provider;
use crate::reconcilers::finalizers::is_deleting;
use crate::reconcilers::lock::{Lock, Task};
use crate::reconcilers::staging::StagedUpdate;
use crate::reconcilers::status::condition_status;
use anyhow::Result;
use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// `true` when the worker for `integration` has work to do on `record`.
///
/// The record must carry a live claim (`provider://<integration>`) from the resolver,
/// and the worker's own condition must not have reached `Completed`, `Terminated` or
/// `Error` yet.
#[must_use]
pub fn should_dispatch(record: &DNSRecord, integration: &str) -> bool {
    let conditions = record.conditions();

    match condition_status(conditions, &provider_claim_key(integration)) {
        None | Some(ConditionStatus::Error) => return false,
        Some(_) => {}
    }

    !matches!(
        condition_status(conditions, integration),
        Some(ConditionStatus::Completed | ConditionStatus::Terminated | ConditionStatus::Error)
    )
}

/// Runs one adapter call under the worker's condition lock.
pub struct DispatchTask<'p> {
    provider: &'p dyn Provider,
    integration: &'p str,
    deleting: bool,
}

impl<'p> DispatchTask<'p> {
    #[must_use]
    pub fn new(provider: &'p dyn Provider, integration: &'p str, deleting: bool) -> Self {
        Self {
            provider,
            integration,
            deleting,
        }
    }
}

#[async_trait]
impl Task<DNSRecord> for DispatchTask<'_> {
    async fn run(&mut self, record: &mut DNSRecord, mut condition: Condition) -> Result<Condition> {
        // A create may have reached the provider even when its commit was lost, so
        // deletion always goes through the adapter.
        let operation = match (self.deleting, &condition.status) {
            (true, _) => "delete",
            (false, ConditionStatus::Initialized) => "create",
            (false, _) => return Ok(condition),
        };

        info!(
            record = %record.name_any(),
            integration = %self.integration,
            provider = self.provider.name(),
            operation,
            "Dispatching record to provider"
        );

        let mut staged = StagedUpdate::new();
        let result = if self.deleting {
            self.provider.delete(record, &mut staged).await
        } else {
            self.provider.create(record, &mut staged).await
        };

        if let Err(err) = result {
            record_provider_operation(self.provider.name(), operation, "error");
            return Err(err.into());
        }

        if let Err(err) = staged.commit(record, self.integration, &mut condition) {
            record_provider_operation(self.provider.name(), operation, "error");
            return Err(err.into());
        }

        record_provider_operation(self.provider.name(), operation, condition.status.as_str());
        Ok(condition)
    }
}

/// Reconcile one record on behalf of the worker's integration.
///
/// Conflicts requeue quickly without an event. Any other failure is reported as a
/// warning event on the record (reason: the worker's condition type) and returned.
///
/// # Errors
///
/// Returns an error when no provider is configured, or when the lock failed for any
/// reason other than a conflict.
pub async fn reconcile_provider_record(ctx: Arc<ProviderContext>, record: DNSRecord) -> Result<Action> {
    let integration = ctx.integration.as_str();

    if !should_dispatch(&record, integration) {
        debug!(record = %record.name_any(), integration, "Nothing to dispatch");
        return Ok(Action::await_change());
    }

    let provider = ctx.providers.provider()?;
    if !provider.zones().iter().any(|zone| *zone == record.spec.zone) {
        debug!(
            record = %record.name_any(),
            integration,
            zone = %record.spec.zone,
            "Zone is not served by this provider"
        );
        return Ok(Action::await_change());
    }

    let deleting = is_deleting(&record);
    let mut record = record;
    let mut lock = Lock::new(ctx.records.as_ref(), &record, integration);
    let mut task = DispatchTask::new(provider.as_ref(), integration, deleting);

    match lock.execute(&mut record, &mut task).await {
        Ok(()) => Ok(Action::await_change()),
        Err(err) if err.is_conflict() => {
            debug!(record = %record.name_any(), integration, "Conflict while committing, requeueing");
            record_reconciliation_requeue(KIND_PROVIDER_DISPATCH, "conflict");
            Ok(Action::requeue(Duration::from_secs(
                CONFLICT_REQUEUE_DURATION_SECS,
            )))
        }
        Err(err) => {
            let err = anyhow::Error::from(err);
            warn_event(ctx.events.as_ref(), &record, integration, &format!("{err:#}")).await;
            Err(err)
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
