// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSRecord` reconciliation in the controller process.
//!
//! The record reconciler never talks to a provider. It:
//!
//! - adds the record finalizer in its own write, then requeues
//! - resolves the record's zone into provider claims (see [`ResolveTask`])
//! - on deletion, holds the finalizer until every claimed provider reports
//!   `Terminated` or `Error`
//!
//! The provider workers do the remote work, each under its own condition.

use crate::constants::{
    CONFLICT_REQUEUE_DURATION_SECS, FINALIZER_REQUEUE_DURATION_SECS, KIND_DNS_RECORD,
};
use crate::context::Context;
use crate::crd::{ConditionStatus, Conditional, DNSRecord};
use crate::events::warn_event;
use crate::labels::FINALIZER_DNS_RECORD;
use crate::metrics::{record_reconciliation_requeue, record_resource_deleted};
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, is_deleting, remove_finalizer};
use crate::reconcilers::lock::Lock;
use crate::reconcilers::resolver::ResolveTask;
use crate::reconcilers::status::{all_providers_released, condition_status};
use crate::status_reasons::{CONDITION_TYPE_INTEGRATION, EVENT_REASON_RESOLUTION_FAILED};
use anyhow::Result;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// `true` when the record's zone should be (re)resolved.
///
/// A record that was never resolved is always resolved. A failed resolution is only
/// retried after the spec changed, which shows as a generation newer than the one
/// the resolver last observed. A completed resolution is final.
#[must_use]
pub fn needs_resolution(record: &DNSRecord) -> bool {
    match condition_status(record.conditions(), CONDITION_TYPE_INTEGRATION) {
        None | Some(ConditionStatus::Initialized) => true,
        Some(ConditionStatus::Error) => {
            let observed = record.status.as_ref().and_then(|s| s.observed_generation);
            match (record.metadata.generation, observed) {
                (Some(generation), Some(observed)) => generation > observed,
                (Some(_), None) => true,
                (None, _) => false,
            }
        }
        Some(_) => false,
    }
}

fn conflict_requeue() -> Action {
    record_reconciliation_requeue(KIND_DNS_RECORD, "conflict");
    Action::requeue(Duration::from_secs(CONFLICT_REQUEUE_DURATION_SECS))
}

/// Reconcile a `DNSRecord`.
///
/// # Errors
///
/// Returns an error when a store write fails for a reason other than a conflict.
/// Resolution failures are not errors: they are committed to the ledger and
/// reported as a warning event.
pub async fn reconcile_dnsrecord(ctx: Arc<Context>, record: DNSRecord) -> Result<Action> {
    let store = ctx.stores.records.as_ref();

    if is_deleting(&record) {
        return finalize_dnsrecord(&ctx, record).await;
    }

    if !has_finalizer(&record, FINALIZER_DNS_RECORD) {
        return match ensure_finalizer(store, &record, FINALIZER_DNS_RECORD).await {
            Ok(_) => {
                record_reconciliation_requeue(KIND_DNS_RECORD, "finalizer");
                Ok(Action::requeue(Duration::from_secs(
                    FINALIZER_REQUEUE_DURATION_SECS,
                )))
            }
            Err(e) if e.is_conflict() => Ok(conflict_requeue()),
            Err(e) => Err(e.into()),
        };
    }

    if !needs_resolution(&record) {
        debug!(record = %record.name_any(), "Record already resolved");
        return Ok(Action::await_change());
    }

    let mut record = record;
    let mut lock = Lock::new(store, &record, CONDITION_TYPE_INTEGRATION);
    let mut task = ResolveTask::new(ctx.stores.integrations.as_ref());

    match lock.execute(&mut record, &mut task).await {
        Ok(()) => {
            let condition = lock.condition();
            if condition.status == ConditionStatus::Error {
                warn_event(
                    ctx.events.as_ref(),
                    &record,
                    EVENT_REASON_RESOLUTION_FAILED,
                    &condition.reason,
                )
                .await;
            }
            Ok(Action::await_change())
        }
        Err(err) if err.is_conflict() => Ok(conflict_requeue()),
        Err(err) => {
            let err = anyhow::Error::from(err);
            warn_event(
                ctx.events.as_ref(),
                &record,
                CONDITION_TYPE_INTEGRATION,
                &format!("{err:#}"),
            )
            .await;
            Err(err)
        }
    }
}

/// Release a deleted record once no provider can still be holding remote state.
async fn finalize_dnsrecord(ctx: &Context, record: DNSRecord) -> Result<Action> {
    if !has_finalizer(&record, FINALIZER_DNS_RECORD) {
        return Ok(Action::await_change());
    }

    if !all_providers_released(record.conditions()) {
        debug!(record = %record.name_any(), "Waiting for providers to release the record");
        return Ok(Action::await_change());
    }

    match remove_finalizer(ctx.stores.records.as_ref(), &record, FINALIZER_DNS_RECORD).await {
        Ok(_) => {
            info!(record = %record.name_any(), namespace = %record.namespace().unwrap_or_default(), "Released deleted record");
            record_resource_deleted(KIND_DNS_RECORD);
            Ok(Action::await_change())
        }
        Err(e) if e.is_conflict() => Ok(conflict_requeue()),
        Err(e) if e.is_not_found() => Ok(Action::await_change()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "dnsrecord_tests.rs"]
mod dnsrecord_tests;
