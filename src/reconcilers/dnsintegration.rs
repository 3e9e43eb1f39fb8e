// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSIntegration` reconciliation.
//!
//! An integration goes through two conditions, in order:
//!
//! 1. `Deployment`: provision the provider worker ([`deployment::DeploymentTask`])
//! 2. `Health`: poll the worker Deployment ([`health::HealthTask`])
//!
//! On deletion the `Deployment` condition is moved to `Terminated`, then the finalizer
//! is released. The worker itself is removed by garbage collection through its owner
//! reference.

pub mod deployment;
pub mod health;

use crate::constants::{
    CONFLICT_REQUEUE_DURATION_SECS, FINALIZER_REQUEUE_DURATION_SECS, HEALTHY_REQUEUE_DURATION_SECS,
    HEALTH_POLL_INTERVAL_SECS, KIND_DNS_INTEGRATION,
};
use crate::context::Context;
use crate::crd::{Condition, ConditionStatus, Conditional, DNSIntegration};
use crate::events::warn_event;
use crate::labels::FINALIZER_DNS_INTEGRATION;
use crate::metrics::{record_reconciliation_requeue, record_resource_deleted};
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, is_deleting, remove_finalizer};
use crate::reconcilers::lock::{Lock, Task};
use crate::reconcilers::status::condition_status;
use crate::status_reasons::{
    CONDITION_TYPE_DEPLOYMENT, CONDITION_TYPE_HEALTH, EVENT_REASON_DEPLOYMENT_FAILED,
    EVENT_REASON_UNHEALTHY, REASON_TEARING_DOWN,
};
use anyhow::Result;
use async_trait::async_trait;
use deployment::DeploymentTask;
use health::HealthTask;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

fn requeue_after(secs: u64, reason: &str) -> Action {
    record_reconciliation_requeue(KIND_DNS_INTEGRATION, reason);
    Action::requeue(Duration::from_secs(secs))
}

/// Marks the worker as torn down
struct TeardownTask;

#[async_trait]
impl Task<DNSIntegration> for TeardownTask {
    async fn run(&mut self, _integration: &mut DNSIntegration, mut condition: Condition) -> Result<Condition> {
        condition.status = ConditionStatus::Terminated;
        condition.reason = REASON_TEARING_DOWN.to_string();
        Ok(condition)
    }
}

/// Reconcile a `DNSIntegration`.
///
/// # Errors
///
/// Returns an error when provisioning the worker fails, when the worker is
/// unhealthy, or when a store write fails for a reason other than a conflict.
pub async fn reconcile_dnsintegration(ctx: Arc<Context>, integration: DNSIntegration) -> Result<Action> {
    let store = ctx.stores.integrations.as_ref();
    let mut integration = integration;

    info!(integration = %integration.name_any(), "Reconciling DNSIntegration");

    if is_deleting(&integration) {
        return finalize_dnsintegration(&ctx, integration).await;
    }

    if !has_finalizer(&integration, FINALIZER_DNS_INTEGRATION) {
        return match ensure_finalizer(store, &integration, FINALIZER_DNS_INTEGRATION).await {
            Ok(_) => Ok(requeue_after(FINALIZER_REQUEUE_DURATION_SECS, "finalizer")),
            Err(e) if e.is_conflict() => Ok(requeue_after(CONFLICT_REQUEUE_DURATION_SECS, "conflict")),
            Err(e) => Err(e.into()),
        };
    }

    let deployment_status = condition_status(integration.conditions(), CONDITION_TYPE_DEPLOYMENT);
    if matches!(
        deployment_status,
        None | Some(ConditionStatus::Initialized | ConditionStatus::Error)
    ) {
        let mut lock = Lock::new(store, &integration, CONDITION_TYPE_DEPLOYMENT);
        let mut task = DeploymentTask::new(ctx.stores.deployments.as_ref(), &ctx.config);

        return match lock.execute(&mut integration, &mut task).await {
            Ok(()) => Ok(requeue_after(HEALTH_POLL_INTERVAL_SECS, "health")),
            Err(err) if err.is_conflict() => Ok(requeue_after(CONFLICT_REQUEUE_DURATION_SECS, "conflict")),
            Err(err) => {
                let err = anyhow::Error::from(err);
                warn_event(ctx.events.as_ref(), &integration, EVENT_REASON_DEPLOYMENT_FAILED, &format!("{err:#}")).await;
                Err(err)
            }
        };
    }

    let mut lock = Lock::new(store, &integration, CONDITION_TYPE_HEALTH);
    let mut task = HealthTask::new(ctx.stores.deployments.as_ref(), &ctx.config.namespace);

    match lock.execute(&mut integration, &mut task).await {
        Ok(()) if lock.condition().status == ConditionStatus::Completed => {
            Ok(requeue_after(HEALTHY_REQUEUE_DURATION_SECS, "health"))
        }
        Ok(()) => {
            debug!(integration = %integration.name_any(), reason = %lock.condition().reason, "Worker not observable yet");
            Ok(requeue_after(HEALTH_POLL_INTERVAL_SECS, "health"))
        }
        Err(err) if err.is_conflict() => Ok(requeue_after(CONFLICT_REQUEUE_DURATION_SECS, "conflict")),
        Err(err) => {
            let err = anyhow::Error::from(err);
            warn_event(ctx.events.as_ref(), &integration, EVENT_REASON_UNHEALTHY, &format!("{err:#}")).await;
            Err(err)
        }
    }
}

/// Tear down an integration: mark its worker `Terminated`, then release it.
async fn finalize_dnsintegration(ctx: &Context, integration: DNSIntegration) -> Result<Action> {
    if !has_finalizer(&integration, FINALIZER_DNS_INTEGRATION) {
        return Ok(Action::await_change());
    }

    let store = ctx.stores.integrations.as_ref();

    if condition_status(integration.conditions(), CONDITION_TYPE_DEPLOYMENT)
        != Some(ConditionStatus::Terminated)
    {
        let mut integration = integration;
        let mut lock = Lock::new(store, &integration, CONDITION_TYPE_DEPLOYMENT);
        return match lock.execute(&mut integration, &mut TeardownTask).await {
            Ok(()) => Ok(requeue_after(FINALIZER_REQUEUE_DURATION_SECS, "finalizer")),
            Err(err) if err.is_conflict() => Ok(requeue_after(CONFLICT_REQUEUE_DURATION_SECS, "conflict")),
            Err(err) => Err(err.into()),
        };
    }

    match remove_finalizer(store, &integration, FINALIZER_DNS_INTEGRATION).await {
        Ok(_) => {
            info!(integration = %integration.name_any(), "Released deleted DNSIntegration");
            record_resource_deleted(KIND_DNS_INTEGRATION);
            Ok(Action::await_change())
        }
        Err(e) if e.is_conflict() => Ok(requeue_after(CONFLICT_REQUEUE_DURATION_SECS, "conflict")),
        Err(e) if e.is_not_found() => Ok(Action::await_change()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "dnsintegration_tests.rs"]
mod dnsintegration_tests;
