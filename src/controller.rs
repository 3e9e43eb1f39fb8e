// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller runners.
//!
//! Each runner wires one reconciler into a `kube::runtime::Controller` and runs it
//! until the watch stream ends. The reconcile wrappers add logging and metrics around
//! the reconcilers in [`crate::reconcilers`].

use crate::constants::{
    ERROR_REQUEUE_DURATION_SECS, KIND_DNS_INTEGRATION, KIND_DNS_RECORD, KIND_PROVIDER_DISPATCH,
};
use crate::context::{Context, ProviderContext};
use crate::crd::{DNSIntegration, DNSRecord};
use crate::metrics;
use crate::reconcilers::{reconcile_dnsintegration, reconcile_dnsrecord, reconcile_provider_record};
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, ResourceExt};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Reconciliation error wrapper
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Requeue a failed reconciliation after [`ERROR_REQUEUE_DURATION_SECS`].
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
pub fn error_policy<T, C>(resource: Arc<T>, err: &ReconcileError, _ctx: Arc<C>) -> Action
where
    T: Debug,
{
    error!(
        error = %err,
        resource = ?resource,
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

fn record_outcome<T>(kind: &str, start: Instant, result: &Result<T>) {
    let duration = start.elapsed();
    match result {
        Ok(_) => metrics::record_reconciliation_success(kind, duration),
        Err(_) => metrics::record_reconciliation_error(kind, duration),
    }
}

/// Run the `DNSRecord` controller across all namespaces.
///
/// # Errors
///
/// Currently never returns an error; the result keeps the runners uniform.
pub async fn run_dnsrecord_controller(ctx: Arc<Context>, client: Client) -> Result<()> {
    info!("Starting {} controller", KIND_DNS_RECORD);

    let api = Api::<DNSRecord>::all(client);

    Controller::new(api, WatcherConfig::default())
        .run(reconcile_dnsrecord_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_dnsrecord_wrapper(
    record: Arc<DNSRecord>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    debug!(
        record = %record.name_any(),
        namespace = ?record.namespace(),
        "Reconcile wrapper called for DNSRecord"
    );

    let result = reconcile_dnsrecord(ctx, (*record).clone()).await;
    record_outcome(KIND_DNS_RECORD, start, &result);

    if let Err(e) = &result {
        error!("Failed to reconcile DNSRecord {}: {:#}", record.name_any(), e);
    }
    Ok(result?)
}

/// Run the `DNSIntegration` controller.
///
/// Provider Deployments in the controller namespace are owned by their integration,
/// so a change to one re-triggers the integration's health check.
///
/// # Errors
///
/// Currently never returns an error; the result keeps the runners uniform.
pub async fn run_dnsintegration_controller(ctx: Arc<Context>, client: Client) -> Result<()> {
    info!("Starting {} controller", KIND_DNS_INTEGRATION);

    let api = Api::<DNSIntegration>::all(client.clone());
    let deployments = Api::<Deployment>::namespaced(client, &ctx.config.namespace);

    Controller::new(api, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .run(reconcile_dnsintegration_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_dnsintegration_wrapper(
    integration: Arc<DNSIntegration>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    debug!(
        integration = %integration.name_any(),
        "Reconcile wrapper called for DNSIntegration"
    );

    let result = reconcile_dnsintegration(ctx, (*integration).clone()).await;
    record_outcome(KIND_DNS_INTEGRATION, start, &result);

    if let Err(e) = &result {
        error!(
            "Failed to reconcile DNSIntegration {}: {:#}",
            integration.name_any(),
            e
        );
    }
    Ok(result?)
}

/// Run the dispatch controller of a provider worker.
///
/// Watches every `DNSRecord` and hands the ones claimed by this worker's integration
/// to its provider.
///
/// # Errors
///
/// Currently never returns an error; the result keeps the runners uniform.
pub async fn run_provider_controller(ctx: Arc<ProviderContext>, client: Client) -> Result<()> {
    info!(
        integration = %ctx.integration,
        "Starting {} controller", KIND_PROVIDER_DISPATCH
    );

    let api = Api::<DNSRecord>::all(client);

    Controller::new(api, WatcherConfig::default())
        .run(reconcile_provider_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_provider_wrapper(
    record: Arc<DNSRecord>,
    ctx: Arc<ProviderContext>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    let result = reconcile_provider_record(ctx.clone(), (*record).clone()).await;
    record_outcome(KIND_PROVIDER_DISPATCH, start, &result);

    if let Err(e) = &result {
        error!(
            integration = %ctx.integration,
            "Failed to dispatch DNSRecord {}: {:#}",
            record.name_any(),
            e
        );
    }
    Ok(result?)
}
