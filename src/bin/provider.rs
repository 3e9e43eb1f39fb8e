// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider worker.
//!
//! Runs one DNS provider for one `DNSIntegration`. The integration controller starts
//! it as a Deployment and passes its settings through `PB_*` environment variables.
//! Replicas compete for a Lease named `<integration>-provider`; only the leader
//! dispatches records.

use anyhow::{Context as _, Result};
use clap::Parser;
use kube::Client;
use kube_lease_manager::LeaseManagerBuilder;
use phonebook::{
    config::ProviderConfig,
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_GRACE_SECS, PROVIDER_LEASE_SUFFIX,
        TOKIO_WORKER_THREADS,
    },
    context::ProviderContext,
    controller::run_provider_controller,
    crd::DNSRecord,
    events::KubeEventRecorder,
    metrics,
    providers::{build_provider, ProviderStore},
    server::{health_router, serve},
    store::KubeStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("phonebook-provider")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_target(false)
            .compact()
            .init();
    }

    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ProviderConfig::parse();
    info!(
        provider = %config.provider,
        integration = %config.integration,
        zones = ?config.zones,
        "Starting phonebook provider worker"
    );

    let client = Client::try_default().await?;

    let provider = build_provider(&config.provider, &config.integration, config.zones.clone())
        .await
        .with_context(|| format!("failed to configure provider {}", config.provider))?;
    let providers = Arc::new(ProviderStore::with_provider(Arc::from(provider)));

    let ctx = Arc::new(ProviderContext::new(
        Arc::new(KubeStore::<DNSRecord>::new(client.clone())),
        Arc::new(KubeEventRecorder::new(client.clone())),
        providers,
        config.integration.clone(),
    ));

    tokio::select! {
        result = run_as_leader(ctx, client, &config) => {
            error!("CRITICAL: provider controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("provider controller exited unexpectedly without error")
        }
        result = serve(health_router(), config.health_addr) => {
            error!("CRITICAL: health server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("health server exited unexpectedly without error")
        }
    }
}

/// Wait for the integration's Lease, then dispatch until leadership is lost.
async fn run_as_leader(
    ctx: Arc<ProviderContext>,
    client: Client,
    config: &ProviderConfig,
) -> Result<()> {
    let lease_name = format!("{}{PROVIDER_LEASE_SUFFIX}", config.integration);

    let manager = LeaseManagerBuilder::new(client.clone(), &lease_name)
        .with_namespace(&config.namespace)
        .with_duration(DEFAULT_LEASE_DURATION_SECS)
        .with_grace(DEFAULT_LEASE_GRACE_SECS)
        .build()
        .await?;
    let (mut leader, lease_task) = manager.watch().await;

    info!(lease = %lease_name, "Waiting for leadership");
    leader
        .wait_for(|is_leader| *is_leader)
        .await
        .context("lease manager stopped before leadership was acquired")?;
    metrics::record_leader_elected(&lease_name);
    info!(lease = %lease_name, "Acquired leadership");

    let result = tokio::select! {
        result = run_provider_controller(ctx, client) => result,
        lost = leader.wait_for(|is_leader| !*is_leader) => {
            metrics::record_leader_lost(&lease_name);
            warn!(lease = %lease_name, "Lost leadership");
            lost.context("lease manager stopped")?;
            Err(anyhow::anyhow!("lost leadership of lease {lease_name}"))
        }
    };

    drop(leader);
    lease_task.abort();
    result
}
