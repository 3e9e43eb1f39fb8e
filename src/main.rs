// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use phonebook::{
    config::ControllerConfig,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    controller::{run_dnsintegration_controller, run_dnsrecord_controller},
    server::{controller_router, serve},
    solver::ChallengeSolver,
};
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("phonebook-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize tracing.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or text).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_tracing();

    // reqwest and kube share one rustls provider; a second install is harmless
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ControllerConfig::parse();
    info!(
        namespace = %config.namespace,
        provider_version = %config.provider_version,
        "Starting phonebook controller"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let metrics_addr = config.metrics_addr;
    let ctx = Arc::new(Context::kubernetes(&client, config));
    let solver = Arc::new(ChallengeSolver::new(ctx.stores.records.clone()));

    info!("Starting all controllers");

    tokio::select! {
        result = run_dnsrecord_controller(ctx.clone(), client.clone()) => {
            error!("CRITICAL: DNSRecord controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("DNSRecord controller exited unexpectedly without error")
        }
        result = run_dnsintegration_controller(ctx.clone(), client.clone()) => {
            error!("CRITICAL: DNSIntegration controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("DNSIntegration controller exited unexpectedly without error")
        }
        result = serve(controller_router(solver), metrics_addr) => {
            error!("CRITICAL: HTTP server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("HTTP server exited unexpectedly without error")
        }
    }
}
