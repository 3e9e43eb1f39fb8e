// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP endpoints served next to the controllers.
//!
//! The controller serves:
//!
//! - `GET /metrics` - Prometheus metrics
//! - `GET /healthz` and `GET /readyz` - liveness and readiness checks
//! - `POST /solver/present` and `POST /solver/cleanup` - DNS-01 challenge solver
//!
//! Provider workers only serve the health checks and metrics ([`health_router`]).

use crate::constants::METRICS_SERVER_PATH;
use crate::dns_errors::ChallengeError;
use crate::metrics::gather_metrics;
use crate::solver::{ChallengeRequest, ChallengeSolver};
use anyhow::{Context as _, Result};
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use kube::ResourceExt;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {e}"),
            )
                .into_response()
        }
    }
}

async fn ok_handler() -> &'static str {
    "ok"
}

impl IntoResponse for ChallengeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChallengeError::UnexpectedTargets { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ChallengeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self, "Challenge solver request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn present_handler(
    State(solver): State<Arc<ChallengeSolver>>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Response, ChallengeError> {
    let record = solver
        .present(
            &request.resource_namespace,
            request.zone(),
            &request.record_name(),
            &request.key,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "name": record.name_any() }))).into_response())
}

async fn cleanup_handler(
    State(solver): State<Arc<ChallengeSolver>>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Response, ChallengeError> {
    let deleted = solver
        .cleanup(&request.resource_namespace, &request.key)
        .await?;
    Ok((StatusCode::OK, Json(json!({ "deleted": deleted }))).into_response())
}

/// Probes and metrics
#[must_use]
pub fn health_router() -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route("/healthz", get(ok_handler))
        .route("/readyz", get(ok_handler))
}

/// Probes, metrics and the challenge solver
#[must_use]
pub fn controller_router(solver: Arc<ChallengeSolver>) -> Router {
    let solver_routes = Router::new()
        .route("/solver/present", post(present_handler))
        .route("/solver/cleanup", post(cleanup_handler))
        .with_state(solver);

    health_router().merge(solver_routes)
}

/// Serve `router` on `addr` until the listener fails.
///
/// # Errors
///
/// Returns an error when the address cannot be bound or the server stops.
pub async fn serve(router: Router, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP server on {addr}"))?;
    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, router)
        .await
        .context("HTTP server stopped")
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
