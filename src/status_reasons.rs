// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition types and reason texts used in phonebook status ledgers.
//!
//! Unlike upstream Kubernetes conditions, a phonebook condition carries a lifecycle
//! status (`Initialized`, `Created`, `Error`, ...) and a human-readable reason. This
//! module keeps the condition type names and the reason texts in one place so the
//! reconcilers and the tests agree on them.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Integration
//!       status: Completed
//!       reason: Found 1 integration that has authority over example.com
//!     - type: cloudflare-prod
//!       status: Created
//!       reason: Cloudflare record created
//!     - type: provider://cloudflare-prod
//!       status: Completed
//!       reason: Integration has authority over example.com
//!   remoteInfo:
//!     cloudflare-prod:
//!       recordID: 023e105f4ecef8ad9ca31a8372d0c353
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Top-level resolution condition on a `DNSRecord`
pub const CONDITION_TYPE_INTEGRATION: &str = "Integration";

/// Worker provisioning condition on a `DNSIntegration`
pub const CONDITION_TYPE_DEPLOYMENT: &str = "Deployment";

/// Worker health condition on a `DNSIntegration`
pub const CONDITION_TYPE_HEALTH: &str = "Health";

// ============================================================================
// Event Reasons
// ============================================================================

/// Event type for warnings (Kubernetes `Event.type`)
pub const EVENT_TYPE_WARNING: &str = "Warning";

/// Event reason used when a record's zone resolution fails
pub const EVENT_REASON_RESOLUTION_FAILED: &str = "ResolutionFailed";

/// Event reason used when the worker deployment cannot be provisioned
pub const EVENT_REASON_DEPLOYMENT_FAILED: &str = "DeploymentFailed";

/// Event reason used when the worker is unhealthy
pub const EVENT_REASON_UNHEALTHY: &str = "Unhealthy";

// ============================================================================
// Reason Texts
// ============================================================================

/// Reason set on a `DNSIntegration` deployment condition while it is torn down
pub const REASON_TEARING_DOWN: &str = "Tearing down the integration";

/// Reason set on the health condition while no worker replica is observable
pub const REASON_WAITING_FOR_DEPLOYMENT: &str = "Waiting for deployment to be available";

/// Reason set on the health condition when every worker replica is healthy
pub const REASON_HEALTHY: &str = "Healthy";

/// Reason for a provider claim written by the zone resolver
#[must_use]
pub fn reason_has_authority(zone: &str) -> String {
    format!("Integration has authority over {zone}")
}

/// Reason for a successful zone resolution
#[must_use]
pub fn reason_found_integrations(count: usize, zone: &str) -> String {
    format!("Found {count} integration that has authority over {zone}")
}

/// Reason for a failed zone resolution
#[must_use]
pub fn reason_no_integration(zone: &str) -> String {
    format!("No Integration matches the zone for this record: {zone}")
}

/// Reason for a provisioned worker deployment
#[must_use]
pub fn reason_deployment_created(name: &str) -> String {
    format!("Deployment Created: {name}")
}

/// Error text for a worker deployment reporting a non-`True` condition
#[must_use]
pub fn reason_deployment_unhealthy(name: &str) -> String {
    format!("Deployment({name}) is not healthy. Check the logs of the pods for more info.")
}
