// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, finalizer and condition-key constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and phonebook-specific labels
//! to ensure consistency across all resources created by the controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` on every resource phonebook creates
pub const PART_OF_PHONEBOOK: &str = "phonebook";

/// Component value for provider workers
pub const COMPONENT_PROVIDER: &str = "provider";

/// Value for `app.kubernetes.io/managed-by` on worker deployments
pub const MANAGED_BY_DNS_INTEGRATION: &str = "DNSIntegration";

// ============================================================================
// Phonebook-Specific Labels
// ============================================================================

/// Label selecting the worker deployment of an integration (value: integration name)
pub const DEPLOYMENT_LABEL: &str = "phonebook.se.quencer.io/deployment";

/// Label marking records created for an ACME DNS-01 challenge
pub const SOLVER_LABEL: &str = "phonebook.se.quencer.io/solver";

/// Value of [`SOLVER_LABEL`]
pub const SOLVER_LABEL_VALUE: &str = "dns-01-challenge";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `DNSRecord` resources
pub const FINALIZER_DNS_RECORD: &str = "phonebook.se.quencer.io/finalizer";

/// Finalizer for `DNSIntegration` resources
pub const FINALIZER_DNS_INTEGRATION: &str = "phonebook.se.quencer.io/deployment";

// ============================================================================
// Condition Keys
// ============================================================================

/// Prefix of the per-integration claim written by the zone resolver
pub const PROVIDER_CONDITION_PREFIX: &str = "provider://";

/// Build the claim condition key for an integration (`provider://<name>`)
#[must_use]
pub fn provider_claim_key(integration: &str) -> String {
    format!("{PROVIDER_CONDITION_PREFIX}{integration}")
}

/// Extract the integration name from a claim condition key
#[must_use]
pub fn integration_from_claim_key(key: &str) -> Option<&str> {
    key.strip_prefix(PROVIDER_CONDITION_PREFIX)
}
