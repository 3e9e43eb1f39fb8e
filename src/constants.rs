// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the phonebook controller and provider workers.
//!
//! Constants are grouped by concern. Label keys and finalizers live in
//! [`crate::labels`], condition reasons in [`crate::status_reasons`].

// ============================================================================
// API Constants
// ============================================================================

/// API group for all phonebook CRDs
pub const API_GROUP: &str = "se.quencer.io";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "se.quencer.io/v1alpha1";

/// Kind name for `DNSRecord` resource
pub const KIND_DNS_RECORD: &str = "DNSRecord";

/// Kind name for `DNSIntegration` resource
pub const KIND_DNS_INTEGRATION: &str = "DNSIntegration";

/// Kind name used in metrics for provider dispatch reconciliations
pub const KIND_PROVIDER_DISPATCH: &str = "ProviderDispatch";

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration after an optimistic-concurrency conflict
pub const CONFLICT_REQUEUE_DURATION_SECS: u64 = 1;

/// Requeue duration used right after a finalizer was added
pub const FINALIZER_REQUEUE_DURATION_SECS: u64 = 1;

/// Interval between worker health polls while the worker is not ready
pub const HEALTH_POLL_INTERVAL_SECS: u64 = 10;

/// Interval between worker health polls once the worker is healthy
pub const HEALTHY_REQUEUE_DURATION_SECS: u64 = 300;

// ============================================================================
// Provider Worker Constants
// ============================================================================

/// Namespace used for provider workers when `PB_NAMESPACE` is not set
pub const DEFAULT_NAMESPACE: &str = "phonebook-system";

/// Service account used for provider workers when `PB_PROVIDER_SERVICE_ACC` is not set
pub const DEFAULT_PROVIDER_SERVICE_ACCOUNT: &str = "phonebook-providers";

/// Container name inside every provider worker pod
pub const PROVIDER_CONTAINER_NAME: &str = "provider";

/// Prefix of the generated provider worker deployment name
pub const PROVIDER_DEPLOYMENT_PREFIX: &str = "provider-";

/// Registry path of the published provider images
pub const PROVIDER_IMAGE_REPOSITORY: &str = "ghcr.io/pier-oliviert/providers";

/// Replica count for provider workers (leader election keeps one active)
pub const PROVIDER_REPLICAS: i32 = 1;

/// Directory holding file-mounted provider configuration
pub const PROVIDER_CONFIG_DIR: &str = "/var/run/configs/provider";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Namespace that holds the provider workers
pub const ENV_NAMESPACE: &str = "PB_NAMESPACE";

/// Service account assigned to provider workers
pub const ENV_PROVIDER_SERVICE_ACCOUNT: &str = "PB_PROVIDER_SERVICE_ACC";

/// Image tag used for the default provider images
pub const ENV_PROVIDER_VERSION: &str = "PB_PROVIDER_VERSION";

/// Provider adapter name inside a worker
pub const ENV_PROVIDER: &str = "PB_PROVIDER";

/// Integration name inside a worker
pub const ENV_INTEGRATION: &str = "PB_INTEGRATION";

/// Comma-separated owned zones inside a worker
pub const ENV_ZONES: &str = "PB_ZONES";

// ============================================================================
// DNS Constants
// ============================================================================

/// Default TTL for Cloudflare records
pub const CLOUDFLARE_DEFAULT_TTL_SECS: i64 = 60;

/// Default TTL for deSEC RRsets (deSEC's minimum for most domains)
pub const DESEC_DEFAULT_TTL_SECS: i64 = 3600;

/// Default TTL for G-Core RRsets
pub const GCORE_DEFAULT_TTL_SECS: i64 = 120;

/// Default TTL for RFC2136 updates
pub const RFC2136_DEFAULT_TTL_SECS: i64 = 60;

/// Default TTL for Azure DNS record sets
pub const AZURE_DEFAULT_TTL_SECS: i64 = 60;

/// Default TTL for Route53 record sets (unused for alias records)
pub const ROUTE53_DEFAULT_TTL_SECS: i64 = 60;

/// Standard DNS port
pub const DNS_PORT: u16 = 53;

/// TSIG fudge time in seconds (allows for clock skew)
pub const TSIG_FUDGE_TIME_SECS: u64 = 300;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Provider worker lease duration
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Grace period before a lease is considered lost
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 2;

/// Suffix of the provider worker lease name
pub const PROVIDER_LEASE_SUFFIX: &str = "-provider";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Page size for paginated Kubernetes list calls
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// HTTP Server Constants
// ============================================================================

/// Default bind address of the controller metrics/solver server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Default bind address of the provider worker health server
pub const DEFAULT_HEALTH_ADDR: &str = "0.0.0.0:8081";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
