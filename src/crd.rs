// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for phonebook.
//!
//! # Resource Types
//!
//! - [`DNSRecord`] - A DNS record the user wants published (namespaced)
//! - [`DNSIntegration`] - A DNS provider and the zones it has authority over (cluster scoped)
//!
//! Both resources carry a condition ledger ([`Condition`]) in their status. The
//! ledger is keyed by condition type and kept ordered by type.
//!
//! # Example: Declaring a Record
//!
//! ```rust,no_run
//! use phonebook::crd::DNSRecordSpec;
//!
//! let spec = DNSRecordSpec {
//!     zone: "example.com".to_string(),
//!     record_type: "A".to_string(),
//!     name: "www".to_string(),
//!     targets: vec!["192.0.2.10".to_string()],
//!     properties: None,
//!     ttl: Some(300),
//!     integration: None,
//! };
//! ```

use k8s_openapi::api::core::v1::EnvVar;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status of a [`Condition`].
///
/// The set is open: providers may report their own statuses, which are kept in
/// [`ConditionStatus::Custom`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionStatus {
    #[default]
    Initialized,
    Locked,
    Created,
    Completed,
    Terminating,
    Terminated,
    Waiting,
    Error,
    Custom(String),
}

impl ConditionStatus {
    /// String form as persisted in the status subresource
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initialized => "Initialized",
            Self::Locked => "Locked",
            Self::Created => "Created",
            Self::Completed => "Completed",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
            Self::Waiting => "Waiting",
            Self::Error => "Error",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// `true` for the statuses that end a provider's involvement with a deleted record
    #[must_use]
    pub fn is_terminal_for_deletion(&self) -> bool {
        matches!(self, Self::Error | Self::Terminated)
    }
}

impl From<String> for ConditionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Initialized" => Self::Initialized,
            "Locked" => Self::Locked,
            "Created" => Self::Created,
            "Completed" => Self::Completed,
            "Terminating" => Self::Terminating,
            "Terminated" => Self::Terminated,
            "Waiting" => Self::Waiting,
            "Error" => Self::Error,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for ConditionStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ConditionStatus> for String {
    fn from(value: ConditionStatus) -> Self {
        match value {
            ConditionStatus::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents one entry of a resource's condition ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Key of the condition. Unique within a ledger.
    pub r#type: String,

    /// Lifecycle status: Initialized, Locked, Created, Completed, Terminating,
    /// Terminated, Waiting, Error or a provider-specific value.
    #[schemars(with = "String")]
    pub status: ConditionStatus,

    /// Human-readable explanation of the current status.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Last time the status changed (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    /// A fresh, not yet persisted condition with status `Initialized`.
    #[must_use]
    pub fn initialized(condition_type: &str) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: ConditionStatus::Initialized,
            reason: String::new(),
            last_transition_time: None,
        }
    }
}

/// Access to the condition ledger of a resource.
pub trait Conditional {
    /// Current ledger, empty when the resource has no status yet
    fn conditions(&self) -> &[Condition];

    /// Mutable ledger, creating an empty status if needed
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

// ============================================================================
// DNSRecord
// ============================================================================

/// `DNSRecord` declares one DNS record set that phonebook publishes through every
/// integration with authority over its zone.
///
/// # Example
///
/// ```yaml
/// apiVersion: se.quencer.io/v1alpha1
/// kind: DNSRecord
/// metadata:
///   name: www
///   namespace: default
/// spec:
///   zone: example.com
///   recordType: A
///   name: www
///   targets:
///     - 192.0.2.10
///   properties:
///     proxied: "true"
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "se.quencer.io",
    version = "v1alpha1",
    kind = "DNSRecord",
    namespaced,
    shortname = "dnsrec",
    doc = "DNSRecord is a DNS record set published by every DNSIntegration that has authority over its zone.",
    printcolumn = r#"{"name":"Zone","type":"string","jsonPath":".spec.zone"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.recordType"}"#,
    printcolumn = r#"{"name":"Name","type":"string","jsonPath":".spec.name"}"#
)]
#[kube(status = "DNSRecordStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordSpec {
    /// Zone the record belongs to (e.g., "example.com").
    pub zone: String,

    /// Record type (A, AAAA, CNAME, TXT, MX, NS, ...).
    pub record_type: String,

    /// Record name relative to the zone. "@" or empty addresses the apex.
    pub name: String,

    /// Record values. Ordering is meaningful for some record types.
    pub targets: Vec<String>,

    /// Provider-specific settings (e.g., `proxied` for Cloudflare).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,

    /// TTL in seconds. Providers fall back to their own default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,

    /// Only publish through this integration, instead of every integration owning the zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
}

/// `DNSRecord` status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Provider bookkeeping, keyed by integration name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remote_info: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl DNSRecord {
    /// Value of a property, if set
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.spec
            .properties
            .as_ref()
            .and_then(|p| p.get(key))
            .map(String::as_str)
    }

    /// Bookkeeping stored by an integration, if any
    #[must_use]
    pub fn remote_info(&self, integration: &str) -> Option<&BTreeMap<String, String>> {
        self.status
            .as_ref()
            .and_then(|s| s.remote_info.get(integration))
    }

    /// Fully qualified name of the record (`name.zone`, or the zone for the apex)
    #[must_use]
    pub fn fqdn(&self) -> String {
        match self.spec.name.as_str() {
            "" | "@" => self.spec.zone.clone(),
            name => format!("{name}.{}", self.spec.zone),
        }
    }
}

impl Conditional for DNSRecord {
    fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map_or(&[], |s| s.conditions.as_slice())
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }
}

// ============================================================================
// DNSIntegration
// ============================================================================

/// `DNSIntegration` configures a DNS provider, the zones it has authority over and
/// how its worker process is deployed.
///
/// # Example
///
/// ```yaml
/// apiVersion: se.quencer.io/v1alpha1
/// kind: DNSIntegration
/// metadata:
///   name: cloudflare-prod
/// spec:
///   provider:
///     name: cloudflare
///   zones:
///     - example.com
///   secretRef:
///     name: cloudflare-credentials
///     keys:
///       - name: CF_API_TOKEN
///         key: token
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "se.quencer.io",
    version = "v1alpha1",
    kind = "DNSIntegration",
    doc = "DNSIntegration declares a DNS provider and the zones it has authority over. Phonebook runs one provider worker per integration.",
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider.name"}"#
)]
#[kube(status = "DNSIntegrationStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSIntegrationSpec {
    /// Provider adapter and worker image settings.
    pub provider: DNSProviderSpec,

    /// Zones this integration has authority over. Several integrations may list the same zone.
    pub zones: Vec<String>,

    /// Extra environment variables passed to the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    /// Secret keys exported to the worker as environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

/// Provider section of a `DNSIntegration`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSProviderSpec {
    /// Adapter name (aws, azure, cloudflare, desec, gcore, rfc2136).
    pub name: String,

    /// Override the worker image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Override the worker entrypoint.
    #[serde(default, rename = "cmd", skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Reference to a secret and the keys to export from it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<SecretKey>,
}

/// One exported secret key
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKey {
    /// Environment variable name inside the worker
    pub name: String,
    /// Key inside the secret
    pub key: String,
}

/// `DNSIntegration` status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSIntegrationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// The worker deployment provisioned for this integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentReference>,
}

/// Name and namespace of a provisioned worker deployment
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentReference {
    pub name: String,
    pub namespace: String,
}

impl DNSIntegration {
    /// `true` when this integration lists `zone`
    #[must_use]
    pub fn has_authority_over(&self, zone: &str) -> bool {
        self.spec.zones.iter().any(|z| z == zone)
    }
}

impl Conditional for DNSIntegration {
    fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map_or(&[], |s| s.conditions.as_slice())
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }
}
