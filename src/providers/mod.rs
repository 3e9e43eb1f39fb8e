// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS provider adapters.
//!
//! Each provider worker process runs exactly one adapter, selected by name at
//! startup ([`build_provider`]) and kept in a [`ProviderStore`] that the dispatch
//! reconciler receives through its context.
//!
//! Adapters report outcomes through a [`StagingUpdater`]: on success they must stage
//! a condition status (`Created` on create, `Terminated` on delete), plus any
//! bookkeeping they need later (such as a remote record ID).
//!
//! # Supported providers
//!
//! | Name         | Backend                                  |
//! |--------------|------------------------------------------|
//! | `aws`        | Route53 REST API, SigV4 signed           |
//! | `azure`      | Azure DNS through Resource Manager       |
//! | `cloudflare` | Cloudflare v4 REST API                   |
//! | `desec`      | deSEC REST API                           |
//! | `gcore`      | G-Core DNS REST API                      |
//! | `rfc2136`    | Dynamic DNS UPDATE, optionally TSIG signed |

pub mod azure;
pub mod cloudflare;
pub mod desec;
pub mod gcore;
pub(crate) mod http;
pub mod retry;
pub mod rfc2136;
pub mod route53;
pub mod sigv4;

use crate::constants::PROVIDER_IMAGE_REPOSITORY;
use crate::crd::DNSRecord;
use crate::dns_errors::ProviderError;
use crate::reconcilers::staging::StagingUpdater;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Names accepted by [`build_provider`]
pub const PROVIDER_NAMES: [&str; 6] = ["aws", "azure", "cloudflare", "desec", "gcore", "rfc2136"];

/// Capability surface of a DNS provider adapter.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Adapter name, used in logs and metrics
    fn name(&self) -> &'static str;

    /// Bind the adapter to an integration and the zones it has authority over.
    ///
    /// Called once at worker startup, before the adapter is shared.
    async fn configure(&mut self, integration: &str, zones: Vec<String>) -> Result<(), ProviderError>;

    /// Create `record` remotely and stage the outcome.
    async fn create(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError>;

    /// Delete `record` remotely and stage the outcome.
    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError>;

    /// Zones this adapter has authority over
    fn zones(&self) -> &[String];
}

/// Holder of the process-wide provider.
///
/// The provider is set once after configuration and read by every reconciliation.
#[derive(Default)]
pub struct ProviderStore {
    provider: Mutex<Option<Arc<dyn Provider>>>,
}

impl ProviderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store wrapping an already configured provider
    #[must_use]
    pub fn with_provider(provider: Arc<dyn Provider>) -> Self {
        let store = Self::new();
        store.store(provider);
        store
    }

    pub fn store(&self, provider: Arc<dyn Provider>) {
        *self.provider.lock().unwrap_or_else(PoisonError::into_inner) = Some(provider);
    }

    /// The configured provider
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotConfigured`] when no provider was stored yet.
    pub fn provider(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.provider
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: "none".to_string(),
                reason: "no provider has been stored".to_string(),
            })
    }
}

/// Build the adapter named `name` from its environment and configure it.
///
/// # Errors
///
/// Returns [`ProviderError::UnknownProvider`] for an unsupported name, or the
/// adapter's configuration error.
pub async fn build_provider(
    name: &str,
    integration: &str,
    zones: Vec<String>,
) -> Result<Box<dyn Provider>, ProviderError> {
    info!(provider = %name, integration = %integration, "Initializing provider");

    let mut provider: Box<dyn Provider> = match name {
        "aws" => Box::new(route53::Route53Provider::from_env()?),
        "azure" => Box::new(azure::AzureProvider::from_env()?),
        "cloudflare" => Box::new(cloudflare::CloudflareProvider::from_env()?),
        "desec" => Box::new(desec::DesecProvider::from_env()?),
        "gcore" => Box::new(gcore::GcoreProvider::from_env()?),
        "rfc2136" => Box::new(rfc2136::Rfc2136Provider::from_env()?),
        other => {
            return Err(ProviderError::UnknownProvider {
                name: other.to_string(),
                supported: PROVIDER_NAMES.join(", "),
            })
        }
    };

    provider.configure(integration, zones).await?;
    Ok(provider)
}

/// Default worker image for a provider: `<repository>-<name>:v<version>`
#[must_use]
pub fn default_image(provider: &str, version: &str) -> String {
    format!("{PROVIDER_IMAGE_REPOSITORY}-{provider}:v{version}")
}

/// Fail with [`ProviderError::NoTargets`] when `record` has nothing to publish
pub(crate) fn require_targets(provider: &str, record: &DNSRecord) -> Result<(), ProviderError> {
    if record.spec.targets.is_empty() {
        return Err(ProviderError::NoTargets {
            provider: provider.to_string(),
        });
    }
    Ok(())
}

/// TTL of `record`, or `default` when unset
pub(crate) fn ttl_or(record: &DNSRecord, default: i64) -> i64 {
    record.spec.ttl.unwrap_or(default)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
