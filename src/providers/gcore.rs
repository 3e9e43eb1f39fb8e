// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! G-Core DNS adapter.
//!
//! A record maps to the RRset `<name>.<zone>` whose single resource record holds
//! every target as content.

use super::http::ApiClient;
use super::{require_targets, ttl_or, Provider};
use crate::config::{optional_value, value_from_env_or_file};
use crate::constants::GCORE_DEFAULT_TTL_SECS;
use crate::crd::{ConditionStatus, DNSRecord};
use crate::dns_errors::ProviderError;
use crate::reconcilers::staging::StagingUpdater;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::info;

const PROVIDER: &str = "gcore";

pub const ENV_API_TOKEN: &str = "GCORE_API_TOKEN";
pub const ENV_API_URL: &str = "GCORE_API_URL";

pub const DEFAULT_API_URL: &str = "https://api.gcore.com/dns";

pub struct GcoreProvider {
    integration: String,
    zones: Vec<String>,
    api: ApiClient,
}

impl GcoreProvider {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(token: &str, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            integration: String::new(),
            zones: Vec::new(),
            api: ApiClient::new(PROVIDER, base_url, format!("APIKey {}", token.trim()))?,
        })
    }

    /// Build a provider from `GCORE_API_TOKEN` and optionally `GCORE_API_URL`.
    ///
    /// # Errors
    ///
    /// Fails when the token is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        let token = value_from_env_or_file(ENV_API_TOKEN)?;
        let base_url = optional_value(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(&token, &base_url)
    }

    fn rrset_path(record: &DNSRecord) -> String {
        format!(
            "/v2/zones/{}/{}/{}",
            record.spec.zone,
            record.fqdn(),
            record.spec.record_type
        )
    }
}

#[async_trait]
impl Provider for GcoreProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn configure(&mut self, integration: &str, zones: Vec<String>) -> Result<(), ProviderError> {
        self.integration = integration.to_string();
        self.zones = zones;
        Ok(())
    }

    async fn create(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        require_targets(PROVIDER, record)?;

        let body = json!({
            "ttl": ttl_or(record, GCORE_DEFAULT_TTL_SECS),
            "resource_records": [{
                "content": record.spec.targets,
                "enabled": true,
            }],
        });

        self.api
            .send(Method::POST, &Self::rrset_path(record), Some(&body))
            .await?;

        info!(integration = %self.integration, fqdn = %record.fqdn(), "G-Core record created");
        updater.stage_condition(ConditionStatus::Created, "G-Core record created");
        Ok(())
    }

    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        match self
            .api
            .send(Method::DELETE, &Self::rrset_path(record), None)
            .await
        {
            Ok(_) | Err(ProviderError::Api { status: 404, .. }) => {}
            Err(e) => return Err(e),
        }

        info!(integration = %self.integration, fqdn = %record.fqdn(), "G-Core record deleted");
        updater.stage_condition(ConditionStatus::Terminated, "G-Core record deleted");
        Ok(())
    }

    fn zones(&self) -> &[String] {
        &self.zones
    }
}

#[cfg(test)]
#[path = "gcore_tests.rs"]
mod gcore_tests;
