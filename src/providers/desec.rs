// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! deSEC adapter.
//!
//! A record maps to one deSEC RRset holding every target.

use super::http::ApiClient;
use super::{require_targets, ttl_or, Provider};
use crate::config::{optional_value, value_from_env_or_file};
use crate::constants::DESEC_DEFAULT_TTL_SECS;
use crate::crd::{ConditionStatus, DNSRecord};
use crate::dns_errors::ProviderError;
use crate::reconcilers::staging::StagingUpdater;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::info;

const PROVIDER: &str = "desec";

pub const ENV_TOKEN: &str = "DESEC_TOKEN";
pub const ENV_API_URL: &str = "DESEC_API_URL";

pub const DEFAULT_API_URL: &str = "https://desec.io/api/v1";

pub struct DesecProvider {
    integration: String,
    zones: Vec<String>,
    api: ApiClient,
}

impl DesecProvider {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(token: &str, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            integration: String::new(),
            zones: Vec::new(),
            api: ApiClient::new(PROVIDER, base_url, format!("Token {}", token.trim()))?,
        })
    }

    /// Build a provider from `DESEC_TOKEN` and optionally `DESEC_API_URL`.
    ///
    /// # Errors
    ///
    /// Fails when the token is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        let token = value_from_env_or_file(ENV_TOKEN)?;
        let base_url = optional_value(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(&token, &base_url)
    }
}

/// deSEC subname of a record: empty for the apex
fn subname(record: &DNSRecord) -> &str {
    match record.spec.name.as_str() {
        "@" => "",
        name => name,
    }
}

#[async_trait]
impl Provider for DesecProvider {
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
            "subname": subname(record),
            "type": record.spec.record_type,
            "ttl": ttl_or(record, DESEC_DEFAULT_TTL_SECS),
            "records": record.spec.targets,
        });

        self.api
            .send(
                Method::POST,
                &format!("/domains/{}/rrsets/", record.spec.zone),
                Some(&body),
            )
            .await?;

        info!(integration = %self.integration, fqdn = %record.fqdn(), "deSEC record created");
        updater.stage_condition(ConditionStatus::Created, "deSEC record created");
        Ok(())
    }

    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        let subname = match subname(record) {
            "" => "@",
            name => name,
        };
        let path = format!(
            "/domains/{}/rrsets/{subname}/{}/",
            record.spec.zone, record.spec.record_type
        );

        match self.api.send(Method::DELETE, &path, None).await {
            Ok(_) | Err(ProviderError::Api { status: 404, .. }) => {}
            Err(e) => return Err(e),
        }

        info!(integration = %self.integration, fqdn = %record.fqdn(), "deSEC record deleted");
        updater.stage_condition(ConditionStatus::Terminated, "deSEC record deleted");
        Ok(())
    }

    fn zones(&self) -> &[String] {
        &self.zones
    }
}

#[cfg(test)]
#[path = "desec_tests.rs"]
mod desec_tests;
