// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloudflare adapter (v4 REST API).
//!
//! Cloudflare holds one value per record, so records must have exactly one target.
//! The remote record ID is kept in the record's remote info as `recordID` and is used
//! to delete it later. Without one, delete looks the record up by name, type and
//! content, since a create can reach Cloudflare without its ID ever being committed.

use super::http::ApiClient;
use super::{ttl_or, Provider};
use crate::config::{optional_value, value_from_env_or_file};
use crate::constants::CLOUDFLARE_DEFAULT_TTL_SECS;
use crate::crd::{ConditionStatus, DNSRecord};
use crate::dns_errors::ProviderError;
use crate::reconcilers::staging::StagingUpdater;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

const PROVIDER: &str = "cloudflare";

pub const ENV_API_TOKEN: &str = "CF_API_TOKEN";
pub const ENV_ZONE_ID: &str = "CF_ZONE_ID";
pub const ENV_API_URL: &str = "CF_API_URL";

pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Record property toggling Cloudflare's proxy
pub const PROPERTY_PROXIED: &str = "proxied";

/// Remote info key holding the Cloudflare record ID
pub const REMOTE_RECORD_ID: &str = "recordID";

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareRecord {
    id: String,
    #[serde(default)]
    content: String,
}

pub struct CloudflareProvider {
    integration: String,
    zones: Vec<String>,
    zone_id: String,
    api: ApiClient,
}

impl CloudflareProvider {
    /// Build a provider talking to `base_url` with an API token.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(token: &str, zone_id: &str, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            integration: String::new(),
            zones: Vec::new(),
            zone_id: zone_id.to_string(),
            api: ApiClient::new(PROVIDER, base_url, format!("Bearer {}", token.trim()))?,
        })
    }

    /// Build a provider from `CF_API_TOKEN`, `CF_ZONE_ID` and optionally `CF_API_URL`.
    ///
    /// # Errors
    ///
    /// Fails when a required setting is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        let token = value_from_env_or_file(ENV_API_TOKEN)?;
        let zone_id = value_from_env_or_file(ENV_ZONE_ID)?;
        let base_url = optional_value(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(&token, &zone_id, &base_url)
    }

    /// IDs of the remote records matching `record` by name, type and content.
    async fn find_record_ids(&self, record: &DNSRecord) -> Result<Vec<String>, ProviderError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("type", &record.spec.record_type)
            .append_pair("name", &record.fqdn())
            .finish();
        let response = self
            .api
            .send(
                Method::GET,
                &format!("/zones/{}/dns_records?{query}", self.zone_id),
                None,
            )
            .await?;
        let found: Vec<CloudflareRecord> = Self::unwrap_response(self.api.json(response).await?)?;

        debug!(
            integration = %self.integration,
            fqdn = %record.fqdn(),
            found = found.len(),
            "Looked up Cloudflare records without a stored ID"
        );
        Ok(found
            .into_iter()
            .filter(|remote| record.spec.targets.contains(&remote.content))
            .map(|remote| remote.id)
            .collect())
    }

    fn unwrap_response<T>(response: CloudflareResponse<T>) -> Result<T, ProviderError> {
        if !response.success {
            let message = response
                .errors
                .first()
                .map_or_else(|| "Unknown error".to_string(), |e| format!("{} ({})", e.message, e.code));
            return Err(ProviderError::Api {
                provider: PROVIDER.to_string(),
                status: 200,
                message,
            });
        }
        response.result.ok_or_else(|| ProviderError::Api {
            provider: PROVIDER.to_string(),
            status: 200,
            message: "response is missing the result field".to_string(),
        })
    }
}

#[async_trait]
impl Provider for CloudflareProvider {
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
        let [content] = record.spec.targets.as_slice() else {
            return Err(ProviderError::UnexpectedTargetCount {
                provider: PROVIDER.to_string(),
                count: record.spec.targets.len(),
            });
        };

        let name = match record.spec.name.as_str() {
            "" => "@",
            name => name,
        };
        let mut body = json!({
            "type": record.spec.record_type,
            "name": name,
            "content": content,
            "ttl": ttl_or(record, CLOUDFLARE_DEFAULT_TTL_SECS),
        });
        if let Some(proxied) = record.property(PROPERTY_PROXIED) {
            body["proxied"] = json!(proxied.eq_ignore_ascii_case("true"));
        }

        let response = self
            .api
            .send(
                Method::POST,
                &format!("/zones/{}/dns_records", self.zone_id),
                Some(&body),
            )
            .await?;
        let created: CloudflareRecord = Self::unwrap_response(self.api.json(response).await?)?;

        info!(integration = %self.integration, record_id = %created.id, "Cloudflare record created");
        updater.stage_remote_info(BTreeMap::from([(
            REMOTE_RECORD_ID.to_string(),
            created.id,
        )]));
        updater.stage_condition(ConditionStatus::Created, "Cloudflare record created");
        Ok(())
    }

    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        let record_ids = match record
            .remote_info(&self.integration)
            .and_then(|info| info.get(REMOTE_RECORD_ID))
        {
            Some(id) => vec![id.clone()],
            None => self.find_record_ids(record).await?,
        };

        if record_ids.is_empty() {
            updater.stage_condition(ConditionStatus::Terminated, "No remote record to delete");
            return Ok(());
        }

        for record_id in &record_ids {
            let path = format!("/zones/{}/dns_records/{record_id}", self.zone_id);
            match self.api.send(Method::DELETE, &path, None).await {
                Ok(_) => {}
                Err(ProviderError::Api { status: 404, .. }) => {
                    info!(integration = %self.integration, record_id = %record_id, "Cloudflare record already gone");
                }
                Err(e) => return Err(e),
            }
        }

        updater.stage_condition(ConditionStatus::Terminated, "Cloudflare record deleted");
        Ok(())
    }

    fn zones(&self) -> &[String] {
        &self.zones
    }
}

#[cfg(test)]
#[path = "cloudflare_tests.rs"]
mod cloudflare_tests;
