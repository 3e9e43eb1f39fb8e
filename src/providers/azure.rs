// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure DNS adapter.
//!
//! Authenticates as a service principal with the OAuth2 client-credentials flow and
//! writes record sets through the Azure Resource Manager REST API. A record maps to
//! the record set `<name>` of its type, holding every target. The record set's
//! resource ID is kept in the record's remote info as `recordID`.

use super::http::ApiClient;
use super::{require_targets, ttl_or, Provider};
use crate::config::{optional_value, value_from_env_or_file};
use crate::constants::AZURE_DEFAULT_TTL_SECS;
use crate::crd::{ConditionStatus, DNSRecord};
use crate::dns_errors::ProviderError;
use crate::reconcilers::staging::StagingUpdater;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const PROVIDER: &str = "azure";
const API_VERSION: &str = "2018-05-01";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Tokens are refreshed this long before Azure says they expire
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_ZONE_NAME: &str = "AZURE_ZONE_NAME";
pub const ENV_RESOURCE_GROUP: &str = "AZURE_RESOURCE_GROUP";
pub const ENV_AUTHORITY_URL: &str = "AZURE_AUTHORITY_URL";
pub const ENV_MANAGEMENT_URL: &str = "AZURE_MANAGEMENT_URL";

pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";

/// Remote info key holding the Azure record set resource ID
pub const REMOTE_RECORD_ID: &str = "recordID";

/// Service principal and DNS zone the adapter writes to.
#[derive(Clone, Debug)]
pub struct AzureSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub zone_name: String,
}

impl AzureSettings {
    /// # Errors
    ///
    /// Fails when any setting is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self {
            tenant_id: value_from_env_or_file(ENV_TENANT_ID)?,
            client_id: value_from_env_or_file(ENV_CLIENT_ID)?,
            client_secret: value_from_env_or_file(ENV_CLIENT_SECRET)?,
            subscription_id: value_from_env_or_file(ENV_SUBSCRIPTION_ID)?,
            resource_group: value_from_env_or_file(ENV_RESOURCE_GROUP)?,
            zone_name: value_from_env_or_file(ENV_ZONE_NAME)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct RecordSet {
    id: String,
}

pub struct AzureProvider {
    integration: String,
    zones: Vec<String>,
    settings: AzureSettings,
    login: ApiClient,
    api: ApiClient,
    token: Mutex<Option<(String, Instant)>>,
}

impl AzureProvider {
    /// # Errors
    ///
    /// Fails when the HTTP clients cannot be built.
    pub fn new(
        settings: AzureSettings,
        authority_url: &str,
        management_url: &str,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            integration: String::new(),
            zones: Vec::new(),
            settings,
            login: ApiClient::new(PROVIDER, authority_url, None::<String>)?,
            api: ApiClient::new(PROVIDER, management_url, None::<String>)?,
            token: Mutex::new(None),
        })
    }

    /// Build a provider from the `AZURE_*` settings.
    ///
    /// # Errors
    ///
    /// Fails when a required setting is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        let settings = AzureSettings::from_env()?;
        let authority_url =
            optional_value(ENV_AUTHORITY_URL).unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string());
        let management_url =
            optional_value(ENV_MANAGEMENT_URL).unwrap_or_else(|| DEFAULT_MANAGEMENT_URL.to_string());

        info!(
            zone = %settings.zone_name,
            resource_group = %settings.resource_group,
            "Azure configured"
        );
        Self::new(settings, &authority_url, &management_url)
    }

    /// Cached access token, fetched again once it is close to expiry.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        debug!(tenant = %self.settings.tenant_id, "Requesting Azure access token");
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("client_secret", &self.settings.client_secret)
            .append_pair("scope", MANAGEMENT_SCOPE)
            .finish();

        let path = format!("/{}/oauth2/v2.0/token", self.settings.tenant_id);
        let response = self
            .login
            .send_with(Method::POST, &path, |request| {
                request
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(form.clone())
            })
            .await?;
        let token: AccessToken = self.login.json(response).await?;

        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(TOKEN_REFRESH_MARGIN_SECS));
        *cached = Some((token.access_token.clone(), Instant::now() + lifetime));
        Ok(token.access_token)
    }

    fn record_set_path(&self, record: &DNSRecord) -> String {
        let name = match record.spec.name.as_str() {
            "" => "@",
            name => name,
        };
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/dnsZones/{}/{}/{name}?api-version={API_VERSION}",
            self.settings.subscription_id,
            self.settings.resource_group,
            self.settings.zone_name,
            record.spec.record_type.to_ascii_uppercase(),
        )
    }
}

fn invalid(value: &str, reason: &str) -> ProviderError {
    ProviderError::InvalidRecordData {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn number(value: &str, field: &str, target: &str) -> Result<u32, ProviderError> {
    value
        .parse()
        .map_err(|_| invalid(target, &format!("{field} must be a number")))
}

/// Record set `properties` for `record`.
pub(crate) fn record_set_properties(record: &DNSRecord) -> Result<Value, ProviderError> {
    require_targets(PROVIDER, record)?;
    let targets = &record.spec.targets;

    let mut properties = Map::new();
    properties.insert("TTL".into(), json!(ttl_or(record, AZURE_DEFAULT_TTL_SECS)));

    let record_type = record.spec.record_type.to_ascii_uppercase();
    let (key, value) = match record_type.as_str() {
        "A" => (
            "ARecords",
            targets.iter().map(|t| json!({ "ipv4Address": t })).collect::<Value>(),
        ),
        "AAAA" => (
            "AAAARecords",
            targets.iter().map(|t| json!({ "ipv6Address": t })).collect::<Value>(),
        ),
        "CNAME" => {
            let [cname] = targets.as_slice() else {
                return Err(ProviderError::UnexpectedTargetCount {
                    provider: PROVIDER.to_string(),
                    count: targets.len(),
                });
            };
            ("CNAMERecord", json!({ "cname": cname }))
        }
        "TXT" => (
            "TXTRecords",
            targets.iter().map(|t| json!({ "value": [t] })).collect::<Value>(),
        ),
        "MX" => {
            let records = targets
                .iter()
                .map(|target| {
                    let Some((preference, exchange)) = target.split_once(' ') else {
                        return Err(invalid(target, "expected '<preference> <exchange>'"));
                    };
                    Ok(json!({
                        "preference": number(preference, "preference", target)?,
                        "exchange": exchange.trim(),
                    }))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ("MXRecords", Value::Array(records))
        }
        "SRV" => {
            let records = targets
                .iter()
                .map(|target| {
                    let parts: Vec<&str> = target.split_whitespace().collect();
                    let [priority, weight, port, host] = parts.as_slice() else {
                        return Err(invalid(target, "expected '<priority> <weight> <port> <target>'"));
                    };
                    Ok(json!({
                        "priority": number(priority, "priority", target)?,
                        "weight": number(weight, "weight", target)?,
                        "port": number(port, "port", target)?,
                        "target": host,
                    }))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ("SRVRecords", Value::Array(records))
        }
        other => return Err(ProviderError::UnsupportedRecordType(other.to_string())),
    };
    properties.insert(key.into(), value);

    Ok(Value::Object(properties))
}

#[async_trait]
impl Provider for AzureProvider {
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
        let body = json!({ "properties": record_set_properties(record)? });
        let token = self.access_token().await?;

        let response = self
            .api
            .send_with(Method::PUT, &self.record_set_path(record), |request| {
                request.bearer_auth(&token).json(&body)
            })
            .await?;
        let created: RecordSet = self.api.json(response).await?;

        info!(integration = %self.integration, fqdn = %record.fqdn(), "Azure DNS record created");
        updater.stage_remote_info(BTreeMap::from([(REMOTE_RECORD_ID.to_string(), created.id)]));
        updater.stage_condition(ConditionStatus::Created, "Azure DNS record created");
        Ok(())
    }

    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        let token = self.access_token().await?;

        match self
            .api
            .send_with(Method::DELETE, &self.record_set_path(record), |request| {
                request.bearer_auth(&token)
            })
            .await
        {
            Ok(_) | Err(ProviderError::Api { status: 404, .. }) => {}
            Err(e) => return Err(e),
        }

        info!(integration = %self.integration, fqdn = %record.fqdn(), "Azure DNS record deleted");
        updater.stage_condition(ConditionStatus::Terminated, "Azure DNS record deleted");
        Ok(())
    }

    fn zones(&self) -> &[String] {
        &self.zones
    }
}

#[cfg(test)]
#[path = "azure_tests.rs"]
mod azure_tests;
