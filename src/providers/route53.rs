// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! AWS Route53 adapter.
//!
//! Records are written with `ChangeResourceRecordSets` as one resource record set
//! holding every target. Requests are signed with SigV4 for the global `us-east-1`
//! region.
//!
//! Setting the `AliasHostedZoneID` property turns the record into an alias to the
//! first target in that hosted zone. Alias records carry no TTL.

use super::http::ApiClient;
use super::sigv4::{Credentials, SignableRequest, Signer};
use super::{require_targets, ttl_or, Provider};
use crate::config::{optional_value, value_from_env_or_file};
use crate::constants::ROUTE53_DEFAULT_TTL_SECS;
use crate::crd::{ConditionStatus, DNSRecord};
use crate::dns_errors::ProviderError;
use crate::reconcilers::staging::StagingUpdater;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::fmt::Write as _;
use tracing::info;

const PROVIDER: &str = "aws";
const REGION: &str = "us-east-1";
const SERVICE: &str = "route53";
const API_VERSION: &str = "2013-04-01";
const XML_CONTENT_TYPE: &str = "text/xml";

pub const ENV_ZONE_ID: &str = "AWS_ZONE_ID";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_API_URL: &str = "AWS_ROUTE53_URL";

pub const DEFAULT_API_URL: &str = "https://route53.amazonaws.com";

/// Record property holding the hosted zone of an alias target
pub const PROPERTY_ALIAS_TARGET: &str = "AliasHostedZoneID";

pub struct Route53Provider {
    integration: String,
    zones: Vec<String>,
    zone_id: String,
    host: String,
    signer: Signer,
    api: ApiClient,
}

impl Route53Provider {
    /// # Errors
    ///
    /// Fails when `base_url` has no host or the HTTP client cannot be built.
    pub fn new(credentials: Credentials, zone_id: &str, base_url: &str) -> Result<Self, ProviderError> {
        let api = ApiClient::new(PROVIDER, base_url, None::<String>)?;
        let host = host_header(api.base_url())?;
        let zone_id = zone_id.trim().trim_start_matches("/hostedzone/").to_string();

        Ok(Self {
            integration: String::new(),
            zones: Vec::new(),
            zone_id,
            host,
            signer: Signer::new(credentials, REGION, SERVICE),
            api,
        })
    }

    /// Build a provider from `AWS_ZONE_ID`, `AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY` and optionally `AWS_SESSION_TOKEN` and
    /// `AWS_ROUTE53_URL`.
    ///
    /// # Errors
    ///
    /// Fails when a required setting is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        let zone_id = value_from_env_or_file(ENV_ZONE_ID)?;
        let credentials = Credentials {
            access_key_id: value_from_env_or_file(ENV_ACCESS_KEY_ID)?,
            secret_access_key: value_from_env_or_file(ENV_SECRET_ACCESS_KEY)?,
            session_token: optional_value(ENV_SESSION_TOKEN),
        };
        let base_url = optional_value(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        info!(zone_id = %zone_id, "Route53 configured");
        Self::new(credentials, &zone_id, &base_url)
    }

    async fn change(&self, action: &str, record: &DNSRecord) -> Result<(), ProviderError> {
        let body = change_batch(action, record)?;
        let path = format!("/{API_VERSION}/hostedzone/{}/rrset/", self.zone_id);

        let request = SignableRequest {
            method: "POST",
            path: &path,
            query: "",
            headers: vec![
                ("content-type".to_string(), XML_CONTENT_TYPE.to_string()),
                ("host".to_string(), self.host.clone()),
            ],
            payload: body.as_bytes(),
        };
        let signed = self
            .signer
            .sign(&request, Utc::now())
            .map_err(|e| ProviderError::Signing {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        self.api
            .send_with(Method::POST, &path, |mut builder| {
                builder = builder.header(CONTENT_TYPE, XML_CONTENT_TYPE);
                for (name, value) in &signed {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.body(body.clone())
            })
            .await?;
        Ok(())
    }
}

/// `Host` header value for `base_url`, including a non-default port
fn host_header(base_url: &str) -> Result<String, ProviderError> {
    let url = url::Url::parse(base_url).map_err(|e| ProviderError::NotConfigured {
        provider: PROVIDER.to_string(),
        reason: format!("invalid API URL '{base_url}': {e}"),
    })?;
    let host = url.host_str().ok_or_else(|| ProviderError::NotConfigured {
        provider: PROVIDER.to_string(),
        reason: format!("API URL '{base_url}' has no host"),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// The `ResourceRecordSet` element for `record`.
pub(crate) fn resource_record_set(record: &DNSRecord) -> Result<String, ProviderError> {
    require_targets(PROVIDER, record)?;
    let first = &record.spec.targets[0];

    let record_type = record.spec.record_type.to_ascii_uppercase();
    let mut set = format!(
        "<ResourceRecordSet><Name>{}</Name><Type>{}</Type>",
        xml_escape(&record.fqdn()),
        xml_escape(&record_type)
    );

    if let Some(hosted_zone) = record.property(PROPERTY_ALIAS_TARGET) {
        let _ = write!(
            set,
            "<AliasTarget><HostedZoneId>{}</HostedZoneId><DNSName>{}</DNSName>\
             <EvaluateTargetHealth>false</EvaluateTargetHealth></AliasTarget>",
            xml_escape(hosted_zone),
            xml_escape(first)
        );
    } else {
        let quote = match record_type.as_str() {
            "TXT" => true,
            "A" | "AAAA" | "CNAME" | "MX" | "SRV" | "NS" => false,
            other => return Err(ProviderError::UnsupportedRecordType(other.to_string())),
        };
        let _ = write!(set, "<TTL>{}</TTL><ResourceRecords>", ttl_or(record, ROUTE53_DEFAULT_TTL_SECS));
        for target in &record.spec.targets {
            let value = if quote {
                format!("\"{target}\"")
            } else {
                target.clone()
            };
            let _ = write!(set, "<ResourceRecord><Value>{}</Value></ResourceRecord>", xml_escape(&value));
        }
        set.push_str("</ResourceRecords>");
    }

    set.push_str("</ResourceRecordSet>");
    Ok(set)
}

fn change_batch(action: &str, record: &DNSRecord) -> Result<String, ProviderError> {
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ChangeResourceRecordSetsRequest xmlns=\"https://route53.amazonaws.com/doc/{API_VERSION}/\">\
         <ChangeBatch><Changes><Change><Action>{action}</Action>{}</Change></Changes></ChangeBatch>\
         </ChangeResourceRecordSetsRequest>",
        resource_record_set(record)?
    ))
}

/// Route53 rejects deleting a record set that does not exist with this message
fn is_missing_record_set(err: &ProviderError) -> bool {
    matches!(err, ProviderError::Api { status: 400, message, .. } if message.contains("but it was not found"))
}

#[async_trait]
impl Provider for Route53Provider {
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
        self.change("CREATE", record).await?;

        info!(integration = %self.integration, fqdn = %record.fqdn(), "Route53 record created");
        updater.stage_condition(ConditionStatus::Created, "Route53 created the record");
        Ok(())
    }

    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        match self.change("DELETE", record).await {
            Ok(()) => {
                info!(integration = %self.integration, fqdn = %record.fqdn(), "Route53 record deleted");
            }
            Err(e) if is_missing_record_set(&e) => {
                info!(integration = %self.integration, fqdn = %record.fqdn(), "Route53 record already gone");
            }
            Err(e) => return Err(e),
        }

        updater.stage_condition(ConditionStatus::Terminated, "Route53 record deleted");
        Ok(())
    }

    fn zones(&self) -> &[String] {
        &self.zones
    }
}

#[cfg(test)]
#[path = "route53_tests.rs"]
mod route53_tests;
