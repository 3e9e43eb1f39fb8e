// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 dynamic DNS update adapter.
//!
//! Updates are sent over UDP with hickory-client, signed with TSIG unless
//! `RFC2136_INSECURE` is set. Create appends one resource record per target;
//! delete removes the whole RRset for the record's name and type.
//!
//! Supported record types: A, AAAA, CNAME, TXT, NS and MX (`"<preference> <host>"`).

use super::{require_targets, ttl_or, Provider};
use crate::config::{parse_bool, value_from_env_or_file};
use crate::constants::{DNS_PORT, RFC2136_DEFAULT_TTL_SECS, TSIG_FUDGE_TIME_SECS};
use crate::crd::{ConditionStatus, DNSRecord};
use crate::dns_errors::{ConfigError, ProviderError};
use crate::reconcilers::staging::StagingUpdater;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::ResponseCode;
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::{rdata, DNSClass, Name, RData, Record, RecordType};
use hickory_client::udp::UdpClientConnection;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::net::{Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use std::str::FromStr;
use tracing::{info, warn};

const PROVIDER: &str = "rfc2136";

pub const ENV_SERVER: &str = "RFC2136_SERVER";
pub const ENV_PORT: &str = "RFC2136_PORT";
pub const ENV_ZONE_NAME: &str = "RFC2136_ZONE_NAME";
pub const ENV_INSECURE: &str = "RFC2136_INSECURE";
pub const ENV_KEYNAME: &str = "RFC2136_KEYNAME";
pub const ENV_SECRET: &str = "RFC2136_SECRET";
pub const ENV_SECRET_ALG: &str = "RFC2136_SECRET_ALG";

/// TSIG key used to sign updates
#[derive(Clone, Debug)]
pub struct TsigKey {
    pub name: String,
    /// Raw (base64 decoded) secret
    pub secret: Vec<u8>,
    pub algorithm: TsigAlgorithm,
}

/// Connection settings of an RFC 2136 server
#[derive(Clone, Debug)]
pub struct Rfc2136Settings {
    pub server: String,
    pub port: u16,
    /// Zone used when a record does not carry one
    pub zone_name: String,
    /// `None` sends unsigned updates
    pub tsig: Option<TsigKey>,
}

impl Rfc2136Settings {
    /// Load settings from the `RFC2136_*` variables.
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing or malformed. Key name, secret and
    /// algorithm are only required when updates are signed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = value_from_env_or_file(ENV_SERVER)?;
        let port = match value_from_env_or_file(ENV_PORT) {
            Ok(port) => port.parse().map_err(|_| ConfigError::Invalid {
                name: ENV_PORT.to_string(),
                reason: format!("'{port}' is not a port number"),
            })?,
            Err(_) => DNS_PORT,
        };
        let zone_name = value_from_env_or_file(ENV_ZONE_NAME)?;
        let insecure = parse_bool(ENV_INSECURE, &value_from_env_or_file(ENV_INSECURE)?)?;

        if insecure {
            warn!("RFC2136 insecure mode enabled, updates are not signed");
            return Ok(Self {
                server,
                port,
                zone_name,
                tsig: None,
            });
        }

        let name = value_from_env_or_file(ENV_KEYNAME)?;
        let secret = BASE64
            .decode(value_from_env_or_file(ENV_SECRET)?)
            .map_err(|e| ConfigError::Invalid {
                name: ENV_SECRET.to_string(),
                reason: format!("not valid base64: {e}"),
            })?;
        let algorithm = parse_algorithm(&value_from_env_or_file(ENV_SECRET_ALG)?)?;

        Ok(Self {
            server,
            port,
            zone_name,
            tsig: Some(TsigKey {
                name,
                secret,
                algorithm,
            }),
        })
    }
}

/// Map a TSIG algorithm name (`hmac-sha256`, `hmac-sha256.`, ...) to hickory's type.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for unknown algorithms.
pub fn parse_algorithm(value: &str) -> Result<TsigAlgorithm, ConfigError> {
    match value.trim().trim_end_matches('.').to_ascii_lowercase().as_str() {
        "hmac-md5" | "hmac-md5.sig-alg.reg.int" => Ok(TsigAlgorithm::HmacMd5),
        "hmac-sha1" => Ok(TsigAlgorithm::HmacSha1),
        "hmac-sha224" => Ok(TsigAlgorithm::HmacSha224),
        "hmac-sha256" => Ok(TsigAlgorithm::HmacSha256),
        "hmac-sha384" => Ok(TsigAlgorithm::HmacSha384),
        "hmac-sha512" => Ok(TsigAlgorithm::HmacSha512),
        other => Err(ConfigError::Invalid {
            name: ENV_SECRET_ALG.to_string(),
            reason: format!("unsupported TSIG algorithm '{other}'"),
        }),
    }
}

/// Zone origin of `record`, always fully qualified
///
/// # Errors
///
/// Fails when the zone is not a valid DNS name.
pub fn zone_origin(record: &DNSRecord, default_zone: &str) -> Result<Name, ProviderError> {
    let zone = if record.spec.zone.is_empty() {
        default_zone
    } else {
        record.spec.zone.as_str()
    };
    let zone = if zone.ends_with('.') {
        zone.to_string()
    } else {
        format!("{zone}.")
    };
    Name::from_str(&zone).map_err(|e| invalid(&zone, &e.to_string()))
}

/// Fully qualified owner name of `record` inside `zone`
///
/// # Errors
///
/// Fails when the record name is not a valid DNS label.
pub fn owner_name(record: &DNSRecord, zone: &Name) -> Result<Name, ProviderError> {
    match record.spec.name.as_str() {
        "" | "@" => Ok(zone.clone()),
        name => Name::from_str(name)
            .and_then(|n| n.append_domain(zone))
            .map_err(|e| invalid(name, &e.to_string())),
    }
}

/// Parse one target into record data for `record_type`.
///
/// # Errors
///
/// Returns [`ProviderError::UnsupportedRecordType`] or
/// [`ProviderError::InvalidRecordData`].
pub fn record_data(record_type: &str, target: &str) -> Result<RData, ProviderError> {
    let name = |value: &str| Name::from_str(value).map_err(|e| invalid(value, &e.to_string()));

    match record_type.to_ascii_uppercase().as_str() {
        "A" => Ipv4Addr::from_str(target)
            .map(|ip| RData::A(ip.into()))
            .map_err(|e| invalid(target, &e.to_string())),
        "AAAA" => Ipv6Addr::from_str(target)
            .map(|ip| RData::AAAA(ip.into()))
            .map_err(|e| invalid(target, &e.to_string())),
        "CNAME" => Ok(RData::CNAME(rdata::CNAME(name(target)?))),
        "NS" => Ok(RData::NS(rdata::NS(name(target)?))),
        "TXT" => Ok(RData::TXT(rdata::TXT::new(vec![target.to_string()]))),
        "MX" => {
            let (preference, exchange) = target
                .split_once(char::is_whitespace)
                .ok_or_else(|| invalid(target, "expected '<preference> <host>'"))?;
            let preference: u16 = preference
                .parse()
                .map_err(|_| invalid(target, "preference is not a number"))?;
            Ok(RData::MX(rdata::MX::new(preference, name(exchange.trim())?)))
        }
        other => Err(ProviderError::UnsupportedRecordType(other.to_string())),
    }
}

fn invalid(value: &str, reason: &str) -> ProviderError {
    ProviderError::InvalidRecordData {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub struct Rfc2136Provider {
    integration: String,
    zones: Vec<String>,
    settings: Rfc2136Settings,
}

impl Rfc2136Provider {
    #[must_use]
    pub fn new(settings: Rfc2136Settings) -> Self {
        Self {
            integration: String::new(),
            zones: Vec::new(),
            settings,
        }
    }

    /// # Errors
    ///
    /// Fails when the `RFC2136_*` settings are missing or invalid.
    pub fn from_env() -> Result<Self, ProviderError> {
        let settings = Rfc2136Settings::from_env()?;
        info!(server = %settings.server, port = settings.port, zone = %settings.zone_name, "RFC2136 configured");
        Ok(Self::new(settings))
    }

    /// Send one update. `build` runs on the blocking pool with a connected client.
    async fn update<F>(&self, fqdn: String, zone: String, build: F) -> Result<(), ProviderError>
    where
        F: FnOnce(&SyncClient<UdpClientConnection>) -> Result<ResponseCode, String> + Send + 'static,
    {
        let settings = self.settings.clone();
        let (name, zone_name) = (fqdn.clone(), zone.clone());
        let failed = move |reason: String| ProviderError::DnsUpdate {
            name: name.clone(),
            zone: zone_name.clone(),
            reason,
        };

        let result = tokio::task::spawn_blocking(move || {
            let client = connect(&settings)?;
            build(&client)
        })
        .await
        .map_err(|e| failed(format!("update task failed: {e}")))?;

        match result {
            Ok(ResponseCode::NoError) => Ok(()),
            Ok(code) => Err(failed(format!("server answered {code:?}"))),
            Err(reason) => Err(failed(reason)),
        }
    }
}

fn connect(settings: &Rfc2136Settings) -> Result<SyncClient<UdpClientConnection>, String> {
    let address = (settings.server.as_str(), settings.port)
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve {}: {e}", settings.server))?
        .next()
        .ok_or_else(|| format!("no address for {}", settings.server))?;
    let conn = UdpClientConnection::new(address).map_err(|e| e.to_string())?;

    match &settings.tsig {
        Some(key) => {
            let signer = TSigner::new(
                key.secret.clone(),
                key.algorithm.clone(),
                Name::from_str(&key.name).map_err(|e| format!("invalid TSIG key name: {e}"))?,
                u16::try_from(TSIG_FUDGE_TIME_SECS).unwrap_or(300),
            )
            .map_err(|e| format!("invalid TSIG key: {e}"))?;
            Ok(SyncClient::with_tsigner(conn, signer))
        }
        None => Ok(SyncClient::new(conn)),
    }
}

#[async_trait]
impl Provider for Rfc2136Provider {
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

        let zone = zone_origin(record, &self.settings.zone_name)?;
        let fqdn = owner_name(record, &zone)?;
        let ttl = u32::try_from(ttl_or(record, RFC2136_DEFAULT_TTL_SECS)).unwrap_or(60);

        let records = record
            .spec
            .targets
            .iter()
            .map(|target| {
                let mut rr = Record::from_rdata(fqdn.clone(), ttl, record_data(&record.spec.record_type, target)?);
                rr.set_dns_class(DNSClass::IN);
                Ok(rr)
            })
            .collect::<Result<Vec<Record>, ProviderError>>()?;

        let update_zone = zone.clone();
        self.update(fqdn.to_string(), zone.to_string(), move |client| {
            for rr in records {
                let response = client
                    .append(rr, update_zone.clone(), false)
                    .map_err(|e| e.to_string())?;
                if response.response_code() != ResponseCode::NoError {
                    return Ok(response.response_code());
                }
            }
            Ok(ResponseCode::NoError)
        })
        .await?;

        info!(integration = %self.integration, fqdn = %fqdn, "RFC2136 record created");
        updater.stage_condition(ConditionStatus::Created, "RFC2136 record created");
        Ok(())
    }

    async fn delete(
        &self,
        record: &DNSRecord,
        updater: &mut dyn StagingUpdater,
    ) -> Result<(), ProviderError> {
        let zone = zone_origin(record, &self.settings.zone_name)?;
        let fqdn = owner_name(record, &zone)?;
        let record_type = RecordType::from_str(&record.spec.record_type.to_ascii_uppercase())
            .map_err(|_| ProviderError::UnsupportedRecordType(record.spec.record_type.clone()))?;

        let mut rrset = Record::with(fqdn.clone(), record_type, 0);
        rrset.set_dns_class(DNSClass::IN);

        let update_zone = zone.clone();
        self.update(fqdn.to_string(), zone.to_string(), move |client| {
            client
                .delete_rrset(rrset, update_zone)
                .map(|response| response.response_code())
                .map_err(|e| e.to_string())
        })
        .await?;

        info!(integration = %self.integration, fqdn = %fqdn, "RFC2136 record deleted");
        updater.stage_condition(ConditionStatus::Terminated, "RFC2136 record deleted");
        Ok(())
    }

    fn zones(&self) -> &[String] {
        &self.zones
    }
}

#[cfg(test)]
#[path = "rfc2136_tests.rs"]
mod rfc2136_tests;
