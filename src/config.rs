// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration.
//!
//! Both binaries take their settings from the environment through `clap`
//! (`#[arg(env = ...)]`), so every variable can also be passed as a flag.
//!
//! Provider credentials are read with [`value_from_env_or_file`]: an environment
//! variable wins, otherwise a file of the same name under
//! [`PROVIDER_CONFIG_DIR`] is used. This lets credentials be mounted from a
//! secret volume instead of exported into the environment.

use crate::constants::{
    DEFAULT_HEALTH_ADDR, DEFAULT_METRICS_ADDR, DEFAULT_NAMESPACE,
    DEFAULT_PROVIDER_SERVICE_ACCOUNT, ENV_INTEGRATION, ENV_NAMESPACE, ENV_PROVIDER,
    ENV_PROVIDER_SERVICE_ACCOUNT, ENV_PROVIDER_VERSION, ENV_ZONES, PROVIDER_CONFIG_DIR,
};
use crate::dns_errors::ConfigError;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;

/// Settings of the `phonebook` controller
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "phonebook", version, about = "DNS record controller for Kubernetes")]
pub struct ControllerConfig {
    /// Namespace where provider workers are deployed
    #[arg(long, env = ENV_NAMESPACE, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Service account used by provider workers
    #[arg(
        long = "provider-service-account",
        env = ENV_PROVIDER_SERVICE_ACCOUNT,
        default_value = DEFAULT_PROVIDER_SERVICE_ACCOUNT
    )]
    pub provider_service_account: String,

    /// Image tag of the default provider images
    #[arg(long, env = ENV_PROVIDER_VERSION, default_value = env!("CARGO_PKG_VERSION"))]
    pub provider_version: String,

    /// Address of the metrics, health and challenge solver endpoints
    #[arg(long, env = "PB_METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            provider_service_account: DEFAULT_PROVIDER_SERVICE_ACCOUNT.to_string(),
            provider_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Settings of the `phonebook-provider` worker
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "phonebook-provider", version, about = "DNS provider worker for phonebook")]
pub struct ProviderConfig {
    /// Provider adapter (aws, azure, cloudflare, desec, gcore, rfc2136)
    #[arg(long, env = ENV_PROVIDER)]
    pub provider: String,

    /// Name of the DNSIntegration this worker serves
    #[arg(long, env = ENV_INTEGRATION)]
    pub integration: String,

    /// Zones the integration has authority over
    #[arg(long, env = ENV_ZONES, value_delimiter = ',')]
    pub zones: Vec<String>,

    /// Namespace holding the leader election lease
    #[arg(long, env = ENV_NAMESPACE, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Address of the health endpoints
    #[arg(long, env = "PB_HEALTH_ADDR", default_value = DEFAULT_HEALTH_ADDR)]
    pub health_addr: SocketAddr,
}

/// Read `name` from the environment, or from the provider config directory.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] when neither source has a value.
pub fn value_from_env_or_file(name: &str) -> Result<String, ConfigError> {
    value_from_env_or_dir(name, Path::new(PROVIDER_CONFIG_DIR))
}

/// Same as [`value_from_env_or_file`] with an explicit config directory.
///
/// Empty environment values are ignored. File contents are trimmed.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] when neither source has a value.
pub fn value_from_env_or_dir(name: &str, dir: &Path) -> Result<String, ConfigError> {
    if let Ok(value) = std::env::var(name) {
        if !value.is_empty() {
            return Ok(value);
        }
    }

    let path = dir.join(name);
    std::fs::read_to_string(&path)
        .map(|content| content.trim().to_string())
        .map_err(|_| ConfigError::Missing {
            name: name.to_string(),
            path: path.display().to_string(),
        })
}

/// Optional setting: `None` when absent from both sources
#[must_use]
pub fn optional_value(name: &str) -> Option<String> {
    value_from_env_or_file(name).ok()
}

/// Parse a boolean setting ("true"/"false", "1"/"0", "yes"/"no")
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for any other value.
pub fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
