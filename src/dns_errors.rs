// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for phonebook.
//!
//! This module provides specialized error types for:
//! - Object store operations (optimistic concurrency conflicts, missing objects)
//! - The condition lock (conflicts vs. task failures)
//! - Provider adapters (API failures, contract violations)
//! - Configuration loading
//! - The ACME challenge solver
//!
//! Reconcilers use `anyhow` for task bodies and downcast to these types where a
//! failure class changes control flow (only conflicts do).

use thiserror::Error;

/// Errors returned by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object changed since it was read (HTTP 409 on update)
    ///
    /// Always retryable: the caller requeues and starts over from a fresh read.
    #[error("Conflict writing {kind} '{name}': the object has been modified")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
    },

    /// The object does not exist (HTTP 404)
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
    },

    /// An object with the same name already exists (HTTP 409 on create)
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
    },

    /// The object is missing data the store needs (name, namespace, ...)
    #[error("Invalid {kind}: {reason}")]
    Invalid {
        /// Kind of the object
        kind: String,
        /// What is missing or malformed
        reason: String,
    },

    /// Any other Kubernetes API failure
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// (De)serialization of an object failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// `true` for optimistic-concurrency conflicts
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// `true` when the object was not found
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors returned by [`Lock::execute`](crate::reconcilers::lock::Lock::execute).
#[derive(Error, Debug)]
pub enum LockError {
    /// The status write collided with a concurrent writer. Nothing was persisted.
    #[error("Conflict committing condition '{condition}', will retry")]
    Conflict {
        /// Condition type that was being committed
        condition: String,
    },

    /// The task failed. Its error was committed to the condition as `Error`.
    #[error(transparent)]
    Task(anyhow::Error),

    /// The status write failed for a reason other than a conflict
    #[error("Failed to persist condition '{condition}': {source}")]
    Store {
        /// Condition type that was being committed
        condition: String,
        #[source]
        source: StoreError,
    },
}

impl LockError {
    /// `true` when the caller should requeue without reporting a failure
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors returned by provider adapters.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider returned success but staged no status
    #[error("Provider didn't set a condition status upon returning from function")]
    DidNotSetCondition,

    /// `configure` was not called, or was called with invalid input
    #[error("Provider {provider} is not configured: {reason}")]
    NotConfigured {
        /// Provider adapter name
        provider: String,
        /// What is missing
        reason: String,
    },

    /// The adapter name does not match any known provider
    #[error("Unknown provider '{name}', expected one of: {supported}")]
    UnknownProvider {
        /// Requested adapter name
        name: String,
        /// Comma separated list of supported adapter names
        supported: String,
    },

    /// The record has no target to publish
    #[error("{provider} cannot publish a record without targets")]
    NoTargets {
        /// Provider adapter name
        provider: String,
    },

    /// The record has a target count the provider cannot express
    #[error("{provider} requires exactly one target, record has {count}")]
    UnexpectedTargetCount {
        /// Provider adapter name
        provider: String,
        /// Number of targets on the record
        count: usize,
    },

    /// The provider does not support this record type
    #[error("Unsupported record type '{0}'")]
    UnsupportedRecordType(String),

    /// A target cannot be parsed for its record type
    #[error("Invalid record data '{value}': {reason}")]
    InvalidRecordData {
        /// The offending target
        value: String,
        /// Why it is invalid
        reason: String,
    },

    /// The provider API rejected the request
    #[error("{provider} API error (HTTP {status}): {message}")]
    Api {
        /// Provider adapter name
        provider: String,
        /// HTTP status code
        status: u16,
        /// Error message returned by the API
        message: String,
    },

    /// A request could not be signed with the configured credentials
    #[error("{provider} request signing failed: {reason}")]
    Signing {
        /// Provider adapter name
        provider: String,
        /// Why signing failed
        reason: String,
    },

    /// The request could not be sent or its response could not be read
    #[error("{provider} request failed: {source}")]
    Http {
        /// Provider adapter name
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// A dynamic DNS update failed
    #[error("DNS update for '{name}' in zone '{zone}' failed: {reason}")]
    DnsUpdate {
        /// Record name
        name: String,
        /// Zone name
        zone: String,
        /// Response code or transport error
        reason: String,
    },

    /// Loading the provider configuration failed
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither the environment variable nor the config file exists
    #[error("{name} does not exist as an environment variable and a file({path}) with this name could not be found")]
    Missing {
        /// Variable name
        name: String,
        /// File path that was tried
        path: String,
    },

    /// The value exists but cannot be used
    #[error("{name} has an invalid value: {reason}")]
    Invalid {
        /// Variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors returned by the ACME DNS-01 challenge solver.
#[derive(Error, Debug)]
pub enum ChallengeError {
    /// A challenge record does not have exactly one target
    #[error("Record unexpectedly had more than one target: {targets:?}")]
    UnexpectedTargets {
        /// The targets found on the record
        targets: Vec<String>,
    },

    /// The underlying store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
