// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Phonebook - DNS records as Kubernetes resources
//!
//! Phonebook publishes `DNSRecord` resources through external DNS providers. Users
//! declare the providers they have with `DNSIntegration` resources; phonebook runs one
//! provider worker per integration and fans every record out to each integration with
//! authority over its zone.
//!
//! ## Overview
//!
//! - The record controller resolves which integrations a record belongs to and claims
//!   it for them in the record's status conditions
//! - The integration controller deploys and health-checks a provider worker per
//!   integration
//! - Each provider worker creates and deletes the records claimed for its integration
//!   through a [`providers::Provider`]
//! - A DNS-01 challenge solver turns ACME challenges into TXT `DNSRecord`s
//!
//! Progress is tracked per integration in `status.conditions`; every status write goes
//! through a [`reconcilers::lock::Lock`] so concurrent workers never overwrite each
//! other's conditions.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for records, integrations and providers
//! - [`controller`] - `kube::runtime` controllers around the reconcilers
//! - [`providers`] - DNS provider adapters (Cloudflare, deSEC, G-Core, RFC 2136)
//! - [`store`] - Object store abstraction over the Kubernetes API
//! - [`solver`] - DNS-01 challenge solver
//! - [`server`] - Metrics, health and solver HTTP endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use phonebook::crd::{DNSRecord, DNSRecordSpec};
//!
//! let record = DNSRecord::new(
//!     "www",
//!     DNSRecordSpec {
//!         zone: "example.com".to_string(),
//!         record_type: "A".to_string(),
//!         name: "www".to_string(),
//!         targets: vec!["192.0.2.10".to_string()],
//!         properties: None,
//!         ttl: Some(300),
//!         integration: None,
//!     },
//! );
//! assert_eq!(record.fqdn(), "www.example.com");
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod dns_errors;
pub mod events;
pub mod labels;
pub mod metrics;
pub mod providers;
pub mod reconcilers;
pub mod server;
pub mod solver;
pub mod status_reasons;
pub mod store;
