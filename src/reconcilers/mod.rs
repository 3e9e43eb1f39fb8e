// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic.
//!
//! - [`dnsrecord`] - resolves which integrations publish a record and releases it on delete
//! - [`dnsintegration`] - deploys and health-checks an integration's provider worker
//! - [`provider`] - dispatches claimed records to the worker's provider
//!
//! The remaining modules are the machinery they share: the status [`lock`], staged
//! provider results ([`staging`]), condition helpers ([`status`]) and finalizers.

pub mod dnsintegration;
pub mod dnsrecord;
pub mod finalizers;
pub mod lock;
pub mod pagination;
pub mod provider;
pub mod resolver;
pub mod staging;
pub mod status;

pub use dnsintegration::reconcile_dnsintegration;
pub use dnsrecord::reconcile_dnsrecord;
pub use provider::reconcile_provider_record;
