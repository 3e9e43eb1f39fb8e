// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Staged updates handed to provider implementations.
//!
//! Providers never touch a record's persisted status. During `create` or `delete`
//! they write into a [`StagedUpdate`] through the [`StagingUpdater`] trait; the
//! dispatch reconciler commits it into the provider's condition and `remoteInfo`
//! entry only when the provider call succeeded. When the call fails, the staged
//! values are dropped with the invocation.

use crate::crd::{Condition, ConditionStatus, DNSRecord};
use crate::dns_errors::ProviderError;
use std::collections::BTreeMap;

/// Write-only view of a [`StagedUpdate`], given to providers.
pub trait StagingUpdater: Send {
    /// Stage the condition outcome. The last call wins.
    fn stage_condition(&mut self, status: ConditionStatus, reason: &str);

    /// Stage provider bookkeeping, merged into `remoteInfo[<integration>]` on commit.
    fn stage_remote_info(&mut self, info: BTreeMap<String, String>);
}

/// Outcome staged by one provider invocation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedUpdate {
    status: Option<ConditionStatus>,
    reason: Option<String>,
    remote_info: Option<BTreeMap<String, String>>,
}

impl StagedUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> Option<&ConditionStatus> {
        self.status.as_ref()
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn remote_info(&self) -> Option<&BTreeMap<String, String>> {
        self.remote_info.as_ref()
    }

    /// Apply the staged values to `condition` and to `record`'s remote info for
    /// `integration`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::DidNotSetCondition`] when no status was staged. The
    /// record and condition are left untouched in that case.
    pub fn commit(
        self,
        record: &mut DNSRecord,
        integration: &str,
        condition: &mut Condition,
    ) -> Result<(), ProviderError> {
        let status = self.status.ok_or(ProviderError::DidNotSetCondition)?;
        condition.status = status;
        condition.reason = self.reason.unwrap_or_default();

        if let Some(info) = self.remote_info {
            record
                .status
                .get_or_insert_with(Default::default)
                .remote_info
                .entry(integration.to_string())
                .or_default()
                .extend(info);
        }
        Ok(())
    }
}

impl StagingUpdater for StagedUpdate {
    fn stage_condition(&mut self, status: ConditionStatus, reason: &str) {
        self.status = Some(status);
        self.reason = Some(reason.to_string());
    }

    fn stage_remote_info(&mut self, info: BTreeMap<String, String>) {
        self.remote_info
            .get_or_insert_with(BTreeMap::new)
            .extend(info);
    }
}

#[cfg(test)]
#[path = "staging_tests.rs"]
mod staging_tests;
