// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition ledger helpers.
//!
//! Every phonebook resource carries a ledger of [`Condition`] entries in its status.
//! The ledger is keyed by condition type: setting a condition overwrites the entry
//! with the same type, and entries are kept sorted by type so serialized statuses
//! compare equal regardless of the order in which conditions were written.
//!
//! These helpers never call the API server. Persisting a ledger is the job of
//! [`Lock::execute`](crate::reconcilers::lock::Lock::execute).
//!
//! # Example
//!
//! ```rust
//! use phonebook::crd::{Condition, ConditionStatus};
//! use phonebook::reconcilers::status::{find_condition, set_status};
//!
//! let mut conditions: Vec<Condition> = Vec::new();
//! set_status(&mut conditions, "Integration", ConditionStatus::Completed, "done");
//! assert_eq!(
//!     find_condition(&conditions, "Integration").map(|c| &c.status),
//!     Some(&ConditionStatus::Completed)
//! );
//! ```

use crate::crd::{Condition, ConditionStatus};
use crate::labels::integration_from_claim_key;
use chrono::Utc;

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Status of a condition, if present.
#[must_use]
pub fn condition_status(conditions: &[Condition], condition_type: &str) -> Option<ConditionStatus> {
    find_condition(conditions, condition_type).map(|c| c.status.clone())
}

/// Insert or overwrite a condition, keeping the ledger sorted by type.
///
/// `lastTransitionTime` is carried over from the existing entry when the status does
/// not change, and set to now when it does.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.binary_search_by(|c| c.r#type.as_str().cmp(condition.r#type.as_str())) {
        Ok(index) => {
            let existing = &conditions[index];
            condition.last_transition_time = if existing.status == condition.status {
                existing
                    .last_transition_time
                    .clone()
                    .or_else(|| Some(Utc::now().to_rfc3339()))
            } else {
                Some(Utc::now().to_rfc3339())
            };
            conditions[index] = condition;
        }
        Err(index) => {
            if condition.last_transition_time.is_none() {
                condition.last_transition_time = Some(Utc::now().to_rfc3339());
            }
            conditions.insert(index, condition);
        }
    }
}

/// Shorthand for [`set_condition`] from parts.
pub fn set_status(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: ConditionStatus,
    reason: impl Into<String>,
) {
    set_condition(
        conditions,
        Condition {
            r#type: condition_type.to_string(),
            status,
            reason: reason.into(),
            last_transition_time: None,
        },
    );
}

/// Integration names claimed by `provider://<name>` entries, in ledger order.
#[must_use]
pub fn provider_claims(conditions: &[Condition]) -> Vec<&str> {
    conditions
        .iter()
        .filter_map(|c| integration_from_claim_key(&c.r#type))
        .collect()
}

/// Effective status of an integration's claim on a record.
///
/// Once the provider worker has written its own condition (keyed by the bare
/// integration name), that condition is authoritative. Before that, the claim written
/// by the resolver stands in for it.
#[must_use]
pub fn effective_provider_status(
    conditions: &[Condition],
    integration: &str,
) -> Option<ConditionStatus> {
    condition_status(conditions, integration).or_else(|| {
        condition_status(
            conditions,
            &crate::labels::provider_claim_key(integration),
        )
    })
}

/// `true` when no provider can still hold remote state for the record: every
/// provider claim has an effective status that ends its involvement
/// ([`ConditionStatus::is_terminal_for_deletion`]).
///
/// A ledger with no claims is released vacuously: no provider ever acted on the record.
#[must_use]
pub fn all_providers_released(conditions: &[Condition]) -> bool {
    provider_claims(conditions).into_iter().all(|integration| {
        effective_provider_status(conditions, integration)
            .is_some_and(|status| status.is_terminal_for_deletion())
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
