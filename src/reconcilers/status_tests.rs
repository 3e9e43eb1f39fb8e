// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{Condition, ConditionStatus};
    use crate::reconcilers::status::{
        all_providers_released, effective_provider_status, find_condition,
        provider_claims, set_condition, set_status,
    };

    #[test]
    fn test_set_status_overwrites_by_type() {
        let mut conditions = Vec::new();
        set_status(&mut conditions, "Integration", ConditionStatus::Initialized, "");
        set_status(&mut conditions, "Integration", ConditionStatus::Completed, "done");

        assert_eq!(conditions.len(), 1, "same type must never be duplicated");
        assert_eq!(conditions[0].status, ConditionStatus::Completed);
        assert_eq!(conditions[0].reason, "done");
    }

    #[test]
    fn test_ledger_is_sorted_by_type() {
        let mut conditions = Vec::new();
        set_status(&mut conditions, "provider://b", ConditionStatus::Completed, "");
        set_status(&mut conditions, "Integration", ConditionStatus::Completed, "");
        set_status(&mut conditions, "provider://a", ConditionStatus::Completed, "");

        let types: Vec<&str> = conditions.iter().map(|c| c.r#type.as_str()).collect();
        assert_eq!(types, vec!["Integration", "provider://a", "provider://b"]);
    }

    #[test]
    fn test_transition_time_preserved_when_status_unchanged() {
        let mut conditions = vec![Condition {
            r#type: "Health".into(),
            status: ConditionStatus::Waiting,
            reason: "first".into(),
            last_transition_time: Some("2025-01-01T00:00:00Z".into()),
        }];

        set_status(&mut conditions, "Health", ConditionStatus::Waiting, "second");
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );

        set_status(&mut conditions, "Health", ConditionStatus::Completed, "Healthy");
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_new_condition_gets_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, Condition::initialized("Deployment"));
        assert!(conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_provider_claims_extracts_integration_names() {
        let mut conditions = Vec::new();
        set_status(&mut conditions, "Integration", ConditionStatus::Completed, "");
        set_status(&mut conditions, "provider://cf", ConditionStatus::Completed, "");
        set_status(&mut conditions, "cf", ConditionStatus::Created, "");
        set_status(&mut conditions, "provider://desec", ConditionStatus::Completed, "");

        assert_eq!(provider_claims(&conditions), vec!["cf", "desec"]);
    }

    #[test]
    fn test_effective_status_prefers_provider_condition() {
        let mut conditions = Vec::new();
        set_status(&mut conditions, "provider://cf", ConditionStatus::Completed, "");
        assert_eq!(
            effective_provider_status(&conditions, "cf"),
            Some(ConditionStatus::Completed)
        );

        set_status(&mut conditions, "cf", ConditionStatus::Terminated, "");
        assert_eq!(
            effective_provider_status(&conditions, "cf"),
            Some(ConditionStatus::Terminated)
        );
        assert_eq!(effective_provider_status(&conditions, "other"), None);
    }

    #[test]
    fn test_all_providers_terminal() {
        let mut conditions = Vec::new();
        set_status(&mut conditions, "provider://a", ConditionStatus::Completed, "");
        set_status(&mut conditions, "provider://b", ConditionStatus::Completed, "");
        set_status(&mut conditions, "a", ConditionStatus::Terminated, "");
        assert!(
            !all_providers_released(&conditions),
            "b has not acted yet"
        );

        set_status(&mut conditions, "b", ConditionStatus::Error, "boom");
        assert!(all_providers_released(&conditions));
    }

    #[test]
    fn test_all_providers_vacuous_without_claims() {
        let mut conditions = Vec::new();
        set_status(&mut conditions, "Integration", ConditionStatus::Error, "no match");
        assert!(all_providers_released(&conditions));
    }

    #[test]
    fn test_find_condition_missing() {
        let conditions: Vec<Condition> = Vec::new();
        assert!(find_condition(&conditions, "Integration").is_none());
    }
}
