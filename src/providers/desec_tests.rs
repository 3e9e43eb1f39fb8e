// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `desec.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{ConditionStatus, DNSRecord, DNSRecordSpec};
    use crate::dns_errors::ProviderError;
    use crate::providers::desec::DesecProvider;
    use crate::providers::Provider;
    use crate::reconcilers::staging::StagedUpdate;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(name: &str) -> DNSRecord {
        DNSRecord::new(
            "mail",
            DNSRecordSpec {
                zone: "example.com".into(),
                record_type: "MX".into(),
                name: name.into(),
                targets: vec!["10 mx1.example.com.".into(), "20 mx2.example.com.".into()],
                properties: None,
                ttl: None,
                integration: None,
            },
        )
    }

    #[tokio::test]
    async fn test_create_posts_rrset_with_all_targets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/domains/example.com/rrsets/"))
            .and(header("Authorization", "Token secret"))
            .and(body_json(json!({
                "subname": "",
                "type": "MX",
                "ttl": 3600,
                "records": ["10 mx1.example.com.", "20 mx2.example.com."]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = DesecProvider::new("secret", &server.uri()).unwrap();
        let mut staged = StagedUpdate::new();
        provider.create(&record("@"), &mut staged).await.unwrap();

        assert_eq!(staged.status(), Some(&ConditionStatus::Created));
    }

    #[tokio::test]
    async fn test_delete_apex_uses_at_sign() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/domains/example.com/rrsets/@/MX/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let provider = DesecProvider::new("secret", &server.uri()).unwrap();
        let mut staged = StagedUpdate::new();
        provider.delete(&record(""), &mut staged).await.unwrap();

        assert_eq!(staged.status(), Some(&ConditionStatus::Terminated));
    }

    #[tokio::test]
    async fn test_forbidden_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("{\"detail\":\"Invalid token.\"}"))
            .mount(&server)
            .await;

        let provider = DesecProvider::new("bad", &server.uri()).unwrap();
        let mut staged = StagedUpdate::new();
        let err = provider.create(&record("mail"), &mut staged).await.unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 403, .. }));
        assert!(staged.status().is_none());
    }

    #[tokio::test]
    async fn test_create_without_targets_sends_nothing() {
        let server = MockServer::start().await;
        let provider = DesecProvider::new("secret", &server.uri()).unwrap();
        let mut rec = record("mail");
        rec.spec.targets.clear();

        let mut staged = StagedUpdate::new();
        let err = provider.create(&rec, &mut staged).await.unwrap_err();

        assert!(matches!(err, ProviderError::NoTargets { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
