// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for server.rs

#[cfg(test)]
mod tests {
    use crate::crd::DNSRecord;
    use crate::server::controller_router;
    use crate::solver::ChallengeSolver;
    use crate::store::{MemoryStore, ObjectStore};
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn spawn() -> (String, Arc<MemoryStore<DNSRecord>>) {
        let store = Arc::new(MemoryStore::<DNSRecord>::new());
        let router = controller_router(Arc::new(ChallengeSolver::new(store.clone())));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), store)
    }

    fn challenge(key: &str) -> Value {
        json!({
            "resourceNamespace": "certs",
            "resolvedZone": "example.com.",
            "resolvedFQDN": "_acme-challenge.example.com.",
            "key": key,
        })
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (base, _store) = spawn().await;
        for path in ["/healthz", "/readyz"] {
            let response = reqwest::get(format!("{base}{path}")).await.unwrap();
            assert_eq!(response.status(), 200);
            assert_eq!(response.text().await.unwrap(), "ok");
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        crate::metrics::record_lock_conflict("ServerTest");
        let (base, _store) = spawn().await;
        let body = reqwest::get(format!("{base}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("phonebook_se_quencer_io_lock_conflicts_total"));
    }

    #[tokio::test]
    async fn test_present_then_cleanup() {
        let (base, store) = spawn().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/solver/present"))
            .json(&challenge("token-1"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let records = store.list(&crate::store::ListFilter::all()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].spec.zone, "example.com");
        assert_eq!(records[0].spec.name, "_acme-challenge");

        let response = client
            .post(format!("{base}/solver/cleanup"))
            .json(&challenge("token-1"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["deleted"], 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_reports_bad_challenge_records() {
        let (base, store) = spawn().await;
        let solver = ChallengeSolver::new(store.clone());
        let mut record = solver
            .present("certs", "example.com", "_acme-challenge", "a")
            .await
            .unwrap();
        record.spec.targets.push("b".into());
        store.update(&record).await.unwrap();

        let response = reqwest::Client::new()
            .post(format!("{base}/solver/cleanup"))
            .json(&challenge("a"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
    }
}
