// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the provider registry

#[cfg(test)]
mod tests {
    use crate::dns_errors::ProviderError;
    use crate::providers::desec::DesecProvider;
    use crate::providers::{build_provider, default_image, Provider, ProviderStore};
    use std::sync::Arc;

    #[test]
    fn test_default_image() {
        assert_eq!(
            default_image("cloudflare", "0.3.0"),
            "ghcr.io/pier-oliviert/providers-cloudflare:v0.3.0"
        );
    }

    #[test]
    fn test_empty_store_is_not_configured() {
        let store = ProviderStore::new();
        assert!(matches!(
            store.provider(),
            Err(ProviderError::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_returns_configured_provider() {
        let mut provider = DesecProvider::new("token", "http://localhost:1").unwrap();
        provider
            .configure("desec-prod", vec!["example.com".into()])
            .await
            .unwrap();

        let store = ProviderStore::with_provider(Arc::new(provider));
        let stored = store.provider().unwrap();
        assert_eq!(stored.name(), "desec");
        assert_eq!(stored.zones(), ["example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_provider_fails() {
        let err = build_provider("route66", "x", vec![]).await.err().unwrap();
        assert!(matches!(&err, ProviderError::UnknownProvider { name, .. } if name == "route66"));
        assert_eq!(
            err.to_string(),
            "Unknown provider 'route66', expected one of: aws, azure, cloudflare, desec, gcore, rfc2136"
        );
    }
}
