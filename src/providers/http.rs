// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authenticated JSON client shared by the REST provider adapters.

use super::retry::{http_backoff, retry_http, ExponentialBackoff};
use crate::dns_errors::ProviderError;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const HTTP_TIMEOUT_SECS: u64 = 30;

pub(crate) struct ApiClient {
    provider: &'static str,
    client: reqwest::Client,
    base_url: String,
    authorization: Option<String>,
    backoff: fn() -> ExponentialBackoff,
}

impl ApiClient {
    /// Client for `base_url`. When `authorization` is set it is sent with every
    /// request made through [`ApiClient::send`].
    pub(crate) fn new(
        provider: &'static str,
        base_url: &str,
        authorization: impl Into<Option<String>>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|source| ProviderError::Http {
                provider: provider.to_string(),
                source,
            })?;

        Ok(Self {
            provider,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: authorization.into(),
            backoff: http_backoff,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a JSON request with the client's authorization, retrying transient
    /// failures, and fail on any non-2xx status.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ProviderError> {
        self.send_with(method, path, |mut request| {
            if let Some(authorization) = &self.authorization {
                request = request.header(AUTHORIZATION, authorization);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            request
        })
        .await
    }

    /// Send a request shaped by `build`, with the same retry and status handling as
    /// [`ApiClient::send`].
    ///
    /// `build` runs once per attempt and must set every header and the body itself.
    pub(crate) async fn send_with<B>(
        &self,
        method: Method,
        path: &str,
        build: B,
    ) -> Result<Response, ProviderError>
    where
        B: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(provider = self.provider, %method, %url, "Sending provider request");

        let response = retry_http(self.provider, (self.backoff)(), || {
            build(self.client.request(method.clone(), &url)).send()
        })
        .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            provider: self.provider.to_string(),
            status,
            message: if message.is_empty() {
                "empty response body".to_string()
            } else {
                message
            },
        })
    }

    /// Decode a JSON response body
    pub(crate) async fn json<T: DeserializeOwned>(&self, response: Response) -> Result<T, ProviderError> {
        response.json().await.map_err(|source| ProviderError::Http {
            provider: self.provider.to_string(),
            source,
        })
    }
}
