// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for provider HTTP APIs.
//!
//! Transient failures (429, 5xx, connection errors) are retried with exponential
//! backoff and jitter. Client errors (4xx) are returned immediately so the
//! reconciliation records them as an `Error` condition.

use crate::dns_errors::ProviderError;
use reqwest::{Response, StatusCode};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Initial retry interval for provider HTTP calls
const HTTP_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// Maximum interval between retries
const HTTP_MAX_INTERVAL_SECS: u64 = 10;

/// Give up after this long
const HTTP_MAX_ELAPSED_TIME_SECS: u64 = 120;

const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Jitter applied to each interval (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Exponential backoff with jitter.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    pub current_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: Option<Duration>,
    pub multiplier: f64,
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Next interval to wait, or `None` once the elapsed time budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        // random() is in [0, 1): map it onto [secs - delta, secs + delta)
        let jittered = secs - delta + rand::random::<f64>() * 2.0 * delta;

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff used for provider HTTP calls: 50ms initial, 10s max interval, 2 minutes total.
#[must_use]
pub fn http_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(HTTP_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(HTTP_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(HTTP_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// `true` for statuses worth retrying: 429, 500, 502, 503, 504
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Send a request built by `operation`, retrying transient failures.
///
/// A response with a non-retryable status (including 4xx) is returned as-is; the
/// caller decides how to report it. When retries are exhausted on a retryable
/// status, the last response is returned.
///
/// # Errors
///
/// Returns [`ProviderError::Http`] when the request cannot be sent and the failure
/// is not transient, or when retries are exhausted on transport errors.
pub async fn retry_http<F, Fut>(
    provider: &str,
    mut backoff: ExponentialBackoff,
    mut operation: F,
) -> Result<Response, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(response) if is_retryable_http_status(response.status()) => {
                let status = response.status();
                let Some(duration) = backoff.next_backoff() else {
                    error!(provider, attempt, %status, "Backoff exhausted, giving up");
                    return Ok(response);
                };
                warn!(provider, attempt, %status, retry_after = ?duration, "Retryable HTTP status, will retry");
                tokio::time::sleep(duration).await;
            }
            Ok(response) => {
                if attempt > 1 {
                    debug!(provider, attempt, "HTTP call succeeded after retries");
                }
                return Ok(response);
            }
            Err(e) if is_retryable_transport_error(&e) => {
                let Some(duration) = backoff.next_backoff() else {
                    error!(provider, attempt, error = %e, "Backoff exhausted, giving up");
                    return Err(ProviderError::Http {
                        provider: provider.to_string(),
                        source: e,
                    });
                };
                warn!(provider, attempt, error = %e, retry_after = ?duration, "Transport error, will retry");
                tokio::time::sleep(duration).await;
            }
            Err(e) => {
                return Err(ProviderError::Http {
                    provider: provider.to_string(),
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
