//! Upstream compliance platform client
//!
//! Single-attempt HTTP transport for the two data calls a pipeline run
//! needs: the project lookup and the paginated control listing. Response
//! status classes map onto the error taxonomy (401 auth, 403 permission,
//! everything else an upstream fault); there is no retry logic here, retries
//! are the caller's policy. Also hosts the HTTP credential exchange used by
//! the token cache.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use revdoc_core::{Config, RawRecord, ReportError};

use crate::token::{IssuedToken, TokenSource};

/// Budget below which a round trip is not attempted at all. Failing fast
/// here beats starting a call that the deadline will kill mid-flight.
const MIN_CALL_BUDGET: Duration = Duration::from_secs(1);

/// Source of raw project records for the pipeline. Implemented by
/// [`UpstreamClient`] in production and by fakes in pipeline tests.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the raw project record, spending at most `budget` wall-clock.
    async fn fetch(
        &self,
        record_id: i64,
        token: &str,
        budget: Duration,
        correlation_id: &str,
    ) -> Result<RawRecord, ReportError>;
}

/// HTTP client for the compliance platform data API.
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct ControlPage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    total: Option<usize>,
}

impl UpstreamClient {
    pub fn new(base_url: String, request_timeout: Duration, page_size: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client for upstream API")?;

        Ok(UpstreamClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            page_size: page_size.max(1),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.upstream_base_url.clone(),
            config.upstream_request_timeout(),
            config.upstream_page_size,
        )
    }

    /// Remaining budget for the next call, or `UpstreamTimeout` when it is
    /// too small for a safe round trip.
    fn remaining(&self, started: Instant, budget: Duration) -> Result<Duration, ReportError> {
        let remaining = budget.saturating_sub(started.elapsed());
        if remaining < MIN_CALL_BUDGET {
            return Err(ReportError::UpstreamTimeout(format!(
                "remaining budget {} ms is below the {} ms round-trip floor",
                remaining.as_millis(),
                MIN_CALL_BUDGET.as_millis()
            )));
        }
        Ok(remaining.min(self.request_timeout))
    }

    fn map_status(status: StatusCode, url: &str) -> Result<(), ReportError> {
        match status {
            StatusCode::UNAUTHORIZED => Err(ReportError::AuthFailure(format!(
                "upstream rejected the session token ({})",
                url
            ))),
            StatusCode::FORBIDDEN => Err(ReportError::AccessDenied(format!(
                "upstream denied access ({})",
                url
            ))),
            s if s.is_success() => Ok(()),
            s => Err(ReportError::UpstreamUnavailable(format!(
                "upstream returned {} for {}",
                s, url
            ))),
        }
    }

    fn map_transport_error(err: reqwest::Error, url: &str) -> ReportError {
        if err.is_timeout() {
            ReportError::UpstreamTimeout(format!("request to {} timed out", url))
        } else {
            ReportError::UpstreamUnavailable(format!("request to {} failed: {}", url, err))
        }
    }

    async fn get_json(
        &self,
        url: &str,
        token: &str,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, ReportError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .header("X-Correlation-Id", correlation_id)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(e, url))?;

        Self::map_status(response.status(), url)?;

        response.json().await.map_err(|e| {
            ReportError::UpstreamUnavailable(format!("invalid JSON from {}: {}", url, e))
        })
    }

    async fn fetch_project(
        &self,
        record_id: i64,
        token: &str,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, ReportError> {
        let url = format!("{}/projects/{}", self.base_url, record_id);
        self.get_json(&url, token, correlation_id, timeout).await
    }

    /// Page through the control listing until the upstream-reported total is
    /// reached. A bare-array body is accepted as a complete, unpaginated
    /// listing.
    async fn fetch_controls(
        &self,
        record_id: i64,
        token: &str,
        correlation_id: &str,
        started: Instant,
        budget: Duration,
    ) -> Result<Vec<serde_json::Value>, ReportError> {
        let mut controls = Vec::new();
        let mut offset = 0usize;

        loop {
            let timeout = self.remaining(started, budget)?;
            let url = format!(
                "{}/projects/{}/controls?limit={}&offset={}",
                self.base_url, record_id, self.page_size, offset
            );
            let body = self.get_json(&url, token, correlation_id, timeout).await?;

            if let Some(items) = body.as_array() {
                controls.extend(items.iter().cloned());
                break;
            }

            let page: ControlPage = serde_json::from_value(body).map_err(|e| {
                ReportError::UpstreamUnavailable(format!(
                    "unexpected control listing shape from {}: {}",
                    url, e
                ))
            })?;

            let fetched = page.items.len();
            controls.extend(page.items);

            let done = fetched == 0
                || fetched < self.page_size
                || page.total.is_some_and(|total| controls.len() >= total);
            if done {
                break;
            }
            offset += self.page_size;
        }

        Ok(controls)
    }
}

#[async_trait]
impl RecordSource for UpstreamClient {
    async fn fetch(
        &self,
        record_id: i64,
        token: &str,
        budget: Duration,
        correlation_id: &str,
    ) -> Result<RawRecord, ReportError> {
        let started = Instant::now();

        let timeout = self.remaining(started, budget)?;
        let project = self
            .fetch_project(record_id, token, correlation_id, timeout)
            .await?;

        let controls = self
            .fetch_controls(record_id, token, correlation_id, started, budget)
            .await?;

        tracing::info!(
            record_id,
            control_count = controls.len(),
            correlation_id,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "upstream record fetched"
        );

        Ok(RawRecord::new(project, controls))
    }
}

/// Credential exchange over the platform's auth endpoint. Every failure
/// surfaces as `AuthFailure`; the token cache never caches failures.
pub struct HttpTokenSource {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    expires_in: u64,
}

impl HttpTokenSource {
    pub fn new(base_url: String, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client for token exchange")?;

        Ok(HttpTokenSource {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.upstream_base_url.clone(),
            config.upstream_request_timeout(),
        )
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn issue(&self, credential: &str) -> Result<IssuedToken, ReportError> {
        let url = format!("{}/auth/token", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "credential": credential }))
            .send()
            .await
            .map_err(|e| ReportError::AuthFailure(format!("token exchange failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::AuthFailure(format!(
                "token exchange returned {}",
                status
            )));
        }

        let body: TokenExchangeResponse = response.json().await.map_err(|e| {
            ReportError::AuthFailure(format!("invalid token exchange response: {}", e))
        })?;

        Ok(IssuedToken {
            token: body.access_token,
            ttl: Duration::from_secs(body.expires_in),
        })
    }
}
