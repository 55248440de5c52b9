use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

use crate::app_config::{NetworkConfig, SyncSettings};
use crate::errors::WireError;
use crate::model::GridRecord;
use crate::wire::{validate_identifiers, Ack, Cursor, GridClient, Page, RetryPolicy};

const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// Client for the grid service REST API
pub struct HttpGridClient {
    /// Base URL, always ending with '/'
    base_url: Url,
    /// HTTP client for making requests
    client: Client,
    api_key: String,
    /// Records requested per page
    page_size: usize,
    retry: RetryPolicy,
    /// Minimum delay between two requests
    min_interval: Duration,
    /// Time the previous request was sent
    last_request: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for HttpGridClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGridClient")
            .field("base_url", &self.base_url.as_str())
            .field("page_size", &self.page_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl HttpGridClient {
    /// Create a client with explicit network settings
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        page_size: usize,
        network: &NetworkConfig,
    ) -> Result<Self, WireError> {
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(network.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| WireError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            api_key: api_key.into(),
            page_size,
            retry: RetryPolicy::from_network(network),
            min_interval: Duration::from_millis(network.rate_limit_delay_ms),
            last_request: Mutex::new(None),
        })
    }

    pub fn from_settings(settings: &SyncSettings) -> Result<Self, WireError> {
        Self::new(
            settings.base_url().clone(),
            settings.api_key(),
            settings.page_size(),
            settings.network(),
        )
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `{base}/v1/views/{view_id}/records`, with the view id escaped as one segment
    fn records_url(&self, view_id: &str) -> Result<Url, WireError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WireError::InvalidRequest(format!("base URL '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "views", view_id, "records"]);
        Ok(url)
    }

    /// Wait until the minimum interval since the previous request has passed
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Send a request with throttling and retry
    ///
    /// Transport errors and rate limits are retried with backoff; everything
    /// else is returned on the first occurrence.
    async fn execute<F>(&self, build: F) -> Result<Response, WireError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            self.throttle().await;

            let request = build()
                .header(AUTHORIZATION, format!("ApiKey {}", self.api_key))
                .header(ACCEPT, "application/json");

            let error = match request.send().await {
                Ok(response) => match classify(response).await {
                    Ok(response) => return Ok(response),
                    Err(e) => e,
                },
                Err(e) => WireError::Transport(format!("Failed to send request: {}", e)),
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= self.retry.max_retries {
                error!("Grid request failed after {} attempts: {}", attempt + 1, error);
                return Err(error);
            }

            attempt += 1;
            let delay = self.retry.delay_for(attempt, error.retry_after());
            warn!(
                "Grid request failed: {} - retrying in {}ms (attempt {}/{})",
                error,
                delay.as_millis(),
                attempt + 1,
                self.retry.max_retries + 1
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_page(&self, view_id: &str, offset: usize, limit: usize) -> Result<(Vec<GridRecord>, Option<usize>), WireError> {
        let mut url = self.records_url(view_id)?;
        url.query_pairs_mut().append_pair("page", &page_param(offset, limit));

        let response = self.execute(|| self.client.get(url.clone())).await?;

        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| WireError::Transport(format!("Failed to read response body: {}", e)))?;
        let records: Vec<GridRecord> = serde_json::from_str(&body)
            .map_err(|e| WireError::Parse(format!("records page: {}", e)))?;

        Ok((records, total))
    }
}

/// Value of the `page` query parameter, e.g. `{"offset":0,"limit":1000}`
fn page_param(offset: usize, limit: usize) -> String {
    format!("{{\"offset\":{},\"limit\":{}}}", offset, limit)
}

/// Seconds to wait from a `Retry-After` value, given as seconds or as an HTTP date
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc).signed_duration_since(now).num_seconds();
    Some(u64::try_from(wait).unwrap_or(0))
}

/// Map a non-success response to the error taxonomy
async fn classify(response: Response) -> Result<Response, WireError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()));
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());

    Err(match status.as_u16() {
        401 | 403 => WireError::Auth(format!("{}: {}", status, message)),
        429 => WireError::RateLimited { message, retry_after_secs },
        code if status.is_server_error() => WireError::Transport(format!("server error ({}): {}", code, message)),
        code => WireError::Api { status_code: code, message },
    })
}

#[async_trait]
impl GridClient for HttpGridClient {
    async fn fetch_records(
        &self,
        project_id: &str,
        view_id: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page, WireError> {
        validate_identifiers(project_id, view_id)?;
        let offset = cursor.map(|c| c.offset()).transpose()?.unwrap_or(0);

        let (records, total) = self.fetch_page(view_id, offset, self.page_size).await?;
        let next_offset = offset + records.len();
        let has_more = !records.is_empty()
            && match total {
                Some(total) => next_offset < total,
                None => records.len() >= self.page_size,
            };

        debug!(
            "Fetched {} records from view {} at offset {} (total {:?})",
            records.len(),
            view_id,
            offset,
            total
        );

        Ok(Page {
            records,
            next_cursor: has_more.then(|| Cursor::from_offset(next_offset)),
        })
    }

    async fn upsert_records(
        &self,
        project_id: &str,
        view_id: &str,
        records: &[GridRecord],
    ) -> Result<Vec<Ack>, WireError> {
        validate_identifiers(project_id, view_id)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.records_url(view_id)?;
        let response = self
            .execute(|| {
                self.client
                    .post(url.clone())
                    .header(CONTENT_TYPE, "application/json")
                    .json(records)
            })
            .await?;

        let body = response
            .text()
            .await
            .map_err(|e| WireError::Transport(format!("Failed to read response body: {}", e)))?;
        let returned: Vec<serde_json::Value> = serde_json::from_str(&body)
            .map_err(|e| WireError::Parse(format!("upsert response: {}", e)))?;
        let acknowledged: HashSet<&str> = returned
            .iter()
            .filter_map(|r| r.get("id").and_then(|id| id.as_str()))
            .collect();

        Ok(records
            .iter()
            .map(|record| {
                if acknowledged.contains(record.id.as_str()) {
                    Ack::accepted(record.id.clone())
                } else {
                    Ack::rejected(record.id.clone(), "record was not acknowledged by the service")
                }
            })
            .collect())
    }

    async fn test_connection(&self, project_id: &str, view_id: &str) -> Result<(), WireError> {
        validate_identifiers(project_id, view_id)?;
        self.fetch_page(view_id, 0, 1).await.map(|_| ())
    }
}
