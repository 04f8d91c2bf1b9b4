//! Rate-limit-aware JSON client shared by the ecosyste.ms and GitHub adapters.
//!
//! Every request goes through [`ApiClient::execute`], which throttles to a
//! minimum interval, retries 429/5xx/transport failures with exponential
//! backoff, waits out GitHub's `X-RateLimit-Reset` window, and maps 404 to
//! `Ok(None)` so callers can skip missing resources.

use crate::utils::error::{AnalyzerError, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

pub const USER_AGENT: &str = concat!("oss-engagement-analyzer/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub min_interval: Duration,
    /// Upper bound on a single rate-limit sleep.
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            min_interval: Duration::from_millis(100),
            max_rate_limit_wait: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    /// No sleeping at all. Used by tests against a local mock server.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            min_interval: Duration::ZERO,
            max_rate_limit_wait: Duration::ZERO,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// What to do with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Success,
    NotFound,
    Retry(Duration),
    Fail,
}

/// Classify a response by status and rate-limit headers.
pub fn disposition(
    status: StatusCode,
    headers: &HeaderMap,
    attempt: u32,
    policy: &RetryPolicy,
    now_epoch_secs: u64,
) -> Disposition {
    if status.is_success() {
        return Disposition::Success;
    }
    if status == StatusCode::NOT_FOUND {
        return Disposition::NotFound;
    }

    let retry_after = header_u64(headers, "retry-after").map(Duration::from_secs);

    if status == StatusCode::TOO_MANY_REQUESTS {
        let wait = retry_after.unwrap_or_else(|| policy.backoff(attempt));
        return Disposition::Retry(wait.min(policy.max_rate_limit_wait));
    }

    if status == StatusCode::FORBIDDEN {
        // Secondary rate limits carry Retry-After, primary ones an exhausted quota
        if let Some(wait) = retry_after {
            return Disposition::Retry(wait.min(policy.max_rate_limit_wait));
        }
        if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
            let wait = match header_u64(headers, "x-ratelimit-reset") {
                Some(reset) => Duration::from_secs(reset.saturating_sub(now_epoch_secs) + 1),
                None => policy.backoff(attempt),
            };
            return Disposition::Retry(wait.min(policy.max_rate_limit_wait));
        }
        return Disposition::Fail;
    }

    if status.is_server_error() {
        return Disposition::Retry(policy.backoff(attempt));
    }

    Disposition::Fail
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct ApiClient {
    client: Client,
    policy: RetryPolicy,
    bearer_token: Option<String>,
    request_count: AtomicU64,
    last_request: Mutex<Option<Instant>>,
}

impl ApiClient {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            policy,
            bearer_token: None,
            request_count: AtomicU64::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Requests sent so far, retries included.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        self.execute(url, || self.client.get(url).query(query)).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Option<T>> {
        self.execute(url, || self.client.post(url).json(body)).await
    }

    /// Collect a page-numbered array endpoint. Stops at an empty or short
    /// page, a 404, or after `max_pages`.
    pub async fn paginate<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        per_page: u32,
        max_pages: u32,
    ) -> Result<Vec<T>> {
        let mut all_results = Vec::new();

        for page in 1..=max_pages {
            let mut params = query.to_vec();
            params.push(("per_page", per_page.to_string()));
            params.push(("page", page.to_string()));

            let Some(items) = self.get_json::<Vec<T>>(url, &params).await? else {
                break;
            };

            let count = items.len();
            all_results.extend(items);
            tracing::debug!("{} page {}: {} items", url, page, count);

            if count < per_page as usize {
                break;
            }
        }

        Ok(all_results)
    }

    async fn throttle(&self) {
        if self.policy.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.min_interval {
                tokio::time::sleep(self.policy.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn execute<T, F>(&self, url: &str, build: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_status = None;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let is_last = attempt + 1 == max_attempts;

            self.throttle().await;
            self.request_count.fetch_add(1, Ordering::Relaxed);

            let mut request = build();
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(e.to_string());
                    if is_last {
                        tracing::warn!("Request error for {}: {}", url, e);
                        break;
                    }
                    let wait = self.policy.backoff(attempt);
                    tracing::warn!("Request error for {}: {} (retrying in {:?})", url, e, wait);
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            let status = response.status();
            last_status = Some(status.as_u16());
            last_error = None;
            tracing::debug!("{} -> {}", url, status);

            let action = disposition(
                status,
                response.headers(),
                attempt,
                &self.policy,
                now_epoch_secs(),
            );
            match action {
                Disposition::Success => return Ok(Some(response.json::<T>().await?)),
                Disposition::NotFound => return Ok(None),
                Disposition::Retry(wait) => {
                    if is_last {
                        break;
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
                        tracing::warn!("⏳ Rate limited by {}. Waiting {:?}...", url, wait);
                    } else {
                        tracing::warn!("Server error {} from {} (retrying in {:?})", status, url, wait);
                    }
                    tokio::time::sleep(wait).await;
                }
                Disposition::Fail => {
                    let body = response.text().await.unwrap_or_default();
                    tracing::debug!(
                        "API error {} for {}: {}",
                        status,
                        url,
                        body.chars().take(200).collect::<String>()
                    );
                    return Err(AnalyzerError::ApiStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
            }
        }

        Err(AnalyzerError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last_status,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::header::HeaderValue;
    use std::sync::Arc;

    fn client() -> ApiClient {
        ApiClient::new(RetryPolicy::immediate()).unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_disposition_rate_limit_reset() {
        let policy = RetryPolicy::default();
        let h = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "1030")]);
        assert_eq!(
            disposition(StatusCode::FORBIDDEN, &h, 0, &policy, 1000),
            Disposition::Retry(Duration::from_secs(31))
        );

        // Reset already passed: wait the one-second margin only
        assert_eq!(
            disposition(StatusCode::FORBIDDEN, &h, 0, &policy, 5000),
            Disposition::Retry(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_disposition_caps_rate_limit_wait() {
        let policy = RetryPolicy {
            max_rate_limit_wait: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        let h = headers(&[("retry-after", "120")]);
        assert_eq!(
            disposition(StatusCode::TOO_MANY_REQUESTS, &h, 0, &policy, 0),
            Disposition::Retry(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_disposition_plain_forbidden_fails() {
        let policy = RetryPolicy::default();
        let h = headers(&[("x-ratelimit-remaining", "4999")]);
        assert_eq!(
            disposition(StatusCode::FORBIDDEN, &h, 0, &policy, 0),
            Disposition::Fail
        );
        assert_eq!(
            disposition(StatusCode::UNPROCESSABLE_ENTITY, &HeaderMap::new(), 0, &policy, 0),
            Disposition::Fail
        );
    }

    #[test]
    fn test_disposition_server_error_backs_off() {
        let policy = RetryPolicy::default();
        assert_eq!(
            disposition(StatusCode::BAD_GATEWAY, &HeaderMap::new(), 1, &policy, 0),
            Disposition::Retry(Duration::from_secs(2))
        );
        assert_eq!(
            disposition(StatusCode::NOT_FOUND, &HeaderMap::new(), 0, &policy, 0),
            Disposition::NotFound
        );
    }

    #[tokio::test]
    async fn test_get_json_success_sends_user_agent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/thing")
                .query_param("q", "1")
                .header("user-agent", USER_AGENT);
            then.status(200).json_body(serde_json::json!({"ok": true}));
        });

        let api = client();
        let value: Option<serde_json::Value> = api
            .get_json(&server.url("/thing"), &[("q", "1".to_string())])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(value.unwrap()["ok"], true);
        assert_eq!(api.request_count(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let value: Option<serde_json::Value> =
            client().get_json(&server.url("/missing"), &[]).await.unwrap();

        mock.assert_hits(1);
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_server_errors_retry_until_exhausted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503);
        });

        let api = client();
        let err = api
            .get_json::<serde_json::Value>(&server.url("/flaky"), &[])
            .await
            .unwrap_err();

        mock.assert_hits(3);
        assert_eq!(api.request_count(), 3);
        assert!(err.is_transient());
        match err {
            AnalyzerError::RetriesExhausted { attempts, last_status, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_too_many_requests_is_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/limited");
            then.status(429).header("Retry-After", "0");
        });

        let err = client()
            .get_json::<serde_json::Value>(&server.url("/limited"), &[])
            .await
            .unwrap_err();

        mock.assert_hits(3);
        assert!(matches!(
            err,
            AnalyzerError::RetriesExhausted { last_status: Some(429), .. }
        ));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/bad");
            then.status(403).body("forbidden");
        });

        let err = client()
            .get_json::<serde_json::Value>(&server.url("/bad"), &[])
            .await
            .unwrap_err();

        mock.assert_hits(1);
        assert!(!err.is_transient());
        assert!(matches!(err, AnalyzerError::ApiStatus { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_post_json_with_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .header("authorization", "Bearer t0ken")
                .json_body(serde_json::json!({"query": "{ viewer { login } }"}));
            then.status(200).json_body(serde_json::json!({"data": {}}));
        });

        let api = client().with_bearer_token("t0ken");
        let value: Option<serde_json::Value> = api
            .post_json(
                &server.url("/graphql"),
                &serde_json::json!({"query": "{ viewer { login } }"}),
            )
            .await
            .unwrap();

        mock.assert();
        assert!(value.is_some());
    }

    #[tokio::test]
    async fn test_paginate_stops_on_short_page() {
        let server = MockServer::start();
        let page1 = server.mock(|when, then| {
            when.method(GET)
                .path("/items")
                .query_param("page", "1")
                .query_param("per_page", "2");
            then.status(200).json_body(serde_json::json!([1, 2]));
        });
        let page2 = server.mock(|when, then| {
            when.method(GET).path("/items").query_param("page", "2");
            then.status(200).json_body(serde_json::json!([3]));
        });
        let page3 = server.mock(|when, then| {
            when.method(GET).path("/items").query_param("page", "3");
            then.status(200).json_body(serde_json::json!([4]));
        });

        let items: Vec<u32> = client()
            .paginate(&server.url("/items"), &[], 2, 10)
            .await
            .unwrap();

        page1.assert();
        page2.assert();
        page3.assert_hits(0);
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_paginate_respects_max_pages() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/full");
            then.status(200).json_body(serde_json::json!([1]));
        });

        let items: Vec<u32> = client()
            .paginate(&server.url("/full"), &[], 1, 3)
            .await
            .unwrap();

        mock.assert_hits(3);
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn test_transport_errors_exhaust_retries() {
        let api = client();
        let err = api
            .get_json::<serde_json::Value>("http://127.0.0.1:1/unreachable", &[])
            .await
            .unwrap_err();

        assert_eq!(api.request_count(), 3);
        assert!(err.is_transient());
        match err {
            AnalyzerError::RetriesExhausted { attempts, last_status, last_error, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, None);
                assert!(last_error.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_then_success() {
        let server = MockServer::start_async().await;
        let mut failing = server
            .mock_async(|when, then| {
                when.method(GET).path("/recovering");
                then.status(503);
            })
            .await;

        let api = Arc::new(
            ApiClient::new(RetryPolicy {
                base_delay: Duration::from_millis(300),
                ..RetryPolicy::immediate()
            })
            .unwrap(),
        );
        let url = server.url("/recovering");
        let task = tokio::spawn({
            let api = Arc::clone(&api);
            async move { api.get_json::<serde_json::Value>(&url, &[]).await }
        });

        while failing.hits_async().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        failing.delete_async().await;
        let healthy = server
            .mock_async(|when, then| {
                when.method(GET).path("/recovering");
                then.status(200).json_body(serde_json::json!({"ok": true}));
            })
            .await;

        let value = task.await.unwrap().unwrap();

        healthy.assert_hits_async(1).await;
        assert_eq!(value.unwrap()["ok"], true);
        assert_eq!(api.request_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_after_is_honored() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/slow-down");
            then.status(429).header("Retry-After", "1");
        });

        let api = ApiClient::new(RetryPolicy {
            max_attempts: 2,
            max_rate_limit_wait: Duration::from_secs(10),
            ..RetryPolicy::immediate()
        })
        .unwrap();

        let started = Instant::now();
        let err = api
            .get_json::<serde_json::Value>(&server.url("/slow-down"), &[])
            .await
            .unwrap_err();

        mock.assert_hits(2);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(matches!(
            err,
            AnalyzerError::RetriesExhausted { last_status: Some(429), .. }
        ));
    }

    #[tokio::test]
    async fn test_min_interval_spaces_requests() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/paced");
            then.status(200).json_body(serde_json::json!({}));
        });

        let api = ApiClient::new(RetryPolicy {
            min_interval: Duration::from_millis(200),
            ..RetryPolicy::immediate()
        })
        .unwrap();

        let started = Instant::now();
        for _ in 0..3 {
            api.get_json::<serde_json::Value>(&server.url("/paced"), &[])
                .await
                .unwrap();
        }

        mock.assert_hits(3);
        assert!(started.elapsed() >= Duration::from_millis(400));
    }
}
