//! The HTTP Client: sends request envelopes, maintains jar/CSRF/rate-limit
//! state, and applies the retry policy.

pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::token::TokenManager;
use crate::transport::{Envelope, Method, RawResponse, Transport};

use rate_limit::{RateLimitRecord, RateLimitTable};

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(120);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphqlMethod {
    Get,
    Post,
}

pub struct ClientConfig {
    pub max_rate_limit_wait: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_wait: DEFAULT_MAX_RATE_LIMIT_WAIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Owns the session (jar + tokens) and drives every request through the
/// retry/housekeeping pipeline. Lock acquisition order, when more than one
/// is needed, is always jar → tokens' internal lock → rate-limit table,
/// matching the fixed order the concurrency model requires.
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    jar: Mutex<CookieJar>,
    tokens: TokenManager,
    rate_limits: RateLimitTable,
    config: ClientConfig,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            jar: Mutex::new(CookieJar::new()),
            tokens: TokenManager::new(),
            rate_limits: RateLimitTable::new(),
            config,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn replace_jar(&self, jar: CookieJar) {
        self.tokens.set_csrf(jar.csrf_token().map(|s| s.to_string()));
        *self.jar.lock().await = jar;
    }

    pub async fn jar_snapshot(&self) -> CookieJar {
        self.jar.lock().await.clone()
    }

    pub fn rate_limit(&self, endpoint: &str) -> Option<RateLimitRecord> {
        self.rate_limits.get(endpoint)
    }

    /// Sends one request envelope through the full retry/housekeeping
    /// pipeline. `endpoint_key` names the logical endpoint for rate-limit
    /// bookkeeping and `RateLimited` error reporting; `authenticated`
    /// selects cookie+CSRF headers over bearer+guest; `idempotent` gates
    /// retry eligibility.
    pub async fn request(
        &self,
        mut envelope: Envelope,
        endpoint_key: &str,
        authenticated: bool,
        idempotent: bool,
    ) -> Result<RawResponse> {
        if envelope.timeout.is_none() {
            envelope.timeout = Some(self.config.request_timeout);
        }

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(8))
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 1;
        loop {
            let token_headers = self.tokens.headers(authenticated, &self.transport).await?;
            {
                let jar = self.jar.lock().await;
                if !jar.is_empty() {
                    envelope = envelope.header("cookie", jar.to_cookie_header());
                }
            }
            envelope = envelope.headers(token_headers);

            let send_result = self.transport.send(&envelope).await;

            let response = match send_result {
                Ok(response) => response,
                Err(err) => {
                    if idempotent && err.is_retryable_transport() && attempt < MAX_ATTEMPTS {
                        let wait = backoff.next_backoff().unwrap_or(Duration::from_secs(8));
                        warn!(attempt, ?wait, "retrying after transport error: {err}");
                        if self.sleep_or_cancel(&envelope, wait).await.is_err() {
                            return Err(Error::Timeout);
                        }
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            self.apply_housekeeping(endpoint_key, &response).await;

            if let Some(outcome) = self.classify(endpoint_key, &response) {
                match outcome {
                    Classification::Terminal(err) => return Err(err),
                    Classification::RetryAfter(wait) => {
                        if idempotent && attempt < MAX_ATTEMPTS {
                            attempt += 1;
                            debug!(attempt, ?wait, "retrying after 429");
                            if self.sleep_or_cancel(&envelope, wait).await.is_err() {
                                return Err(Error::Timeout);
                            }
                            continue;
                        }
                        return Err(Error::RateLimited {
                            reset_at: chrono::Utc::now()
                                + chrono::Duration::from_std(wait).unwrap_or_default(),
                            endpoint: endpoint_key.to_string(),
                        });
                    }
                    Classification::RetryTransient => {
                        if idempotent && attempt < MAX_ATTEMPTS {
                            let wait = backoff.next_backoff().unwrap_or(Duration::from_secs(8));
                            attempt += 1;
                            if self.sleep_or_cancel(&envelope, wait).await.is_err() {
                                return Err(Error::Timeout);
                            }
                            continue;
                        }
                        return Err(Error::Upstream {
                            status: response.status,
                            snippet: response.snippet(256),
                        });
                    }
                }
            }

            if response.status >= 400 {
                return Err(Error::Upstream {
                    status: response.status,
                    snippet: response.snippet(256),
                });
            }

            return Ok(response);
        }
    }

    async fn sleep_or_cancel(&self, envelope: &Envelope, wait: Duration) -> std::result::Result<(), ()> {
        if let Some(token) = &envelope.cancellation {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(()),
                _ = tokio::time::sleep(wait) => Ok(()),
            }
        } else {
            tokio::time::sleep(wait).await;
            Ok(())
        }
    }

    /// Steps 1-3 of per-response housekeeping: always applied, regardless
    /// of whether the response ultimately classifies as an error.
    async fn apply_housekeeping(&self, endpoint_key: &str, response: &RawResponse) {
        {
            let mut jar = self.jar.lock().await;
            for raw in &response.set_cookie {
                jar.apply_set_cookie(raw);
            }
            if let Some(csrf) = jar.csrf_token() {
                self.tokens.set_csrf(Some(csrf.to_string()));
            }
        }
        self.rate_limits.observe(endpoint_key, response);
    }

    /// Steps 4-5 plus the 429/5xx retry classification. Returns `None` for
    /// plain success or for a non-2xx status with no special handling (the
    /// caller turns that into a generic `Upstream` error).
    fn classify(&self, endpoint_key: &str, response: &RawResponse) -> Option<Classification> {
        let twitter_code = twitter_error_code(response);

        if response.status == 401 || twitter_code == Some(89) {
            return Some(Classification::Terminal(Error::AuthRequired));
        }
        if response.status == 403 && twitter_code == Some(326) {
            return Some(Classification::Terminal(Error::AccountLocked));
        }
        if response.status == 403 && twitter_code == Some(64) {
            return Some(Classification::Terminal(Error::AccountSuspended));
        }
        if response.status == 429 {
            let wait = response
                .header("retry-after")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .or_else(|| {
                    response
                        .header("x-rate-limit-reset")
                        .and_then(|v| v.parse::<i64>().ok())
                        .map(|epoch| epoch - chrono::Utc::now().timestamp())
                        .map(|secs| Duration::from_secs(secs.max(0) as u64))
                })
                .unwrap_or(DEFAULT_RETRY_AFTER);
            if wait <= self.config.max_rate_limit_wait {
                return Some(Classification::RetryAfter(wait));
            }
            return Some(Classification::Terminal(Error::RateLimited {
                reset_at: chrono::Utc::now() + chrono::Duration::from_std(wait).unwrap_or_default(),
                endpoint: endpoint_key.to_string(),
            }));
        }
        if matches!(response.status, 500 | 502 | 503 | 504) {
            return Some(Classification::RetryTransient);
        }
        None
    }

    /// Serializes and sends a GraphQL call, surfacing `errors[]` entries as
    /// [`Error::TwitterApi`] when `data` is null.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query_id: &str,
        operation: &str,
        method: GraphqlMethod,
        variables: Value,
        features: Option<Value>,
        authenticated: bool,
    ) -> Result<T> {
        let base = format!("https://api.x.com/graphql/{query_id}/{operation}");
        let (envelope, idempotent) = match method {
            GraphqlMethod::Get => {
                let mut pairs = form_urlencoded::Serializer::new(String::new());
                pairs.append_pair("variables", &variables.to_string());
                if let Some(features) = &features {
                    pairs.append_pair("features", &features.to_string());
                }
                let url = format!("{base}?{}", pairs.finish());
                (Envelope::new(Method::Get, url), true)
            }
            GraphqlMethod::Post => {
                let body = serde_json::json!({
                    "queryId": query_id,
                    "variables": variables,
                    "features": features,
                });
                let envelope = Envelope::new(Method::Post, base)
                    .header("content-type", "application/json")
                    .body(serde_json::to_vec(&body)?);
                (envelope, true)
            }
        };

        let response = self.request(envelope, operation, authenticated, idempotent).await?;
        let body: Value = serde_json::from_slice(&response.body)?;
        parse_graphql_body(body)
    }

    /// Serializes and sends a REST call against `/1.1` or onboarding
    /// endpoints. Mutating methods are never retried.
    pub async fn rest_json<T: DeserializeOwned>(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
        authenticated: bool,
    ) -> Result<T> {
        let url = format!("https://api.x.com{path}");
        let mut envelope = Envelope::new(method, url);
        if let Some(body) = &body {
            envelope = envelope
                .header("content-type", "application/json")
                .body(serde_json::to_vec(body)?);
        }
        let idempotent = matches!(method, Method::Get);
        let response = self.request(envelope, path, authenticated, idempotent).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Sends a pre-encoded body (e.g. a hand-built multipart part) against
    /// a REST path. Used by the chunked media-upload APPEND step, which
    /// carries a binary part `rest_json`'s JSON body can't express. Never
    /// retried: a partially-uploaded chunk must not be silently resent.
    pub async fn rest_raw(
        &self,
        path: &str,
        method: Method,
        content_type: &str,
        body: Vec<u8>,
        authenticated: bool,
    ) -> Result<RawResponse> {
        let url = format!("https://api.x.com{path}");
        let envelope = Envelope::new(method, url).header("content-type", content_type).body(body);
        self.request(envelope, path, authenticated, false).await
    }
}

enum Classification {
    Terminal(Error),
    RetryAfter(Duration),
    RetryTransient,
}

fn twitter_error_code(response: &RawResponse) -> Option<i64> {
    let body: Value = serde_json::from_slice(&response.body).ok()?;
    body.get("errors")?.as_array()?.first()?.get("code")?.as_i64()
}

fn parse_graphql_body<T: DeserializeOwned>(body: Value) -> Result<T> {
    if let Some(errors) = body.get("errors").and_then(|v| v.as_array()) {
        if body.get("data").map(|d| d.is_null()).unwrap_or(true) {
            if let Some(first) = errors.first() {
                let code = first.get("code").and_then(|v| v.as_i64()).unwrap_or(0);
                let kind = first
                    .get("kind")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let message = first
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("graphql error")
                    .to_string();
                return Err(Error::TwitterApi { code, kind, message });
            }
        }
        // `data` is present alongside `errors`: the caller still gets a
        // usable result, so the errors are surfaced as warnings rather
        // than failing the call.
        for e in errors {
            let message = e.get("message").and_then(|v| v.as_str()).unwrap_or("graphql error");
            warn!(message, "partial graphql response carried errors alongside data");
        }
    }
    let data = body.get("data").cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ok_json;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::collections::HashMap;

    /// Replies with a different canned response on each successive call,
    /// holding the last one steady once exhausted.
    struct SequenceTransport {
        responses: Vec<RawResponse>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SequenceTransport {
        async fn send(&self, _envelope: &Envelope) -> Result<RawResponse> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses[i.min(self.responses.len() - 1)].clone())
        }
    }

    fn rate_limited(retry_after: &str) -> RawResponse {
        RawResponse {
            status: 429,
            headers: HashMap::from([("retry-after".to_string(), retry_after.to_string())]),
            body: Vec::new(),
            set_cookie: Vec::new(),
        }
    }

    #[tokio::test]
    async fn retries_once_after_429_then_succeeds() {
        let transport = Arc::new(SequenceTransport {
            responses: vec![rate_limited("0"), ok_json(serde_json::json!({"ok": true}))],
            calls: AtomicUsize::new(0),
        });
        let client = HttpClient::new(transport.clone());
        client.tokens().set_csrf(Some("ct0".to_string()));
        let envelope = Envelope::new(Method::Get, "https://api.x.com/graphql/x/Op");
        let response = client.request(envelope, "Op", true, true).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn partial_data_with_errors_returns_data_not_error() {
        let body = serde_json::json!({
            "data": {"ok": true},
            "errors": [{"code": 1, "kind": "soft", "message": "degraded"}],
        });
        let parsed: serde_json::Value = parse_graphql_body(body).unwrap();
        assert_eq!(parsed, serde_json::json!({"ok": true}));
    }

    #[test]
    fn null_data_with_errors_raises_twitter_api() {
        let body = serde_json::json!({
            "data": null,
            "errors": [{"code": 239, "kind": "hard", "message": "nope"}],
        });
        let err = parse_graphql_body::<serde_json::Value>(body).unwrap_err();
        assert!(matches!(err, Error::TwitterApi { code: 239, .. }));
    }

    #[tokio::test]
    async fn second_429_raises_rate_limited() {
        let transport = Arc::new(SequenceTransport {
            responses: vec![rate_limited("0"), rate_limited("0")],
            calls: AtomicUsize::new(0),
        });
        let client = HttpClient::new(transport);
        client.tokens().set_csrf(Some("ct0".to_string()));
        let envelope = Envelope::new(Method::Get, "https://api.x.com/graphql/x/Op");
        let err = client.request(envelope, "Op", true, true).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn mutation_failure_is_not_retried() {
        let transport = Arc::new(SequenceTransport {
            responses: vec![RawResponse {
                status: 500,
                headers: HashMap::new(),
                body: Vec::new(),
                set_cookie: Vec::new(),
            }],
            calls: AtomicUsize::new(0),
        });
        let client = HttpClient::new(transport.clone());
        client.tokens().set_csrf(Some("ct0".to_string()));
        let envelope = Envelope::new(Method::Post, "https://api.x.com/graphql/x/CreateTweet");
        let err = client
            .request(envelope, "CreateTweet", true, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 500, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
