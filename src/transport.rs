//! Transport capability — the "runtime-exposed fetch injection" from the
//! source is replaced with a small trait: production binds the platform
//! HTTP client, tests bind a recorded-fixture implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub cancellation: Option<CancellationToken>,
    pub timeout: Option<Duration>,
}

impl Envelope {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            cancellation: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        for (k, v) in headers {
            self.headers.insert(k, v);
        }
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// A request is idempotent if the method is GET, or it is a POST that
    /// is explicitly marked as a read-only GraphQL operation by the caller
    /// constructing it (mutations build their envelopes without calling
    /// this).
    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Every observed `Set-Cookie` header value, in order, unsplit (comma
    /// coalescing is the cookie module's job).
    pub set_cookie: Vec<String>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.clone()).map_err(|e| Error::corrupted(format!("body not utf-8: {e}")))
    }

    pub fn snippet(&self, max_len: usize) -> String {
        let text = self.text().unwrap_or_default();
        if text.len() > max_len {
            format!("{}...", &text[..max_len])
        } else {
            text
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<RawResponse>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self::new(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, envelope: &Envelope) -> Result<RawResponse> {
        let mut builder = match envelope.method {
            Method::Get => self.client.get(&envelope.url),
            Method::Post => self.client.post(&envelope.url),
        };
        for (k, v) in &envelope.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = &envelope.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = envelope.timeout {
            builder = builder.timeout(timeout);
        }

        let send_fut = builder.send();
        let response = if let Some(token) = &envelope.cancellation {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::Timeout),
                res = send_fut => res?,
            }
        } else {
            send_fut.await?
        };

        let status = response.status().as_u16();
        let set_cookie = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
            .collect();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body = if let Some(token) = &envelope.cancellation {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::Timeout),
                res = response.bytes() => res?.to_vec(),
            }
        } else {
            response.bytes().await?.to_vec()
        };

        Ok(RawResponse {
            status,
            headers,
            body,
            set_cookie,
        })
    }
}

/// Recorded-fixture transport for tests: matches requests by URL substring
/// (checked in registration order) and replays the first matching canned
/// response.
pub mod testing {
    use super::*;
    use tokio::sync::Mutex;

    pub struct Fixture {
        pub url_contains: String,
        pub response: RawResponse,
    }

    pub struct FixtureTransport {
        fixtures: Mutex<Vec<Fixture>>,
        calls: Mutex<Vec<Envelope>>,
    }

    impl FixtureTransport {
        pub fn new(fixtures: Vec<Fixture>) -> Self {
            Self {
                fixtures: Mutex::new(fixtures),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }

        pub async fn calls(&self) -> Vec<Envelope> {
            self.calls.lock().await.clone()
        }

        /// Append a fixture to be matched after all currently-registered ones.
        pub async fn push(&self, fixture: Fixture) {
            self.fixtures.lock().await.push(fixture);
        }
    }

    pub fn ok_json(body: serde_json::Value) -> RawResponse {
        RawResponse {
            status: 200,
            headers: HashMap::new(),
            body: serde_json::to_vec(&body).unwrap(),
            set_cookie: Vec::new(),
        }
    }

    #[async_trait]
    impl Transport for FixtureTransport {
        async fn send(&self, envelope: &Envelope) -> Result<RawResponse> {
            self.calls.lock().await.push(envelope.clone());
            let fixtures = self.fixtures.lock().await;
            for fixture in fixtures.iter() {
                if envelope.url.contains(&fixture.url_contains) {
                    return Ok(fixture.response.clone());
                }
            }
            Err(Error::network(format!(
                "no fixture registered for url: {}",
                envelope.url
            )))
        }
    }
}
