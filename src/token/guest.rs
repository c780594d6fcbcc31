//! Guest token acquisition and renewal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::{Envelope, Method, Transport};

use super::BEARER_TOKEN;

const ACTIVATE_URL: &str = "https://api.x.com/1.1/guest/activate.json";
const MAX_AGE: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Clone)]
struct Issued {
    value: String,
    issued_at: std::time::Instant,
}

/// Holds the current `x-guest-token`, activating or renewing it under a
/// single-flight lock so concurrent callers never fire duplicate activation
/// requests. Mirrors the lock-before-network discipline used around the
/// scrape stack's shared mutable session state.
pub struct GuestToken {
    state: Mutex<Option<Issued>>,
}

impl GuestToken {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Returns a valid guest token, activating or renewing it first if
    /// absent or older than the max age.
    pub async fn ensure_valid(&self, transport: &Arc<dyn Transport>) -> Result<String> {
        let mut guard = self.state.lock().await;
        if let Some(issued) = guard.as_ref() {
            if issued.issued_at.elapsed() < MAX_AGE {
                return Ok(issued.value.clone());
            }
        }
        let value = self.activate(transport).await?;
        *guard = Some(Issued {
            value: value.clone(),
            issued_at: std::time::Instant::now(),
        });
        Ok(value)
    }

    /// Forces the next `ensure_valid` call to re-activate, used when the
    /// API reports the current token as stale (`AuthRequired` surfaced by
    /// the HTTP client on a 401/403 against a guest-scoped endpoint).
    pub async fn reset(&self) {
        let mut guard = self.state.lock().await;
        *guard = None;
    }

    /// Headers to attach to an unauthenticated request: bearer plus, if
    /// already activated, the current guest token. Does not activate —
    /// callers needing a guaranteed-fresh token should call `ensure_valid`
    /// first.
    pub async fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {BEARER_TOKEN}"));
        headers.insert("x-twitter-active-user".to_string(), "yes".to_string());
        headers.insert("x-twitter-client-language".to_string(), "en".to_string());
        if let Some(issued) = self.state.lock().await.as_ref() {
            headers.insert("x-guest-token".to_string(), issued.value.clone());
        }
        headers
    }

    async fn activate(&self, transport: &Arc<dyn Transport>) -> Result<String> {
        let envelope = Envelope::new(Method::Post, ACTIVATE_URL)
            .header("authorization", format!("Bearer {BEARER_TOKEN}"));

        let response = transport.send(&envelope).await?;
        if response.status == 429 {
            let retry_after = response
                .header("retry-after")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            warn!(retry_after, "guest token activation rate limited, retrying once");
            tokio::time::sleep(Duration::from_secs(retry_after)).await;
            let retry = transport.send(&envelope).await?;
            if retry.status == 429 {
                return Err(Error::RateLimited {
                    reset_at: chrono::Utc::now() + chrono::Duration::seconds(retry_after as i64),
                    endpoint: "guest/activate".to_string(),
                });
            }
            return Self::extract_token(&retry);
        }
        Self::extract_token(&response)
    }

    fn extract_token(response: &crate::transport::RawResponse) -> Result<String> {
        if response.status >= 400 {
            return Err(Error::Network {
                cause: format!("guest activation failed: HTTP {}", response.status),
            });
        }
        let body: serde_json::Value = serde_json::from_slice(&response.body)?;
        let token = body
            .get("guest_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::corrupted("guest/activate response missing guest_token"))?;
        debug!("guest token activated");
        Ok(token.to_string())
    }
}

impl Default for GuestToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Fixture, FixtureTransport};
    use serde_json::json;

    #[tokio::test]
    async fn activates_once_and_caches() {
        let fixture = Arc::new(FixtureTransport::new(vec![Fixture {
            url_contains: "guest/activate".to_string(),
            response: crate::transport::testing::ok_json(json!({ "guest_token": "abc123" })),
        }]));
        let transport: Arc<dyn Transport> = fixture.clone();
        let guest = GuestToken::new();

        let token1 = guest.ensure_valid(&transport).await.unwrap();
        let token2 = guest.ensure_valid(&transport).await.unwrap();
        assert_eq!(token1, "abc123");
        assert_eq!(token2, "abc123");
        assert_eq!(fixture.call_count().await, 1);
    }

    #[tokio::test]
    async fn reset_forces_reactivation() {
        let fixture = Arc::new(FixtureTransport::new(vec![Fixture {
            url_contains: "guest/activate".to_string(),
            response: crate::transport::testing::ok_json(json!({ "guest_token": "abc123" })),
        }]));
        let transport: Arc<dyn Transport> = fixture.clone();
        let guest = GuestToken::new();

        guest.ensure_valid(&transport).await.unwrap();
        guest.reset().await;
        guest.ensure_valid(&transport).await.unwrap();
        assert_eq!(fixture.call_count().await, 2);
    }

    #[tokio::test]
    async fn headers_carry_active_user_and_language_before_and_after_activation() {
        let guest = GuestToken::new();
        let unissued = guest.headers().await;
        assert_eq!(unissued.get("x-twitter-active-user").unwrap(), "yes");
        assert_eq!(unissued.get("x-twitter-client-language").unwrap(), "en");
        assert!(unissued.get("x-guest-token").is_none());

        let fixture = Arc::new(FixtureTransport::new(vec![Fixture {
            url_contains: "guest/activate".to_string(),
            response: crate::transport::testing::ok_json(json!({ "guest_token": "gt1" })),
        }]));
        let transport: Arc<dyn Transport> = fixture;
        guest.ensure_valid(&transport).await.unwrap();
        let issued = guest.headers().await;
        assert_eq!(issued.get("x-guest-token").unwrap(), "gt1");
        assert_eq!(issued.get("x-twitter-active-user").unwrap(), "yes");
        assert_eq!(issued.get("x-twitter-client-language").unwrap(), "en");
    }

    #[tokio::test]
    async fn double_429_surfaces_rate_limited() {
        let fixture = Arc::new(FixtureTransport::new(vec![Fixture {
            url_contains: "guest/activate".to_string(),
            response: crate::transport::RawResponse {
                status: 429,
                headers: HashMap::from([("retry-after".to_string(), "0".to_string())]),
                body: Vec::new(),
                set_cookie: Vec::new(),
            },
        }]));
        let transport: Arc<dyn Transport> = fixture.clone();
        let guest = GuestToken::new();

        let err = guest.ensure_valid(&transport).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
        assert_eq!(fixture.call_count().await, 2);
    }
}
