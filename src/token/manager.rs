//! Composes bearer/guest/CSRF headers for a single request, choosing the
//! guest or authenticated path based on what the caller asks for.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::transport::Transport;

use super::GuestToken;

/// Owns the guest-token lifecycle and the current CSRF (`ct0`) value. One
/// instance per session.
pub struct TokenManager {
    guest: GuestToken,
    csrf: RwLock<Option<String>>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self {
            guest: GuestToken::new(),
            csrf: RwLock::new(None),
        }
    }

    /// Sets (or clears, with `None`) the current CSRF token, read back from
    /// the `ct0` cookie after a successful login or session load.
    pub fn set_csrf(&self, token: Option<String>) {
        *self.csrf.write().unwrap() = token;
    }

    pub fn csrf(&self) -> Option<String> {
        self.csrf.read().unwrap().clone()
    }

    /// Forces the next unauthenticated request to re-activate a guest
    /// token.
    pub async fn reset_guest(&self) {
        self.guest.reset().await;
    }

    /// Builds the header set for a request. When `authenticated` is true,
    /// a CSRF token must already be set — there is no implicit guest
    /// fallback for authenticated calls, since sending one would silently
    /// downgrade the request to an anonymous view.
    pub async fn headers(
        &self,
        authenticated: bool,
        transport: &Arc<dyn Transport>,
    ) -> Result<HashMap<String, String>> {
        if authenticated {
            let csrf = self.csrf().ok_or(Error::AuthRequired)?;
            let mut headers = HashMap::new();
            headers.insert("authorization".to_string(), format!("Bearer {}", super::BEARER_TOKEN));
            headers.insert("x-csrf-token".to_string(), csrf);
            headers.insert("x-twitter-auth-type".to_string(), "OAuth2Session".to_string());
            headers.insert("x-twitter-active-user".to_string(), "yes".to_string());
            headers.insert("x-twitter-client-language".to_string(), "en".to_string());
            headers.insert("content-type".to_string(), "application/json".to_string());
            Ok(headers)
        } else {
            self.guest.ensure_valid(transport).await?;
            Ok(self.guest.headers().await)
        }
    }
}

impl Default for TokenManager {
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
    async fn authenticated_without_csrf_fails_fast() {
        let transport: Arc<dyn Transport> = Arc::new(FixtureTransport::new(vec![]));
        let manager = TokenManager::new();
        let err = manager.headers(true, &transport).await.unwrap_err();
        assert!(matches!(err, Error::AuthRequired));
    }

    #[tokio::test]
    async fn authenticated_with_csrf_succeeds() {
        let transport: Arc<dyn Transport> = Arc::new(FixtureTransport::new(vec![]));
        let manager = TokenManager::new();
        manager.set_csrf(Some("ct0value".to_string()));
        let headers = manager.headers(true, &transport).await.unwrap();
        assert_eq!(headers.get("x-csrf-token").unwrap(), "ct0value");
        assert_eq!(headers.get("x-twitter-auth-type").unwrap(), "OAuth2Session");
        assert_eq!(headers.get("x-twitter-active-user").unwrap(), "yes");
        assert_eq!(headers.get("x-twitter-client-language").unwrap(), "en");
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn unauthenticated_activates_guest_token() {
        let fixture = Arc::new(FixtureTransport::new(vec![Fixture {
            url_contains: "guest/activate".to_string(),
            response: crate::transport::testing::ok_json(json!({ "guest_token": "gt1" })),
        }]));
        let transport: Arc<dyn Transport> = fixture;
        let manager = TokenManager::new();
        let headers = manager.headers(false, &transport).await.unwrap();
        assert_eq!(headers.get("x-guest-token").unwrap(), "gt1");
        assert_eq!(headers.get("x-twitter-active-user").unwrap(), "yes");
        assert_eq!(headers.get("x-twitter-client-language").unwrap(), "en");
    }
}
