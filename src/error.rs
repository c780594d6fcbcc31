//! Error taxonomy surfaced to callers of the core.
//!
//! Every terminal error carries a structured variant (for programmatic
//! handling) and a human message via `thiserror`'s `Display` impl.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No credentials or session expired (HTTP 401, Twitter error code 89).
    #[error("authentication required")]
    AuthRequired,

    /// Login credentials were rejected by the server.
    #[error("login failed: {reason}")]
    AuthFailed { reason: String },

    /// The login flow paused on a two-factor challenge; resume with
    /// [`crate::login::CredentialLogin::submit_two_factor`].
    #[error("two-factor authentication required")]
    TwoFactorRequired { flow_token: String },

    /// The login flow paused on an email-verification (`LoginAcid`) subtask.
    /// There is no generic automatic recovery; the caller decides.
    #[error("email verification required")]
    EmailVerificationRequired { flow_token: String },

    /// Twitter error code 326.
    #[error("account is locked")]
    AccountLocked,

    /// Twitter error code 64.
    #[error("account is suspended")]
    AccountSuspended,

    /// Retry policy exhausted or the reset wait exceeded the configured cap.
    #[error("rate limited, resets at {reset_at}")]
    RateLimited {
        reset_at: DateTime<Utc>,
        endpoint: String,
    },

    /// A GraphQL `errors[]` entry accompanied a null `data`.
    #[error("twitter api error {code} ({kind}): {message}")]
    TwitterApi {
        code: i64,
        kind: String,
        message: String,
    },

    /// A targeted lookup resolved to an unavailable/tombstoned result.
    #[error("not found")]
    NotFound,

    /// A non-2xx response with no more specific classification (not a
    /// 401/403/429, and retries — if eligible — are exhausted).
    #[error("upstream error: HTTP {status}: {snippet}")]
    Upstream { status: u16, snippet: String },

    /// Transport failure after retries were exhausted.
    #[error("network error: {cause}")]
    Network { cause: String },

    /// The per-request deadline was exceeded (non-idempotent operation, so
    /// not retried).
    #[error("request timed out")]
    Timeout,

    /// Unparseable Set-Cookie, response body, or session file.
    #[error("corrupted data at {location}")]
    Corrupted { location: String },

    /// Caller-side violation (e.g. empty username).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn network(cause: impl std::fmt::Display) -> Self {
        Error::Network {
            cause: cause.to_string(),
        }
    }

    pub fn corrupted(location: impl Into<String>) -> Self {
        Error::Corrupted {
            location: location.into(),
        }
    }

    /// True for errors recovered internally by the retry policy (never
    /// reached the caller on the final attempt).
    pub fn is_retryable_transport(&self) -> bool {
        matches!(self, Error::Network { .. } | Error::Timeout)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::network(e)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::corrupted(format!("json: {e}"))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidArgument(format!("invalid url: {e}"))
    }
}
