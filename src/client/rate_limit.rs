//! Per-endpoint rate-limit bookkeeping extracted from response headers.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, TimeZone, Utc};

use crate::transport::RawResponse;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitRecord {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    fn from_response(response: &RawResponse) -> Self {
        let limit = response.header("x-rate-limit-limit").and_then(|v| v.parse().ok());
        let remaining = response
            .header("x-rate-limit-remaining")
            .and_then(|v| v.parse().ok());
        let reset_at = response
            .header("x-rate-limit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single());
        Self {
            limit,
            remaining,
            reset_at,
        }
    }

    fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset_at.is_none()
    }
}

/// Tracks the most recently observed rate-limit window per endpoint key.
/// Writes are atomic per key: a reader never sees a half-updated record.
#[derive(Default)]
pub struct RateLimitTable {
    records: RwLock<HashMap<String, RateLimitRecord>>,
}

impl RateLimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the record for `endpoint` opportunistically: a response that
    /// carries no rate-limit headers at all leaves the previously observed
    /// record in place rather than clobbering it with an empty one.
    pub fn observe(&self, endpoint: &str, response: &RawResponse) {
        let record = RateLimitRecord::from_response(response);
        if record.is_empty() {
            return;
        }
        self.records.write().unwrap().insert(endpoint.to_string(), record);
    }

    pub fn get(&self, endpoint: &str) -> Option<RateLimitRecord> {
        self.records.read().unwrap().get(endpoint).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: &[(&str, &str)]) -> RawResponse {
        RawResponse {
            status: 200,
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            body: Vec::new(),
            set_cookie: Vec::new(),
        }
    }

    #[test]
    fn headerless_response_does_not_clobber_prior_record() {
        let table = RateLimitTable::new();
        table.observe(
            "UserTweets",
            &response(&[
                ("x-rate-limit-limit", "100"),
                ("x-rate-limit-remaining", "99"),
                ("x-rate-limit-reset", "1700000000"),
            ]),
        );
        table.observe("UserTweets", &response(&[]));

        let record = table.get("UserTweets").unwrap();
        assert_eq!(record.remaining, Some(99));
    }

    #[test]
    fn headered_response_updates_record() {
        let table = RateLimitTable::new();
        table.observe("UserTweets", &response(&[("x-rate-limit-remaining", "50")]));
        assert_eq!(table.get("UserTweets").unwrap().remaining, Some(50));
    }
}
