//! Cursor-driven async sequences layered over the HTTP Client and the
//! response parser.

use std::sync::Arc;

use futures::stream::{try_unfold, BoxStream};
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::{GraphqlMethod, HttpClient};
use crate::endpoints::{self, DecodedPage};
use crate::error::{Error, Result};

#[derive(Clone)]
struct State {
    client: Arc<HttpClient>,
    operation: &'static str,
    method: GraphqlMethod,
    query_id: &'static str,
    features: Value,
    variables: Value,
    authenticated: bool,
    cancellation: Option<CancellationToken>,
    max: Option<usize>,
    prev_bottom: Option<String>,
    consecutive_empty: u8,
    yielded: usize,
    done: bool,
}

/// A lazy, restartable sequence of entities from a cursor-driven endpoint.
pub struct Paginator {
    state: State,
}

impl Paginator {
    pub fn new(
        client: Arc<HttpClient>,
        operation: &str,
        variables: Value,
        authenticated: bool,
    ) -> Result<Self> {
        let descriptor = endpoints::lookup(operation)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown operation: {operation}")))?;
        if descriptor.is_mutation {
            return Err(Error::InvalidArgument(format!(
                "{operation} is a mutation, not a paginated read"
            )));
        }
        Ok(Self {
            state: State {
                client,
                operation: descriptor.operation,
                method: descriptor.default_method,
                query_id: descriptor.query_id,
                features: descriptor.features(),
                variables,
                authenticated,
                cancellation: None,
                max: None,
                prev_bottom: None,
                consecutive_empty: 0,
                yielded: 0,
                done: false,
            },
        })
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.state.max = Some(max);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.state.cancellation = Some(token);
        self
    }

    /// Fetches and decodes the next page, or `None` once a termination
    /// condition is reached. Safe to keep calling after termination (it
    /// just keeps returning `None`).
    pub async fn next_page(&mut self) -> Result<Option<DecodedPage>> {
        match Self::advance(self.state.clone()).await? {
            Some((page, state)) => {
                self.state = state;
                Ok(Some(page))
            }
            None => Ok(None),
        }
    }

    /// Converts into a `futures::Stream`, the idiomatic way to consume a
    /// paginator with `StreamExt` combinators.
    pub fn into_stream(self) -> BoxStream<'static, Result<DecodedPage>> {
        try_unfold(self.state, Self::advance).boxed()
    }

    async fn advance(mut state: State) -> Result<Option<(DecodedPage, State)>> {
        if state.done {
            return Ok(None);
        }
        if let Some(max) = state.max {
            if state.yielded >= max {
                return Ok(None);
            }
        }
        if let Some(token) = &state.cancellation {
            if token.is_cancelled() {
                return Ok(None);
            }
        }

        let response: Value = state
            .client
            .graphql(
                state.query_id,
                state.operation,
                state.method,
                state.variables.clone(),
                Some(state.features.clone()),
                state.authenticated,
            )
            .await?;

        let instructions = endpoints::extract_instructions(&response);
        let page = endpoints::decode_instructions(&instructions);

        let is_empty = page.tweets.is_empty() && page.users.is_empty();
        state.consecutive_empty = if is_empty { state.consecutive_empty + 1 } else { 0 };
        state.yielded += page.tweets.len() + page.users.len();

        let bottom = page.bottom_cursor.as_ref().map(|c| c.value.clone());
        let fixpoint = matches!((&bottom, &state.prev_bottom), (Some(b), Some(p)) if b == p);

        state.done = bottom.is_none() || fixpoint || state.consecutive_empty >= 2;

        if let Some(bottom) = &bottom {
            if let Value::Object(vars) = &mut state.variables {
                vars.insert("cursor".to_string(), Value::String(bottom.clone()));
            }
        }
        state.prev_bottom = bottom;

        Ok(Some((page, state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{ok_json, Fixture, FixtureTransport};
    use crate::transport::Transport;
    use serde_json::json;

    fn page_response(tweet_id: &str, cursor: Option<&str>) -> Value {
        let mut entries = vec![json!({
            "content": {
                "entryType": "TimelineTimelineItem",
                "itemContent": {
                    "itemType": "TimelineTweet",
                    "tweet_results": { "result": {
                        "__typename": "Tweet",
                        "rest_id": tweet_id,
                        "legacy": {
                            "id_str": tweet_id,
                            "user_id_str": "1",
                            "full_text": "t",
                            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                        }
                    }},
                }
            }
        })];
        if let Some(cursor) = cursor {
            entries.push(json!({
                "content": {
                    "entryType": "TimelineTimelineCursor",
                    "value": cursor,
                    "cursorType": "Bottom",
                }
            }));
        }
        json!({ "data": { "instructions": [{ "type": "TimelineAddEntries", "entries": entries }] } })
    }

    #[tokio::test]
    async fn stops_when_cursor_absent() {
        let fixture = Arc::new(FixtureTransport::new(vec![Fixture {
            url_contains: "UserTweets".to_string(),
            response: ok_json(page_response("1", None)),
        }]));
        let transport: Arc<dyn Transport> = fixture;
        let client = Arc::new(HttpClient::new(transport));
        let paginator = Paginator::new(client, "UserTweets", json!({"userId": "1"}), false).unwrap();
        let mut stream = paginator.into_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.tweets.len(), 1);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn respects_max() {
        let fixture = Arc::new(FixtureTransport::new(vec![Fixture {
            url_contains: "UserTweets".to_string(),
            response: ok_json(page_response("1", Some("next"))),
        }]));
        let transport: Arc<dyn Transport> = fixture;
        let client = Arc::new(HttpClient::new(transport));
        let paginator = Paginator::new(client, "UserTweets", json!({"userId": "1"}), false)
            .unwrap()
            .with_max(1);
        let mut stream = paginator.into_stream();
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }
}
