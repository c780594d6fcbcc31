//! High-level façade: wires the Cookie Jar, Token Manager, HTTP Client,
//! Login Manager, and Paginator into the handful of named operations most
//! callers want end to end.

use std::sync::Arc;

use serde_json::json;

use crate::client::{ClientConfig, GraphqlMethod, HttpClient};
use crate::config::SessionOptions;
use crate::endpoints;
use crate::entities::{Profile, Thread, VerifiedAccount};
use crate::error::{Error, Result};
use crate::login::{LoginManager, LoginOutcome};
use crate::media::{self, MediaUploadResult};
use crate::paginator::Paginator;
use crate::transport::{Method, ReqwestTransport, Transport};

pub struct Session {
    client: Arc<HttpClient>,
    login: LoginManager,
}

impl Session {
    /// Builds a session from construction options (env var / session file
    /// / explicit cookies, per [`SessionOptions::resolve`]'s precedence),
    /// using the production `reqwest`-backed transport.
    pub async fn new(options: SessionOptions) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::default());
        Self::with_transport(options, transport).await
    }

    pub async fn with_transport(options: SessionOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        let jar = options.resolve()?;
        let client = Arc::new(HttpClient::with_config(transport, ClientConfig::default()));
        client.replace_jar(jar).await;
        Ok(Self {
            client,
            login: LoginManager::new(),
        })
    }

    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }

    pub async fn is_authenticated(&self) -> bool {
        self.client.jar_snapshot().await.is_authenticated()
    }

    pub async fn login(&self, username: &str, password: &str, email: Option<&str>) -> Result<LoginOutcome> {
        let outcome = self
            .login
            .login(self.client.transport(), self.client.tokens(), username, password, email)
            .await?;
        if let LoginOutcome::Success(jar) = &outcome {
            self.client.replace_jar(jar.clone()).await;
        }
        Ok(outcome)
    }

    pub async fn submit_two_factor(&self, flow_token: &str, code: &str) -> Result<LoginOutcome> {
        let outcome = self
            .login
            .submit_two_factor(self.client.transport(), self.client.tokens(), flow_token, code)
            .await?;
        if let LoginOutcome::Success(jar) = &outcome {
            self.client.replace_jar(jar.clone()).await;
        }
        Ok(outcome)
    }

    /// Looks up a profile by handle. Works unauthenticated (falls back to
    /// the guest token path) or authenticated, whichever the session
    /// currently holds.
    pub async fn scrape_profile(&self, handle: &str) -> Result<Profile> {
        if handle.trim().is_empty() {
            return Err(Error::InvalidArgument("handle must not be empty".to_string()));
        }
        let authenticated = self.is_authenticated().await;
        let descriptor = endpoints::lookup("UserByScreenName")
            .expect("UserByScreenName is a catalog entry");
        let response: serde_json::Value = self
            .client
            .graphql(
                descriptor.query_id,
                descriptor.operation,
                descriptor.default_method,
                json!({ "screen_name": handle, "withSafetyModeUserFields": true }),
                Some(descriptor.features()),
                authenticated,
            )
            .await?;

        let result = response
            .get("user")
            .and_then(|v| v.get("result"))
            .ok_or_else(|| Error::corrupted("UserByScreenName response missing user.result"))?;

        if result.get("__typename").and_then(|v| v.as_str()) == Some("UserUnavailable") {
            return Err(Error::NotFound);
        }

        endpoints::parse_profile(result)
    }

    /// Fetches a tweet's conversation thread: the tweet itself plus its
    /// replies, in server order, alongside the root author. Works
    /// unauthenticated or authenticated, whichever the session currently
    /// holds.
    pub async fn tweet_detail(&self, tweet_id: &str) -> Result<Thread> {
        if tweet_id.trim().is_empty() {
            return Err(Error::InvalidArgument("tweet_id must not be empty".to_string()));
        }
        let authenticated = self.is_authenticated().await;
        let descriptor = endpoints::lookup("TweetDetail").expect("TweetDetail is a catalog entry");
        let response: serde_json::Value = self
            .client
            .graphql(
                descriptor.query_id,
                descriptor.operation,
                descriptor.default_method,
                json!({
                    "focalTweetId": tweet_id,
                    "with_rux_injections": false,
                    "includePromotedContent": false,
                }),
                Some(descriptor.features()),
                authenticated,
            )
            .await?;
        endpoints::decode_thread(&response)
    }

    /// Checks whether the current jar is actually authenticated and
    /// returns who it belongs to.
    pub async fn verify_credentials(&self) -> Result<VerifiedAccount> {
        let response: serde_json::Value = self
            .client
            .rest_json("/1.1/account/verify_credentials.json", Method::Get, None, true)
            .await?;
        let id = response
            .get("id_str")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::corrupted("verify_credentials response missing id_str"))?
            .to_string();
        Ok(VerifiedAccount {
            id,
            screen_name: response.get("screen_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            name: response.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            profile_image_url: response
                .get("profile_image_url_https")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Uploads raw media bytes through the chunked INIT/APPEND/FINALIZE/STATUS
    /// sequence, returning the media id once processing (if any) completes.
    pub async fn upload_media(
        &self,
        bytes: &[u8],
        media_type: &str,
        media_category: Option<&str>,
    ) -> Result<MediaUploadResult> {
        if !self.is_authenticated().await {
            return Err(Error::AuthRequired);
        }
        media::upload(&self.client, bytes, media_type, media_category).await
    }

    /// A lazy paginated sequence of a user's followers, newest first, as
    /// the server orders them.
    pub async fn followers(&self, target_user_id: &str, limit: usize) -> Result<Paginator> {
        let authenticated = self.is_authenticated().await;
        if !authenticated {
            return Err(Error::AuthRequired);
        }
        Paginator::new(
            self.client.clone(),
            "Followers",
            json!({ "userId": target_user_id, "count": 20 }),
            authenticated,
        )
        .map(|p| p.with_max(limit))
    }

    /// A lazy paginated sequence of a user's tweets.
    pub async fn user_tweets(&self, user_id: &str, limit: usize) -> Result<Paginator> {
        let authenticated = self.is_authenticated().await;
        Paginator::new(
            self.client.clone(),
            "UserTweets",
            json!({ "userId": user_id, "count": 20 }),
            authenticated,
        )
        .map(|p| p.with_max(limit))
    }

    /// A lazy paginated sequence over a raw search query.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Paginator> {
        let authenticated = self.is_authenticated().await;
        Paginator::new(
            self.client.clone(),
            "SearchTimeline",
            json!({ "rawQuery": query, "count": 20, "querySource": "typed_query", "product": "Latest" }),
            authenticated,
        )
        .map(|p| p.with_max(limit))
    }

    pub async fn like(&self, tweet_id: &str) -> Result<()> {
        self.mutate("FavoriteTweet", json!({ "tweet_id": tweet_id })).await
    }

    pub async fn unlike(&self, tweet_id: &str) -> Result<()> {
        self.mutate("UnfavoriteTweet", json!({ "tweet_id": tweet_id })).await
    }

    pub async fn follow(&self, user_id: &str) -> Result<()> {
        self.mutate("CreateFriendships", json!({ "user_id": user_id })).await
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<()> {
        self.mutate("DestroyFriendships", json!({ "user_id": user_id })).await
    }

    async fn mutate(&self, operation: &str, variables: serde_json::Value) -> Result<()> {
        let descriptor = endpoints::lookup(operation)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown operation: {operation}")))?;
        if !descriptor.is_mutation {
            return Err(Error::InvalidArgument(format!("{operation} is not a mutation")));
        }
        let _: serde_json::Value = self
            .client
            .graphql(
                descriptor.query_id,
                descriptor.operation,
                GraphqlMethod::Post,
                variables,
                Some(descriptor.features()),
                true,
            )
            .await?;
        Ok(())
    }
}
