//! Domain output types: the entities the core hands back to callers after
//! decoding a timeline-instruction response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorPosition {
    Top,
    Bottom,
}

/// An opaque pagination pointer. Only valid against the endpoint that
/// produced it — mixing cursors across endpoints is undefined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub value: String,
    pub position: CursorPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Photo,
    Video,
    AnimatedGif,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub media_key: String,
    pub media_type: MediaType,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Populated for `Video`/`AnimatedGif` when bitrate info was present.
    pub bitrate: Option<u64>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlEntity {
    pub url: String,
    pub expanded_url: String,
    pub display_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagEntity {
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionEntity {
    pub user_id: String,
    pub handle: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TweetEntities {
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
    #[serde(default)]
    pub hashtags: Vec<HashtagEntity>,
    #[serde(default)]
    pub mentions: Vec<MentionEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub like_count: u64,
    pub quote_count: u64,
    pub view_count: Option<u64>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub entities: TweetEntities,
    pub is_retweet: bool,
    pub is_reply: bool,
    pub reply_to_id: Option<String>,
    /// Embedded once (depth 1) — an inner tweet is never itself expanded.
    pub retweeted_tweet: Option<Box<Tweet>>,
    pub quoted_tweet: Option<Box<Tweet>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifiedType {
    None,
    Blue,
    Business,
    Government,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub bio: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub tweet_count: u64,
    pub verified: bool,
    pub blue_verified: bool,
    pub protected: bool,
    pub created_at: DateTime<Utc>,
    pub pinned_tweet_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub bio: String,
    pub follower_count: u64,
    pub verified: bool,
    pub follows_you: bool,
    pub followed_by_you: bool,
}

/// `GET /1.1/account/verify_credentials.json` — the cheapest way to check
/// whether the current jar is actually authenticated and who it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedAccount {
    pub id: String,
    pub screen_name: String,
    pub name: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub author: UserSummary,
    pub tweets: Vec<Tweet>,
    pub total_count: usize,
}
