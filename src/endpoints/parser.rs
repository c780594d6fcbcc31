//! Decodes the polymorphic timeline-instruction response format into
//! typed entities.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::entities::{
    Cursor, CursorPosition, HashtagEntity, Media, MediaType, MentionEntity, Profile, Thread, Tweet,
    TweetEntities, UrlEntity, UserSummary, VerifiedType,
};
use crate::error::{Error, Result};

const LEGACY_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// One decoded timeline instruction. `Unknown` captures anything the
/// catalog of known `type` tags doesn't recognize so that a newly shipped
/// instruction kind degrades to "ignored" rather than an error.
#[derive(Debug, Clone)]
pub enum Instruction {
    AddEntries(Vec<Entry>),
    AddToModule(Vec<Entry>),
    PinEntry(Vec<Entry>),
    ReplaceEntry { entry_id: String, entries: Vec<Entry> },
    ClearCache,
    TerminateTimeline,
    Unknown(String, Value),
}

#[derive(Debug, Clone)]
pub enum Entry {
    Tweet(Box<Tweet>),
    User(Box<UserSummary>),
    Cursor(Cursor),
    Unavailable,
}

/// Tally of entries skipped because the server marked them tombstoned or
/// unavailable, returned alongside decoded entities so callers can tell
/// "empty because filtered" from "empty because the account has nothing".
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeTally {
    pub unavailable: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedPage {
    pub tweets: Vec<Tweet>,
    pub users: Vec<UserSummary>,
    pub top_cursor: Option<Cursor>,
    pub bottom_cursor: Option<Cursor>,
    pub tally: DecodeTally,
}

/// Walks the response for the first `instructions` array, regardless of
/// which container (`user`, `search_by_raw_query`, `bookmark_timeline_v2`,
/// `threaded_conversation_with_injections_v2`, ...) the operation nests it
/// under. Endpoints vary this nesting by operation; searching rather than
/// hard-coding one path per operation keeps callers decoupled from catalog
/// growth.
pub fn extract_instructions(data: &Value) -> Vec<Value> {
    if let Some(instructions) = data.get("instructions").and_then(|v| v.as_array()) {
        return instructions.clone();
    }
    match data {
        Value::Object(map) => map.values().flat_map(extract_instructions).collect(),
        Value::Array(items) => items.iter().flat_map(extract_instructions).collect(),
        _ => Vec::new(),
    }
}

/// Walks `data → <container> → timeline → instructions[]` for any of the
/// response shapes the catalog's read operations produce (`user`,
/// `search_by_raw_query`, `bookmark_timeline_v2`, ...). Callers pass the
/// already-extracted `instructions` array.
pub fn decode_instructions(instructions: &[Value]) -> DecodedPage {
    let mut page = DecodedPage::default();
    for raw in instructions {
        match decode_instruction(raw) {
            Instruction::AddEntries(entries)
            | Instruction::AddToModule(entries)
            | Instruction::PinEntry(entries) => {
                apply_entries(&mut page, entries);
            }
            Instruction::ReplaceEntry { entries, .. } => apply_entries(&mut page, entries),
            Instruction::ClearCache | Instruction::TerminateTimeline => {}
            Instruction::Unknown(tag, _) => {
                warn!(tag, "ignoring unrecognized timeline instruction");
            }
        }
    }
    page
}

fn apply_entries(page: &mut DecodedPage, entries: Vec<Entry>) {
    for entry in entries {
        match entry {
            Entry::Tweet(tweet) => page.tweets.push(*tweet),
            Entry::User(user) => page.users.push(*user),
            Entry::Cursor(cursor) => match cursor.position {
                CursorPosition::Top => page.top_cursor = Some(cursor),
                CursorPosition::Bottom => page.bottom_cursor = Some(cursor),
            },
            Entry::Unavailable => page.tally.unavailable += 1,
        }
    }
}

fn decode_instruction(raw: &Value) -> Instruction {
    let tag = raw.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match tag {
        "TimelineAddEntries" => {
            let entries = raw
                .get("entries")
                .and_then(|v| v.as_array())
                .map(|entries| entries.iter().flat_map(decode_entry).collect())
                .unwrap_or_default();
            Instruction::AddEntries(entries)
        }
        "TimelineAddToModule" => {
            let entries = raw
                .get("moduleItems")
                .and_then(|v| v.as_array())
                .map(|items| items.iter().filter_map(decode_module_item).collect())
                .unwrap_or_default();
            Instruction::AddToModule(entries)
        }
        "TimelinePinEntry" => {
            let entries = raw.get("entry").map(decode_entry).unwrap_or_default();
            if entries.is_empty() {
                Instruction::Unknown(tag.to_string(), raw.clone())
            } else {
                Instruction::PinEntry(entries)
            }
        }
        "TimelineReplaceEntry" => {
            let entry_id = raw
                .get("entry_id_to_replace")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let entries = raw.get("entry").map(decode_entry).unwrap_or_default();
            if entries.is_empty() {
                Instruction::Unknown(tag.to_string(), raw.clone())
            } else {
                Instruction::ReplaceEntry { entry_id, entries }
            }
        }
        "TimelineClearCache" => Instruction::ClearCache,
        "TimelineTerminateTimeline" => Instruction::TerminateTimeline,
        _ => Instruction::Unknown(tag.to_string(), raw.clone()),
    }
}

/// Decodes one timeline entry into zero or more entities. Most entry types
/// yield exactly one; `TimelineTimelineModule` recurses into every item in
/// `items[]`, since a module (conversation thread, who-to-follow) can carry
/// several entities under a single entry id regardless of which instruction
/// carried it here.
fn decode_entry(entry: &Value) -> Vec<Entry> {
    let Some(content) = entry.get("content") else {
        return Vec::new();
    };
    let entry_type = content.get("entryType").and_then(|v| v.as_str()).unwrap_or("");
    match entry_type {
        "TimelineTimelineItem" => content
            .get("itemContent")
            .and_then(decode_item_content)
            .into_iter()
            .collect(),
        "TimelineTimelineModule" => content
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(decode_module_item).collect())
            .unwrap_or_default(),
        "TimelineTimelineCursor" => decode_cursor(content).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn decode_module_item(item: &Value) -> Option<Entry> {
    let item_content = item.get("item")?.get("itemContent")?;
    decode_item_content(item_content)
}

fn decode_item_content(item_content: &Value) -> Option<Entry> {
    let item_type = item_content.get("itemType").and_then(|v| v.as_str()).unwrap_or("");
    match item_type {
        "TimelineTweet" => {
            let result = item_content.get("tweet_results")?.get("result")?;
            decode_tweet_result(result, 1)
        }
        "TimelineUser" => {
            let result = item_content.get("user_results")?.get("result")?;
            decode_user_result(result)
        }
        "TimelineTimelineCursor" => decode_cursor(item_content),
        _ => None,
    }
}

fn decode_cursor(value: &Value) -> Option<Entry> {
    let cursor_value = value.get("value").and_then(|v| v.as_str())?.to_string();
    let position = match value.get("cursorType").and_then(|v| v.as_str()) {
        Some("Top") => CursorPosition::Top,
        _ => CursorPosition::Bottom,
    };
    Some(Entry::Cursor(Cursor {
        value: cursor_value,
        position,
    }))
}

/// Unwraps `Tweet` / `TweetWithVisibilityResults` / tombstone /
/// unavailable, then parses. `depth` guards the recursive
/// retweet/quote embedding to one level.
fn decode_tweet_result(result: &Value, depth: u8) -> Option<Entry> {
    let typename = result.get("__typename").and_then(|v| v.as_str()).unwrap_or("");
    match typename {
        "Tweet" => parse_tweet(result, depth).map(|t| Entry::Tweet(Box::new(t))),
        "TweetWithVisibilityResults" => {
            let inner = result.get("tweet")?;
            decode_tweet_result(inner, depth)
        }
        "TweetTombstone" | "TweetUnavailable" => Some(Entry::Unavailable),
        _ => None,
    }
}

fn decode_user_result(result: &Value) -> Option<Entry> {
    let typename = result.get("__typename").and_then(|v| v.as_str()).unwrap_or("");
    match typename {
        "User" => parse_user_summary(result).map(|u| Entry::User(Box::new(u))),
        "UserUnavailable" => Some(Entry::Unavailable),
        _ => None,
    }
}

fn parse_legacy_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, LEGACY_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_entities(legacy: &Value) -> TweetEntities {
    let entities = legacy.get("entities");
    let urls = entities
        .and_then(|v| v.get("urls"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|u| {
                    Some(UrlEntity {
                        url: u.get("url")?.as_str()?.to_string(),
                        expanded_url: u.get("expanded_url")?.as_str()?.to_string(),
                        display_url: u.get("display_url")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let hashtags = entities
        .and_then(|v| v.get("hashtags"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|h| {
                    Some(HashtagEntity {
                        tag: h.get("text")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let mentions = entities
        .and_then(|v| v.get("user_mentions"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|m| {
                    Some(MentionEntity {
                        user_id: m.get("id_str")?.as_str()?.to_string(),
                        handle: m.get("screen_name")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    TweetEntities {
        urls,
        hashtags,
        mentions,
    }
}

fn parse_media(legacy: &Value) -> Vec<Media> {
    let source = legacy
        .get("extended_entities")
        .and_then(|v| v.get("media"))
        .or_else(|| legacy.get("entities").and_then(|v| v.get("media")))
        .and_then(|v| v.as_array());

    let Some(items) = source else {
        return Vec::new();
    };

    items.iter().filter_map(parse_one_media).collect()
}

fn parse_one_media(item: &Value) -> Option<Media> {
    let media_key = item.get("media_key")?.as_str()?.to_string();
    let kind = item.get("type").and_then(|v| v.as_str()).unwrap_or("photo");
    let media_type = match kind {
        "video" => MediaType::Video,
        "animated_gif" => MediaType::AnimatedGif,
        _ => MediaType::Photo,
    };

    let (width, height) = item
        .get("original_info")
        .map(|info| {
            (
                info.get("width").and_then(|v| v.as_u64()).map(|w| w as u32),
                info.get("height").and_then(|v| v.as_u64()).map(|h| h as u32),
            )
        })
        .unwrap_or((None, None));

    match media_type {
        MediaType::Photo => Some(Media {
            media_key,
            media_type,
            url: item.get("media_url_https")?.as_str()?.to_string(),
            width,
            height,
            bitrate: None,
            duration_ms: None,
        }),
        MediaType::Video | MediaType::AnimatedGif => {
            let variants = item
                .get("video_info")
                .and_then(|v| v.get("variants"))
                .and_then(|v| v.as_array());
            let best = variants.and_then(|variants| {
                variants
                    .iter()
                    .filter(|v| v.get("content_type").and_then(|v| v.as_str()) == Some("video/mp4"))
                    .max_by_key(|v| v.get("bitrate").and_then(|v| v.as_u64()).unwrap_or(0))
            });
            let url = best
                .and_then(|v| v.get("url"))
                .and_then(|v| v.as_str())
                .or_else(|| item.get("media_url_https").and_then(|v| v.as_str()))?
                .to_string();
            let bitrate = best.and_then(|v| v.get("bitrate")).and_then(|v| v.as_u64());
            let duration_ms = item
                .get("video_info")
                .and_then(|v| v.get("duration_millis"))
                .and_then(|v| v.as_u64());
            Some(Media {
                media_key,
                media_type,
                url,
                width,
                height,
                bitrate,
                duration_ms,
            })
        }
    }
}

fn parse_tweet(result: &Value, depth: u8) -> Option<Tweet> {
    let legacy = match result.get("legacy") {
        Some(legacy) => legacy,
        None => {
            warn!("tweet result missing legacy block, skipping");
            return None;
        }
    };

    let id = result
        .get("rest_id")
        .and_then(|v| v.as_str())
        .or_else(|| legacy.get("id_str").and_then(|v| v.as_str()))?
        .to_string();

    let author_id = legacy.get("user_id_str").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let text = legacy
        .get("full_text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let created_at = legacy
        .get("created_at")
        .and_then(|v| v.as_str())
        .and_then(parse_legacy_date)
        .unwrap_or_else(Utc::now);

    let reply_count = legacy.get("reply_count").and_then(|v| v.as_u64()).unwrap_or(0);
    let retweet_count = legacy.get("retweet_count").and_then(|v| v.as_u64()).unwrap_or(0);
    let like_count = legacy.get("favorite_count").and_then(|v| v.as_u64()).unwrap_or(0);
    let quote_count = legacy.get("quote_count").and_then(|v| v.as_u64()).unwrap_or(0);
    let view_count = result
        .get("views")
        .and_then(|v| v.get("count"))
        .and_then(|v| v.as_str())
        .and_then(|v| v.parse::<u64>().ok());

    let is_reply = legacy.get("in_reply_to_status_id_str").is_some();
    let reply_to_id = legacy
        .get("in_reply_to_status_id_str")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let (is_retweet, retweeted_tweet) = if depth == 0 {
        (legacy.get("retweeted_status_result").is_some(), None)
    } else if let Some(inner) = legacy.get("retweeted_status_result").and_then(|v| v.get("result")) {
        match decode_tweet_result(inner, depth - 1) {
            Some(Entry::Tweet(tweet)) => (true, Some(tweet)),
            _ => (true, None),
        }
    } else {
        (false, None)
    };

    let quoted_tweet = if depth == 0 {
        None
    } else if let Some(inner) = result.get("quoted_status_result").and_then(|v| v.get("result")) {
        match decode_tweet_result(inner, depth - 1) {
            Some(Entry::Tweet(tweet)) => Some(tweet),
            _ => None,
        }
    } else {
        None
    };

    Some(Tweet {
        id,
        author_id,
        text,
        created_at,
        reply_count,
        retweet_count,
        like_count,
        quote_count,
        view_count,
        media: parse_media(legacy),
        entities: parse_entities(legacy),
        is_retweet,
        is_reply,
        reply_to_id,
        retweeted_tweet,
        quoted_tweet,
    })
}

fn parse_user_summary(result: &Value) -> Option<UserSummary> {
    let legacy = match result.get("legacy") {
        Some(legacy) => legacy,
        None => {
            warn!("user result missing legacy block, skipping");
            return None;
        }
    };
    let id = result.get("rest_id").and_then(|v| v.as_str())?.to_string();
    Some(UserSummary {
        id,
        handle: legacy.get("screen_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        display_name: legacy.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        bio: legacy.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        follower_count: legacy.get("followers_count").and_then(|v| v.as_u64()).unwrap_or(0),
        verified: legacy.get("verified").and_then(|v| v.as_bool()).unwrap_or(false),
        follows_you: legacy.get("followed_by").and_then(|v| v.as_bool()).unwrap_or(false),
        followed_by_you: legacy.get("following").and_then(|v| v.as_bool()).unwrap_or(false),
    })
}

/// Parses a full `UserResults.result` into a [`Profile`] (the richer
/// entity returned by profile-lookup operations, as opposed to the
/// lighter [`UserSummary`] embedded in list/follower entries).
pub fn parse_profile(result: &Value) -> Result<Profile> {
    let legacy = result
        .get("legacy")
        .ok_or_else(|| Error::corrupted("profile response missing legacy block"))?;
    let id = result
        .get("rest_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::corrupted("profile response missing rest_id"))?
        .to_string();

    let verified_type = match result.get("verified_type").and_then(|v| v.as_str()) {
        Some("Business") => VerifiedType::Business,
        Some("Government") => VerifiedType::Government,
        _ if legacy.get("verified").and_then(|v| v.as_bool()).unwrap_or(false) => VerifiedType::Blue,
        _ => VerifiedType::None,
    };

    let created_at = legacy
        .get("created_at")
        .and_then(|v| v.as_str())
        .and_then(parse_legacy_date)
        .unwrap_or_else(Utc::now);

    Ok(Profile {
        id,
        handle: legacy.get("screen_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        display_name: legacy.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        bio: legacy.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        follower_count: legacy.get("followers_count").and_then(|v| v.as_u64()).unwrap_or(0),
        following_count: legacy.get("friends_count").and_then(|v| v.as_u64()).unwrap_or(0),
        tweet_count: legacy.get("statuses_count").and_then(|v| v.as_u64()).unwrap_or(0),
        verified: matches!(verified_type, VerifiedType::Blue | VerifiedType::Business | VerifiedType::Government),
        blue_verified: result.get("is_blue_verified").and_then(|v| v.as_bool()).unwrap_or(false),
        protected: legacy.get("protected").and_then(|v| v.as_bool()).unwrap_or(false),
        created_at,
        pinned_tweet_id: legacy
            .get("pinned_tweet_ids_str")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    })
}

/// Decodes a `TweetDetail` response into a [`Thread`]: the conversation's
/// tweets in server order plus the root tweet's author. The root author is
/// read directly off the first `TimelineTweet` entry's `core.user_results`
/// rather than `DecodedPage.users`, since thread responses don't otherwise
/// surface standalone user entries.
pub fn decode_thread(response: &Value) -> Result<Thread> {
    let instructions = extract_instructions(response);
    let page = decode_instructions(&instructions);
    if page.tweets.is_empty() {
        return Err(Error::NotFound);
    }
    let author = find_focal_author(&instructions)
        .or_else(|| page.users.first().cloned())
        .unwrap_or_else(|| UserSummary {
            id: page.tweets[0].author_id.clone(),
            handle: String::new(),
            display_name: String::new(),
            bio: String::new(),
            follower_count: 0,
            verified: false,
            follows_you: false,
            followed_by_you: false,
        });
    let total_count = page.tweets.len();
    Ok(Thread {
        author,
        tweets: page.tweets,
        total_count,
    })
}

fn find_focal_author(instructions: &[Value]) -> Option<UserSummary> {
    instructions.iter().find_map(|instruction| {
        instruction
            .get("entries")
            .and_then(|v| v.as_array())
            .and_then(|entries| entries.iter().find_map(extract_tweet_author))
    })
}

fn extract_tweet_author(entry: &Value) -> Option<UserSummary> {
    let item_content = entry.get("content")?.get("itemContent")?;
    let result = item_content.get("tweet_results")?.get("result")?;
    let result = match result.get("__typename").and_then(|v| v.as_str()) {
        Some("TweetWithVisibilityResults") => result.get("tweet")?,
        _ => result,
    };
    let user_result = result.get("core")?.get("user_results")?.get("result")?;
    parse_user_summary(user_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tweet_result(id: &str) -> Value {
        json!({
            "__typename": "Tweet",
            "rest_id": id,
            "legacy": {
                "id_str": id,
                "user_id_str": "999",
                "full_text": "hello world",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "reply_count": 1,
                "retweet_count": 2,
                "favorite_count": 3,
                "quote_count": 4,
            }
        })
    }

    #[test]
    fn decodes_add_entries_with_tweet_and_cursor() {
        let instructions = vec![json!({
            "type": "TimelineAddEntries",
            "entries": [
                {
                    "content": {
                        "entryType": "TimelineTimelineItem",
                        "itemContent": {
                            "itemType": "TimelineTweet",
                            "tweet_results": { "result": sample_tweet_result("1") },
                        }
                    }
                },
                {
                    "content": {
                        "entryType": "TimelineTimelineCursor",
                        "value": "CURSOR-BOTTOM",
                        "cursorType": "Bottom",
                    }
                },
            ]
        })];

        let page = decode_instructions(&instructions);
        assert_eq!(page.tweets.len(), 1);
        assert_eq!(page.tweets[0].text, "hello world");
        assert_eq!(page.bottom_cursor.unwrap().value, "CURSOR-BOTTOM");
    }

    #[test]
    fn tombstoned_tweet_counts_as_unavailable() {
        let instructions = vec![json!({
            "type": "TimelineAddEntries",
            "entries": [{
                "content": {
                    "entryType": "TimelineTimelineItem",
                    "itemContent": {
                        "itemType": "TimelineTweet",
                        "tweet_results": { "result": { "__typename": "TweetTombstone" } },
                    }
                }
            }]
        })];

        let page = decode_instructions(&instructions);
        assert!(page.tweets.is_empty());
        assert_eq!(page.tally.unavailable, 1);
    }

    #[test]
    fn unknown_instruction_type_is_ignored_not_fatal() {
        let instructions = vec![json!({ "type": "TimelineShowAlert", "alert": {} })];
        let page = decode_instructions(&instructions);
        assert!(page.tweets.is_empty());
        assert!(page.users.is_empty());
    }

    #[test]
    fn retweet_embeds_inner_tweet_once() {
        let mut outer = sample_tweet_result("2");
        outer["legacy"]["retweeted_status_result"] = json!({ "result": sample_tweet_result("1") });

        let tweet = parse_tweet(&outer, 1).unwrap();
        assert!(tweet.is_retweet);
        assert_eq!(tweet.retweeted_tweet.unwrap().id, "1");
    }

    #[test]
    fn legacy_date_format_parses() {
        let parsed = parse_legacy_date("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2018-10-10T20:19:24+00:00");
    }

    #[test]
    fn missing_legacy_block_skips_with_none() {
        let result = json!({ "__typename": "Tweet", "rest_id": "5" });
        assert!(parse_tweet(&result, 1).is_none());
    }

    #[test]
    fn module_entry_decodes_every_item_not_just_the_first() {
        let instructions = vec![json!({
            "type": "TimelineAddEntries",
            "entries": [{
                "content": {
                    "entryType": "TimelineTimelineModule",
                    "items": [
                        { "item": { "itemContent": { "itemType": "TimelineTweet", "tweet_results": { "result": sample_tweet_result("1") } } } },
                        { "item": { "itemContent": { "itemType": "TimelineTweet", "tweet_results": { "result": sample_tweet_result("2") } } } },
                    ]
                }
            }]
        })];

        let page = decode_instructions(&instructions);
        assert_eq!(page.tweets.len(), 2);
        assert_eq!(page.tweets[0].id, "1");
        assert_eq!(page.tweets[1].id, "2");
    }

    fn sample_tweet_result_with_author(id: &str, author_id: &str) -> Value {
        let mut result = sample_tweet_result(id);
        result["core"] = json!({
            "user_results": {
                "result": {
                    "__typename": "User",
                    "rest_id": author_id,
                    "legacy": { "screen_name": "root_author", "name": "Root Author" },
                }
            }
        });
        result
    }

    #[test]
    fn decode_thread_collects_tweets_and_focal_author() {
        let response = json!({
            "data": {
                "threaded_conversation_with_injections_v2": {
                    "instructions": [{
                        "type": "TimelineAddEntries",
                        "entries": [
                            {
                                "content": {
                                    "entryType": "TimelineTimelineItem",
                                    "itemContent": {
                                        "itemType": "TimelineTweet",
                                        "tweet_results": { "result": sample_tweet_result_with_author("1", "999") },
                                    }
                                }
                            },
                            {
                                "content": {
                                    "entryType": "TimelineTimelineItem",
                                    "itemContent": {
                                        "itemType": "TimelineTweet",
                                        "tweet_results": { "result": sample_tweet_result("2") },
                                    }
                                }
                            },
                        ]
                    }]
                }
            }
        });

        let thread = decode_thread(&response).unwrap();
        assert_eq!(thread.tweets.len(), 2);
        assert_eq!(thread.total_count, 2);
        assert_eq!(thread.author.handle, "root_author");
    }

    #[test]
    fn decode_thread_errors_when_no_tweets_present() {
        let response = json!({ "data": { "threaded_conversation_with_injections_v2": { "instructions": [] } } });
        assert!(matches!(decode_thread(&response), Err(Error::NotFound)));
    }
}
