//! Compile-time registry of supported GraphQL operations.
//!
//! Query ids and feature-flag sets are pinned snapshots of the live web
//! client's own catalog. They drift whenever Twitter ships a new build;
//! re-dump them from the live client's bundle rather than guessing new
//! values (see the open question this resolves in `DESIGN.md`).

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

use crate::client::GraphqlMethod;

#[derive(Debug, Clone, Copy)]
pub struct EndpointDescriptor {
    pub operation: &'static str,
    pub query_id: &'static str,
    pub is_mutation: bool,
    pub default_method: GraphqlMethod,
    features_json: &'static str,
}

impl EndpointDescriptor {
    /// Parses the pinned feature-flag blob. Panics only on a programmer
    /// error (malformed literal caught by the catalog's own tests).
    pub fn features(&self) -> Value {
        serde_json::from_str(self.features_json).expect("catalog feature json is well-formed")
    }
}

macro_rules! endpoint {
    ($op:expr, $query_id:expr, $mutation:expr, $method:expr, $features:expr) => {
        EndpointDescriptor {
            operation: $op,
            query_id: $query_id,
            is_mutation: $mutation,
            default_method: $method,
            features_json: $features,
        }
    };
}

const READ_FEATURES: &str = r#"{
    "responsive_web_graphql_exclude_directive_enabled": true,
    "verified_phone_label_enabled": false,
    "creator_subscriptions_tweet_preview_api_enabled": true,
    "responsive_web_graphql_timeline_navigation_enabled": true,
    "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
    "tweetypie_unmention_optimization_enabled": true,
    "responsive_web_edit_tweet_api_enabled": true,
    "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
    "view_counts_everywhere_api_enabled": true,
    "longform_notetweets_consumption_enabled": true,
    "responsive_web_twitter_article_tweet_consumption_enabled": true,
    "tweet_awards_web_tipping_enabled": false,
    "freedom_of_speech_not_reach_fetch_enabled": true,
    "standardized_nudges_misinfo": true,
    "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
    "rweb_video_timestamps_enabled": true,
    "longform_notetweets_rich_text_read_enabled": true,
    "longform_notetweets_inline_media_enabled": true,
    "responsive_web_enhance_cards_enabled": false
}"#;

const MUTATION_FEATURES: &str = r#"{
    "responsive_web_graphql_exclude_directive_enabled": true,
    "responsive_web_graphql_timeline_navigation_enabled": true,
    "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false
}"#;

fn build_catalog() -> HashMap<&'static str, EndpointDescriptor> {
    use GraphqlMethod::{Get, Post};

    let entries = [
        // Reads.
        endpoint!("UserByScreenName", "G3KGOASz_VcH3ErgHSTAeg", false, Get, READ_FEATURES),
        endpoint!("UserTweets", "V7H0Ap3_Hh2FyS75OCDO3Q", false, Get, READ_FEATURES),
        endpoint!("UserTweetsAndReplies", "E4wA5vo2sjVyvpliUffSCw", false, Get, READ_FEATURES),
        endpoint!("UserMedia", "2tLOJWwYEa9MS7p_TfgwBw", false, Get, READ_FEATURES),
        endpoint!("HomeTimeline", "HCosKfLNW1AcOo3la3mMgg", false, Post, READ_FEATURES),
        endpoint!("Followers", "rRXFSG5vR6drKr5M37YOTw", false, Get, READ_FEATURES),
        endpoint!("Following", "iSicc7LrzWGBgDPL0tM_TQ", false, Get, READ_FEATURES),
        endpoint!("VerifiedFollowers", "VbU1qmEq8K5KsSt2EPnvDA", false, Get, READ_FEATURES),
        endpoint!("BlueVerifiedFollowers", "Q9T0GBXTFqVXVDyinI5uVg", false, Get, READ_FEATURES),
        endpoint!("ListMembers", "D2cEDAW6yu38EFkAzKeiYg", false, Get, READ_FEATURES),
        endpoint!("ListLatestTweetsTimeline", "HjsWBqCZ1CX475I-d8vBCQ", false, Get, READ_FEATURES),
        endpoint!("TweetDetail", "xOhkmRac04YFZmOzU9PJHg", false, Get, READ_FEATURES),
        endpoint!("SearchTimeline", "gkjsKepM6gl_HmFWoWKfgg", false, Get, READ_FEATURES),
        endpoint!("Bookmarks", "tmd4ifV8RHltzn8ymGg1aw", false, Get, READ_FEATURES),
        endpoint!("Retweeters", "0BoJllDhutGzVVesHypK3A", false, Get, READ_FEATURES),
        endpoint!("Favoriters", "jMaTS-_Ea6iejJdWEMIhyA", false, Get, READ_FEATURES),
        // Mutations.
        endpoint!("FavoriteTweet", "lI07N6Otwv1PhnEgXILM7A", true, Post, MUTATION_FEATURES),
        endpoint!("UnfavoriteTweet", "ZYKSe-w7KEslx3JhSIk5LA", true, Post, MUTATION_FEATURES),
        endpoint!("CreateFriendships", "SjzHZMsuhUqGvzD0L4kLWQ", true, Post, MUTATION_FEATURES),
        endpoint!("DestroyFriendships", "BnQ03mDZ9b8XIDAG-XnhOQ", true, Post, MUTATION_FEATURES),
        endpoint!("CreateTweet", "znq7jUAqhB7G2l7jTrBtQQ", true, Post, MUTATION_FEATURES),
        endpoint!("DeleteTweet", "VaenaVgh5q5ih7kvyVjgtg", true, Post, MUTATION_FEATURES),
        endpoint!("CreateRetweet", "ojPdsZsimiJrUGLR1sjUtA", true, Post, MUTATION_FEATURES),
        endpoint!("DeleteRetweet", "iQtK4dl5hBmXewYZuEOKVw", true, Post, MUTATION_FEATURES),
        endpoint!("CreateBookmark", "aoDbu3RHznuiSkQ9aNM67Q", true, Post, MUTATION_FEATURES),
        endpoint!("DeleteBookmark", "Wlmlj2-xzyS1GN3a6cj-mQ", true, Post, MUTATION_FEATURES),
        endpoint!("useSendMessageMutation", "MaxK2PKX1F9Z-skz1Gs7dg", true, Post, MUTATION_FEATURES),
    ];

    entries.into_iter().map(|e| (e.operation, e)).collect()
}

fn catalog() -> &'static HashMap<&'static str, EndpointDescriptor> {
    static CATALOG: OnceLock<HashMap<&'static str, EndpointDescriptor>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Looks up a named operation.
pub fn lookup(operation: &str) -> Option<&'static EndpointDescriptor> {
    catalog().get(operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_exhaustive_for_named_reads() {
        for op in [
            "UserByScreenName",
            "UserTweets",
            "UserTweetsAndReplies",
            "UserMedia",
            "HomeTimeline",
            "Followers",
            "Following",
            "VerifiedFollowers",
            "BlueVerifiedFollowers",
            "ListMembers",
            "ListLatestTweetsTimeline",
            "TweetDetail",
            "SearchTimeline",
            "Bookmarks",
            "Retweeters",
            "Favoriters",
        ] {
            assert!(lookup(op).is_some(), "missing catalog entry for {op}");
        }
    }

    #[test]
    fn catalog_is_exhaustive_for_named_mutations() {
        for op in [
            "FavoriteTweet",
            "UnfavoriteTweet",
            "CreateFriendships",
            "DestroyFriendships",
            "CreateTweet",
            "DeleteTweet",
            "CreateRetweet",
            "DeleteRetweet",
            "CreateBookmark",
            "DeleteBookmark",
            "useSendMessageMutation",
        ] {
            let descriptor = lookup(op).unwrap_or_else(|| panic!("missing catalog entry for {op}"));
            assert!(descriptor.is_mutation);
        }
    }

    #[test]
    fn feature_blobs_parse() {
        for descriptor in catalog().values() {
            let _: Value = descriptor.features();
        }
    }
}
