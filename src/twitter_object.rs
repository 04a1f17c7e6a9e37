//! Twitter search API response object definition
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every stored post links back to the web UI with this prefix
pub const STATUS_URL_PREFIX: &str = "https://twitter.com/i/web/status/";

/// Recent search response
/// `data` is absent when nothing matched, `includes.users` carries the author expansion
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct SearchResponse {
    pub data: Option<Vec<RawPost>>,
    #[serde(default)]
    pub includes: Includes,
    pub meta: Option<Meta>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<AuthorRecord>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct Meta {
    pub result_count: Option<u32>,
    pub newest_id: Option<String>,
    pub oldest_id: Option<String>,
    pub next_token: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RawPost {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
    pub lang: Option<String>,
    /// Will be used for checking how many likes, retweets, replies and impressions the post has
    #[serde(default)]
    pub public_metrics: BTreeMap<String, u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub profile_image_url: Option<String>,
    /// Present (as an object) when the account is withheld in some countries
    pub withheld: Option<Value>,
}

impl AuthorRecord {
    /// Withheld accounts and accounts without a handle are never ingested
    pub fn is_suspended(&self) -> bool {
        let withheld = match &self.withheld {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(_) => true,
        };
        let handle_missing = self
            .username
            .as_deref()
            .map_or(true, |handle| handle.trim().is_empty());
        withheld || handle_missing
    }
}

/// The unit written to the dedup store
/// Field names are the ones the web front end reads back
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EnrichedPost {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub author_name: String,
    pub author_username: String,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default)]
    pub public_metrics: BTreeMap<String, u64>,
    pub url: String,
}

impl EnrichedPost {
    /// Merge a post with its (known, not suspended) author
    pub fn new(post: &RawPost, author: &AuthorRecord) -> Self {
        EnrichedPost {
            id: post.id.clone(),
            text: post.text.clone(),
            author_id: post.author_id.clone(),
            created_at: post.created_at.clone(),
            lang: post.lang.clone(),
            author_name: author.name.clone(),
            author_username: author.username.clone().unwrap_or_default(),
            profile_image_url: author.profile_image_url.clone().unwrap_or_default(),
            public_metrics: post.public_metrics.clone(),
            url: status_url(&post.id),
        }
    }
}

pub fn status_url(post_id: &str) -> String {
    format!("{}{}", STATUS_URL_PREFIX, post_id)
}
