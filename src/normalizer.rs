//! Turns one search response into enriched posts
//! Posts without a usable author never leave this module
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::twitter_object::{AuthorRecord, EnrichedPost, RawPost, SearchResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SuspendedAuthor,
    MissingAuthorInfo,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SuspendedAuthor => write!(f, "suspended author"),
            SkipReason::MissingAuthorInfo => write!(f, "missing author info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Ready(EnrichedPost),
    Skipped { post_id: String, reason: SkipReason },
}

/// Authors of one response, split into usable and suspended
pub struct AuthorIndex<'a> {
    known: HashMap<&'a str, &'a AuthorRecord>,
    suspended: HashSet<&'a str>,
}

impl<'a> AuthorIndex<'a> {
    pub fn new(authors: &'a [AuthorRecord]) -> Self {
        let mut known = HashMap::new();
        let mut suspended = HashSet::new();
        for author in authors {
            if author.is_suspended() {
                suspended.insert(author.id.as_str());
            } else {
                known.insert(author.id.as_str(), author);
            }
        }
        AuthorIndex { known, suspended }
    }

    pub fn classify(&self, post: &RawPost) -> Normalized {
        let author_id = post.author_id.as_str();
        if self.suspended.contains(author_id) {
            return Normalized::Skipped {
                post_id: post.id.clone(),
                reason: SkipReason::SuspendedAuthor,
            };
        }
        match self.known.get(author_id) {
            Some(author) => Normalized::Ready(EnrichedPost::new(post, author)),
            None => Normalized::Skipped {
                post_id: post.id.clone(),
                reason: SkipReason::MissingAuthorInfo,
            },
        }
    }
}

/// Lazily classify every post of the response, in API order
pub fn normalize(response: &SearchResponse) -> impl Iterator<Item = Normalized> + '_ {
    let index = AuthorIndex::new(&response.includes.users);
    response
        .data
        .iter()
        .flatten()
        .map(move |post| index.classify(post))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize, Normalized, SkipReason};
    use crate::twitter_object::SearchResponse;

    fn response(body: serde_json::Value) -> SearchResponse {
        serde_json::from_value(body).unwrap()
    }

    fn post(id: &str, author_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "author_id": author_id,
            "text": format!("post {}", id),
            "created_at": "2025-05-01T10:00:00.000Z",
            "public_metrics": {"like_count": 1}
        })
    }

    #[test]
    fn no_data_yields_nothing() {
        let response = response(json!({"meta": {"result_count": 0}}));
        assert_eq!(normalize(&response).count(), 0);
    }

    #[test]
    fn filters_and_preserves_order() {
        let response = response(json!({
            "data": [post("3", "a"), post("1", "withheld"), post("2", "nohandle"),
                     post("5", "ghost"), post("4", "a")],
            "includes": {"users": [
                {"id": "a", "name": "Alice", "username": "alice", "profile_image_url": "https://img/a"},
                {"id": "withheld", "name": "W", "username": "w", "withheld": {"country_codes": ["DE"]}},
                {"id": "nohandle", "name": "N", "username": ""}
            ]}
        }));
        let out: Vec<Normalized> = normalize(&response).collect();
        assert_eq!(out.len(), 5);

        match &out[0] {
            Normalized::Ready(post) => {
                assert_eq!(post.id, "3");
                assert_eq!(post.author_name, "Alice");
                assert_eq!(post.author_username, "alice");
                assert_eq!(post.profile_image_url, "https://img/a");
                assert_eq!(post.url, "https://twitter.com/i/web/status/3");
                assert_eq!(post.public_metrics["like_count"], 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            out[1],
            Normalized::Skipped {
                post_id: "1".to_string(),
                reason: SkipReason::SuspendedAuthor
            }
        );
        assert_eq!(
            out[2],
            Normalized::Skipped {
                post_id: "2".to_string(),
                reason: SkipReason::SuspendedAuthor
            }
        );
        assert_eq!(
            out[3],
            Normalized::Skipped {
                post_id: "5".to_string(),
                reason: SkipReason::MissingAuthorInfo
            }
        );
        assert!(matches!(&out[4], Normalized::Ready(post) if post.id == "4"));
    }

    #[test]
    fn never_emits_posts_of_unusable_authors() {
        let response = response(json!({
            "data": [post("1", "gone"), post("2", "withheld"), post("3", "anon")],
            "includes": {"users": [
                {"id": "withheld", "name": "W", "username": "w", "withheld": {"copyright": true}},
                {"id": "anon", "name": "A"}
            ]}
        }));
        assert!(normalize(&response).all(|n| !matches!(n, Normalized::Ready(_))));
    }

    #[test]
    fn missing_includes_skips_everything() {
        let response = response(json!({"data": [post("1", "a")]}));
        let out: Vec<Normalized> = normalize(&response).collect();
        assert_eq!(
            out,
            vec![Normalized::Skipped {
                post_id: "1".to_string(),
                reason: SkipReason::MissingAuthorInfo
            }]
        );
    }

    #[test]
    fn skip_reason_text() {
        assert_eq!(SkipReason::SuspendedAuthor.to_string(), "suspended author");
        assert_eq!(SkipReason::MissingAuthorInfo.to_string(), "missing author info");
    }
}
