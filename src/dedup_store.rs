//! Dedup store adapter
//! `tweets:<group>` is a hash of post id -> serialized post, HSETNX is the only identity check
use chrono::DateTime;
use log::warn;
use serde_json::Value;

use crate::error::ScoutError;
use crate::kv_client::{command, into_pairs, KvClientTrait};
use crate::twitter_object::EnrichedPost;

const SERVICE: &str = "kv-store";

pub fn posts_key(group: &str) -> String {
    format!("tweets:{}", group)
}

#[cfg(test)]
use mockall::automock;
#[cfg_attr(test, automock)]
pub trait DedupStoreTrait {
    /// `Ok(true)` when this call wrote the post, `Ok(false)` when it was already there
    fn try_set(&self, group: &str, post_id: &str, payload: &str) -> Result<bool, ScoutError>;
    /// Every stored post of the group, newest first
    fn list_posts(&self, group: &str) -> Result<Vec<EnrichedPost>, ScoutError>;
}

pub struct DedupStore<'a, K: KvClientTrait> {
    kv: &'a K,
}

impl<'a, K: KvClientTrait> DedupStore<'a, K> {
    pub fn new(kv: &'a K) -> Self {
        DedupStore { kv }
    }
}

impl<'a, K: KvClientTrait> DedupStoreTrait for DedupStore<'a, K> {
    fn try_set(&self, group: &str, post_id: &str, payload: &str) -> Result<bool, ScoutError> {
        let reply = self
            .kv
            .execute(&command(&["HSETNX", &posts_key(group), post_id, payload]))?;
        match reply {
            Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
            other => Err(ScoutError::transport(
                SERVICE,
                format!("HSETNX returned {}", other),
            )),
        }
    }

    fn list_posts(&self, group: &str) -> Result<Vec<EnrichedPost>, ScoutError> {
        let reply = self.kv.execute(&command(&["HGETALL", &posts_key(group)]))?;
        let mut posts: Vec<EnrichedPost> = into_pairs("HGETALL", reply)?
            .into_iter()
            .filter_map(|(id, payload)| match serde_json::from_str(&payload) {
                Ok(post) => Some(post),
                Err(e) => {
                    warn!("Skip unreadable post {} in {}: {}", id, posts_key(group), e);
                    None
                }
            })
            .collect();
        // newest first, unparseable timestamps at the end
        posts.sort_by(|a, b| {
            let a = DateTime::parse_from_rfc3339(&a.created_at).ok();
            let b = DateTime::parse_from_rfc3339(&b.created_at).ok();
            b.cmp(&a)
        });
        Ok(posts)
    }
}
