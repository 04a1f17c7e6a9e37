//! Keyword groups, kept in the `groups` hash as name -> "phrase, phrase, ..."
use std::collections::BTreeMap;

use log::info;
use serde_json::Value;

use crate::dedup_store::posts_key;
use crate::error::ScoutError;
use crate::kv_client::{command, into_pairs, KvClientTrait};

const GROUPS_KEY: &str = "groups";

pub struct GroupResolver<'a, K: KvClientTrait> {
    kv: &'a K,
}

impl<'a, K: KvClientTrait> GroupResolver<'a, K> {
    pub fn new(kv: &'a K) -> Self {
        GroupResolver { kv }
    }

    /// All groups, by name
    pub fn list_groups(&self) -> Result<BTreeMap<String, String>, ScoutError> {
        let reply = self.kv.execute(&command(&["HGETALL", GROUPS_KEY]))?;
        Ok(into_pairs("HGETALL", reply)?.into_iter().collect())
    }

    /// Keyword string of one group
    pub fn get_group(&self, name: &str) -> Result<String, ScoutError> {
        self.list_groups()?
            .remove(name)
            .ok_or_else(|| ScoutError::GroupNotFound {
                group: name.to_string(),
            })
    }

    /// Create or overwrite a group
    pub fn add_group(&self, name: &str, keywords: &str) -> Result<(), ScoutError> {
        let name = name.trim();
        let keywords = keywords.trim();
        if name.is_empty() || keywords.is_empty() {
            return Err(ScoutError::config("group name and keywords are required"));
        }
        self.kv
            .execute(&command(&["HSET", GROUPS_KEY, name, keywords]))?;
        info!("Saved group {}: {}", name, keywords);
        Ok(())
    }

    /// Delete a group together with every post stored for it
    /// Returns whether the group existed
    pub fn remove_group(&self, name: &str) -> Result<bool, ScoutError> {
        let removed = self.kv.execute(&command(&["HDEL", GROUPS_KEY, name]))?;
        self.kv.execute(&command(&["DEL", &posts_key(name)]))?;
        let existed = matches!(removed, Value::Number(n) if n.as_i64().unwrap_or(0) > 0);
        info!("Removed group {} (existed: {})", name, existed);
        Ok(existed)
    }
}
