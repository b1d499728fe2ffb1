/// Best-effort user id → display name resolution
///
/// Lookups go through a `MemberDirectory` (the chat platform's member info
/// endpoint in production, a JSON file for the bundled runner). Failures are
/// never surfaced: the raw user id is used instead.
use futures_util::future::join_all;
use lru::LruCache;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

use crate::error::ResolveError;

/// Member details as reported by the chat platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MemberInfo {
    /// Group-specific name
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl MemberInfo {
    /// Non-empty card, else non-empty nickname.
    pub fn display_name(&self) -> Option<&str> {
        [self.card.as_deref(), self.nickname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

/// Source of member information
pub trait MemberDirectory: Send + Sync {
    fn member_info(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> impl Future<Output = Result<MemberInfo, ResolveError>> + Send;
}

/// Directory backed by a JSON file: group id → user id → member info.
#[derive(Debug, Clone, Default)]
pub struct JsonDirectory {
    members: HashMap<i64, HashMap<i64, MemberInfo>>,
}

impl JsonDirectory {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read member directory: {}", path.display()))?;
        let members = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse member directory: {}", path.display()))?;
        Ok(Self { members })
    }

    pub fn from_members(members: HashMap<i64, HashMap<i64, MemberInfo>>) -> Self {
        Self { members }
    }
}

impl MemberDirectory for JsonDirectory {
    fn member_info(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> impl Future<Output = Result<MemberInfo, ResolveError>> + Send {
        let result = self
            .members
            .get(&group_id)
            .and_then(|group| group.get(&user_id))
            .cloned()
            .ok_or(ResolveError::NotFound { group_id, user_id });
        std::future::ready(result)
    }
}

/// Resolves display names with a bounded per-group LRU cache.
///
/// Only successful lookups are cached, so a transient failure is retried on
/// the next query.
pub struct NameResolver<D> {
    directory: D,
    capacity: Option<NonZeroUsize>,
    cache: Mutex<HashMap<i64, LruCache<i64, String>>>,
}

impl<D: MemberDirectory> NameResolver<D> {
    /// `capacity` is per group; 0 disables caching.
    pub fn new(directory: D, capacity: usize) -> Self {
        Self {
            directory,
            capacity: NonZeroUsize::new(capacity),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Display name for a user, or the raw id when none can be found.
    pub async fn resolve(&self, group_id: i64, user_id: i64) -> String {
        if let Some(name) = self.cached(group_id, user_id) {
            return name;
        }

        match self.directory.member_info(group_id, user_id).await {
            Ok(info) => {
                let name = info
                    .display_name()
                    .map(str::to_owned)
                    .unwrap_or_else(|| user_id.to_string());
                self.remember(group_id, user_id, &name);
                name
            }
            Err(e) => {
                tracing::warn!(
                    "Name lookup for {} in group {} failed, using raw id: {}",
                    user_id,
                    group_id,
                    e
                );
                user_id.to_string()
            }
        }
    }

    /// Resolve several users of one group concurrently, preserving order.
    pub async fn resolve_all(&self, group_id: i64, user_ids: &[i64]) -> Vec<String> {
        join_all(user_ids.iter().map(|id| self.resolve(group_id, *id))).await
    }

    fn cached(&self, group_id: i64, user_id: i64) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        cache.get_mut(&group_id)?.get(&user_id).cloned()
    }

    fn remember(&self, group_id: i64, user_id: i64, name: &str) {
        let Some(capacity) = self.capacity else {
            return;
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache
                .entry(group_id)
                .or_insert_with(|| LruCache::new(capacity))
                .put(user_id, name.to_owned());
        }
    }
}
