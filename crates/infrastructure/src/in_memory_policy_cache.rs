use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use restify_application::PolicyCache;
use restify_core::AppResult;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct PolicyCacheEntry {
    allowed: bool,
    expires_at: Instant,
}

/// In-memory cache adapter for policy answers.
#[derive(Default)]
pub struct InMemoryPolicyCache {
    entries: RwLock<HashMap<String, PolicyCacheEntry>>,
}

impl InMemoryPolicyCache {
    /// Creates an empty in-memory policy cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyCache for InMemoryPolicyCache {
    async fn get(&self, key: &str) -> AppResult<Option<bool>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.allowed));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn put(&self, key: &str, allowed: bool, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries
            .write()
            .await
            .insert(key.to_owned(), PolicyCacheEntry { allowed, expires_at });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use restify_application::PolicyCache;

    use super::InMemoryPolicyCache;

    #[tokio::test]
    async fn stored_answers_are_returned_until_replaced() {
        let cache = InMemoryPolicyCache::new();
        assert_eq!(
            cache
                .get("restify.policy.posts.update.1.user-1")
                .await
                .unwrap_or_else(|_| unreachable!()),
            None
        );

        cache
            .put("restify.policy.posts.update.1.user-1", false, 60)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            cache
                .get("restify.policy.posts.update.1.user-1")
                .await
                .unwrap_or_else(|_| unreachable!()),
            Some(false)
        );

        cache
            .put("restify.policy.posts.update.1.user-1", true, 60)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            cache
                .get("restify.policy.posts.update.1.user-1")
                .await
                .unwrap_or_else(|_| unreachable!()),
            Some(true)
        );
    }

    #[tokio::test]
    async fn zero_ttl_skips_storage() {
        let cache = InMemoryPolicyCache::new();
        cache
            .put("restify.policy.posts.viewany.user-1", true, 0)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            cache
                .get("restify.policy.posts.viewany.user-1")
                .await
                .unwrap_or_else(|_| unreachable!()),
            None
        );
    }
}
