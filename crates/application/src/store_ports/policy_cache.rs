use async_trait::async_trait;
use restify_core::AppResult;

/// Optional cache port for memoized policy answers.
#[async_trait]
pub trait PolicyCache: Send + Sync {
    /// Returns a cached answer for one key.
    async fn get(&self, key: &str) -> AppResult<Option<bool>>;

    /// Stores an answer for one key with ttl.
    async fn put(&self, key: &str, allowed: bool, ttl_seconds: u32) -> AppResult<()>;
}
