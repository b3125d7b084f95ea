//! Redis-backed policy answer cache.

use async_trait::async_trait;
use redis::AsyncCommands;
use restify_application::PolicyCache;
use restify_core::{AppError, AppResult};

/// Redis implementation of the policy cache port.
#[derive(Clone)]
pub struct RedisPolicyCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPolicyCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}:{key}", self.key_prefix)
        }
    }

    fn decode_answer(value: &str) -> AppResult<bool> {
        match value {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(AppError::Internal(format!(
                "invalid policy cache value '{other}'"
            ))),
        }
    }
}

#[async_trait]
impl PolicyCache for RedisPolicyCache {
    async fn get(&self, key: &str) -> AppResult<Option<bool>> {
        let key = self.key_for(key);
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let encoded: Option<String> = connection.get(key).await.map_err(|error| {
            AppError::Internal(format!("failed to read policy cache entry: {error}"))
        })?;

        encoded.as_deref().map(Self::decode_answer).transpose()
    }

    async fn put(&self, key: &str, allowed: bool, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let key = self.key_for(key);
        let value = if allowed { "1" } else { "0" };
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        connection
            .set_ex(key, value, u64::from(ttl_seconds))
            .await
            .map_err(|error| AppError::Internal(format!("failed to write policy cache entry: {error}")))
    }
}
