//! Repository authorization gate with optional memoization of policy answers.

mod policy;


use std::sync::Arc;

use restify_core::{AppError, AppResult};
use restify_domain::{Ability, Model};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::repository::Repository;
use crate::store_ports::PolicyCache;
use crate::RestifyRequest;

pub use policy::{Policy, PolicyRule, RulePolicy};

const POLICY_CACHE_KEY_PREFIX: &str = "restify:policy:";

/// Gate consulted before every repository operation.
#[derive(Clone, Default)]
pub struct AuthorizationGate {
    cache: Option<Arc<dyn PolicyCache>>,
    cache_ttl_seconds: u32,
}

impl AuthorizationGate {
    /// Creates a gate without caching.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gate memoizing answers for `ttl_seconds`.
    #[must_use]
    pub fn with_cache(cache: Arc<dyn PolicyCache>, ttl_seconds: u32) -> Self {
        Self {
            cache: Some(cache),
            cache_ttl_seconds: ttl_seconds,
        }
    }

    /// Returns whether the request viewer holds the ability on the repository.
    pub async fn allows(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        ability: &Ability,
        model: Option<&Model>,
    ) -> AppResult<bool> {
        let Some(policy) = repository.policy() else {
            return Ok(true);
        };

        let cache_key = cache_key(repository, request, ability, model);
        if self.cache_ttl_seconds > 0
            && let Some(cache) = &self.cache
            && let Some(allowed) = cache.get(cache_key.as_str()).await?
        {
            return Ok(allowed);
        }

        let allowed = policy.allows(request.viewer(), ability, model).await?;

        if self.cache_ttl_seconds > 0
            && let Some(cache) = &self.cache
        {
            cache
                .put(cache_key.as_str(), allowed, self.cache_ttl_seconds)
                .await?;
        }

        Ok(allowed)
    }

    /// Ensures the request viewer holds the ability on the repository.
    pub async fn authorize(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        ability: &Ability,
        model: Option<&Model>,
    ) -> AppResult<()> {
        if self.allows(repository, request, ability, model).await? {
            return Ok(());
        }

        let subject = request
            .viewer()
            .map(|viewer| viewer.subject().to_owned())
            .unwrap_or_else(|| "guest".to_owned());
        warn!(
            repository = repository.uri_key(),
            ability = %ability.method_name(),
            subject = %subject,
            "policy denied repository operation"
        );

        Err(AppError::Forbidden(format!(
            "this action is unauthorized: '{}' on repository '{}'",
            ability.method_name(),
            repository.uri_key()
        )))
    }

    /// Ensures the viewer may use the repository at all.
    pub async fn authorize_repository(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<()> {
        self.authorize(repository, request, &Ability::AllowRestify, None)
            .await
    }
}

/// Builds the cache key for one policy answer.
///
/// The key covers repository, ability, target model and viewer, so answers are never shared
/// between viewers or between models checked for the same ability.
#[must_use]
pub fn cache_key(
    repository: &dyn Repository,
    request: &RestifyRequest,
    ability: &Ability,
    model: Option<&Model>,
) -> String {
    let viewer = request
        .viewer()
        .map(|viewer| Value::String(viewer.subject().to_owned()))
        .unwrap_or(Value::Null);
    let material = json!([
        repository.uri_key(),
        ability.method_name(),
        model.map(|model| model.key().to_value()),
        viewer,
    ]);

    let digest = Sha256::digest(material.to_string().as_bytes());
    format!("{POLICY_CACHE_KEY_PREFIX}{}", hex::encode(digest))
}
