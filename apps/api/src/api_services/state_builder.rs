use std::sync::Arc;

use restify_application::{
    ActionDispatcher, AuthorizationGate, GetterDispatcher, ModelStore, PolicyCache,
    RepositoryService,
};
use restify_core::{AppError, AppResult};
use restify_infrastructure::{InMemoryPolicyCache, RedisPolicyCache};
use tracing::info;

use crate::api_config::ApiConfig;
use crate::demo;
use crate::state::AppState;

const POLICY_CACHE_NAMESPACE: &str = "restify:policy";

pub fn build_app_state(
    store: Arc<dyn ModelStore>,
    config: &ApiConfig,
    store_driver: &'static str,
) -> AppResult<AppState> {
    let registry = Arc::new(demo::build_registry()?);
    let gate = build_authorization_gate(config)?;
    let restify = config.restify.clone();

    Ok(AppState {
        repository_service: RepositoryService::new(
            store.clone(),
            registry,
            gate.clone(),
            restify.clone(),
        ),
        action_dispatcher: ActionDispatcher::new(store.clone(), gate.clone(), restify),
        getter_dispatcher: GetterDispatcher::new(store, gate),
        bootstrap_token: config.bootstrap_token.clone(),
        store_driver,
    })
}

fn build_authorization_gate(config: &ApiConfig) -> AppResult<AuthorizationGate> {
    let Some(ttl_seconds) = config.restify.policy_cache_ttl_seconds else {
        return Ok(AuthorizationGate::new());
    };

    let cache: Arc<dyn PolicyCache> = match config.redis_url.as_deref() {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Arc::new(RedisPolicyCache::new(client, POLICY_CACHE_NAMESPACE))
        }
        None => Arc::new(InMemoryPolicyCache::new()),
    };
    info!(ttl_seconds, "policy cache enabled");

    Ok(AuthorizationGate::with_cache(cache, ttl_seconds))
}
