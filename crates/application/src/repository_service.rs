//! Repository CRUD service: index, show, mutations, bulk, nested and pivot operations.

mod bulk;
mod eager;
mod index;
mod mutations;
mod nested;
mod pivots;
mod serialize;

use std::sync::Arc;

use restify_core::{AppError, AppResult};
use restify_domain::{ACTION_LOGS_TABLE, ActionLog, Row};
use serde_json::Value;

use crate::authorization::AuthorizationGate;
use crate::config::RestifyConfig;
use crate::repository::{Repository, RepositoryRegistry};
use crate::search_service::SearchService;
use crate::store_ports::{ModelStore, StoreTransaction};
use crate::RestifyRequest;

/// Application service behind the generated repository endpoints.
#[derive(Clone)]
pub struct RepositoryService {
    store: Arc<dyn ModelStore>,
    registry: Arc<RepositoryRegistry>,
    search: SearchService,
    gate: AuthorizationGate,
    config: RestifyConfig,
}

impl RepositoryService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn ModelStore>,
        registry: Arc<RepositoryRegistry>,
        gate: AuthorizationGate,
        config: RestifyConfig,
    ) -> Self {
        Self {
            search: SearchService::new(registry.clone(), config.clone()),
            store,
            registry,
            gate,
            config,
        }
    }

    /// Resolves a repository by uri key.
    pub fn resolve(&self, uri_key: &str) -> AppResult<Arc<dyn Repository>> {
        self.registry.resolve(uri_key)
    }

    async fn write_log(
        &self,
        transaction: &dyn StoreTransaction,
        log: Option<ActionLog>,
    ) -> AppResult<()> {
        if !self.config.log_repository_mutations {
            return Ok(());
        }

        if let Some(log) = log {
            transaction.insert(ACTION_LOGS_TABLE, log.to_row()).await?;
        }

        Ok(())
    }
}

fn ensure_writable(repository: &dyn Repository) -> AppResult<()> {
    if repository.read_only() {
        return Err(AppError::Forbidden(format!(
            "repository '{}' is read-only",
            repository.uri_key()
        )));
    }

    Ok(())
}

fn payload_object(request: &RestifyRequest) -> AppResult<Row> {
    match request.payload() {
        Value::Object(payload) => Ok(payload.clone()),
        Value::Null => Ok(Row::new()),
        _ => Err(AppError::BadRequest(
            "request payload must be a JSON object".to_owned(),
        )),
    }
}

fn payload_array(request: &RestifyRequest) -> AppResult<Vec<Value>> {
    match request.payload() {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(AppError::BadRequest(
            "bulk payload must be a JSON array".to_owned(),
        )),
    }
}
