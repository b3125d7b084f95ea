use std::sync::Arc;

use restify_core::{AppError, AppResult};
use restify_domain::{ACTION_LOGS_TABLE, ActionLog, Model, ModelKey, SortDirection};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{available_actions, resolve_action};
use crate::actions::{Action, ActionContext, DispatchTarget};
use crate::authorization::AuthorizationGate;
use crate::config::RestifyConfig;
use crate::loading::{first_or_fail, hydrate};
use crate::query::{ColumnRef, CompareOp, Condition};
use crate::repository::{Repository, ValidationMode, validate_payload};
use crate::response::RestResponse;
use crate::store_ports::{ModelStore, StoreTransaction};
use crate::RestifyRequest;

/// Models an index action runs against, read from the `repositories` payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositorySelection {
    /// Every model the action query admits.
    All,
    /// Models with the listed keys.
    Keys(Vec<Value>),
}

impl RepositorySelection {
    /// Reads the selection from the request.
    pub fn from_request(
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<Self> {
        let invalid = || {
            AppError::Validation("the repositories field must be 'all' or a list of keys".to_owned())
        };

        match request.input("repositories") {
            None | Some(Value::Null) => Err(AppError::Validation(
                "the repositories field is required".to_owned(),
            )),
            Some(Value::String(text)) if text.trim() == "all" => Ok(Self::All),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| repository.key_type().normalize_identifier(item))
                .collect::<Option<Vec<_>>>()
                .map(Self::Keys)
                .ok_or_else(invalid),
            Some(other) => repository
                .key_type()
                .normalize_identifier(&other)
                .map(|key| Self::Keys(vec![key]))
                .ok_or_else(invalid),
        }
    }
}

/// Runs repository actions.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn ModelStore>,
    gate: AuthorizationGate,
    config: RestifyConfig,
}

impl ActionDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(store: Arc<dyn ModelStore>, gate: AuthorizationGate, config: RestifyConfig) -> Self {
        Self {
            store,
            gate,
            config,
        }
    }

    /// Lists the actions the request may invoke from the route.
    pub async fn list(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        target: DispatchTarget,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        let data = available_actions(repository, request, target)
            .iter()
            .map(|action| action.describe())
            .collect::<Vec<_>>();
        Ok(json!({ "data": data }))
    }

    /// Runs an action from the index route.
    ///
    /// Standalone actions run once. Other actions run over the selected models in chunks, one
    /// transaction per chunk; the response of the last chunk is returned. When no model matches
    /// the handler still runs once with no models.
    pub async fn run_index(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        uri_key: &str,
    ) -> AppResult<RestResponse> {
        self.gate.authorize_repository(repository, request).await?;
        let action = resolve_action(repository, request, uri_key, DispatchTarget::Index)?;
        validate_action_payload(action.as_ref(), request)?;

        let batch_id = Uuid::new_v4();
        if action.standalone() {
            return self
                .run_standalone(repository, request, action.as_ref(), batch_id)
                .await;
        }

        let selection = RepositorySelection::from_request(repository, request)?;
        let mut base = repository.new_query();
        repository.main_query(request, &mut base)?;
        action.index_query(request, &mut base)?;
        if let RepositorySelection::Keys(keys) = selection {
            base.where_keys_in(keys, repository.key_type());
        }
        // Chunks page by key, so hook ordering would skip rows between chunks.
        base.clear_orders();

        let chunk_size = self.config.action_chunk_size.max(1);
        let mut last_key: Option<ModelKey> = None;
        let mut last_response: Option<RestResponse> = None;

        loop {
            let mut chunk_query = base.clone();
            if let Some(key) = &last_key {
                chunk_query.filter(Condition::Compare {
                    column: ColumnRef::root(repository.key_column()),
                    op: CompareOp::Gt,
                    value: key.to_value(),
                    field_type: repository.key_type().field_type(),
                });
            }
            chunk_query
                .order_by(ColumnRef::root(repository.key_column()), SortDirection::Asc)
                .set_limit(Some(chunk_size));

            let transaction = self.store.begin().await?;
            let models = hydrate(repository, transaction.fetch(&chunk_query).await?)?;
            if models.is_empty() && last_response.is_some() {
                break;
            }

            let fetched = models.len();
            last_key = models.last().map(|model| model.key().clone());
            let runnable = models
                .into_iter()
                .filter(|model| action.authorized_to_run(request, model))
                .collect::<Vec<_>>();

            info!(
                repository = repository.uri_key(),
                action = action.uri_key(),
                models = runnable.len(),
                "running action chunk"
            );

            let response = self
                .run_in_transaction(
                    repository,
                    request,
                    action.as_ref(),
                    transaction,
                    runnable,
                    batch_id,
                )
                .await?;
            last_response = Some(response);

            if fetched < chunk_size {
                break;
            }
        }

        Ok(last_response.unwrap_or_default())
    }

    /// Runs an action against one model from the show route.
    pub async fn run_show(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        uri_key: &str,
        identifier: &str,
    ) -> AppResult<RestResponse> {
        self.gate.authorize_repository(repository, request).await?;
        let action = resolve_action(repository, request, uri_key, DispatchTarget::Show)?;
        validate_action_payload(action.as_ref(), request)?;

        let batch_id = Uuid::new_v4();
        if action.standalone() {
            return self
                .run_standalone(repository, request, action.as_ref(), batch_id)
                .await;
        }

        let transaction = self.store.begin().await?;
        let mut query = repository.new_query();
        repository.main_query(request, &mut query)?;
        action.index_query(request, &mut query)?;
        let model = first_or_fail(transaction.as_ref(), repository, query, identifier).await?;

        if !action.authorized_to_run(request, &model) {
            return Err(AppError::Forbidden(format!(
                "action '{}' may not run against model '{}'",
                action.uri_key(),
                model.key()
            )));
        }

        info!(
            repository = repository.uri_key(),
            action = action.uri_key(),
            model = %model.key(),
            "running action"
        );

        self.run_in_transaction(
            repository,
            request,
            action.as_ref(),
            transaction,
            vec![model],
            batch_id,
        )
        .await
    }

    async fn run_standalone(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        action: &dyn Action,
        batch_id: Uuid,
    ) -> AppResult<RestResponse> {
        info!(
            repository = repository.uri_key(),
            action = action.uri_key(),
            "running standalone action"
        );

        let transaction = self.store.begin().await?;
        if self.config.log_actions {
            let log = ActionLog::for_action(
                batch_id,
                request.viewer(),
                action.uri_key(),
                repository.uri_key(),
                None,
            );
            transaction.insert(ACTION_LOGS_TABLE, log.to_row()).await?;
        }

        let response = action
            .handle(
                ActionContext {
                    request,
                    repository,
                    transaction: transaction.as_ref(),
                },
                Vec::new(),
            )
            .await?;
        transaction.commit().await?;

        Ok(response)
    }

    async fn run_in_transaction(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        action: &dyn Action,
        transaction: Box<dyn StoreTransaction>,
        models: Vec<Model>,
        batch_id: Uuid,
    ) -> AppResult<RestResponse> {
        if self.config.log_actions {
            for model in &models {
                let log = ActionLog::for_action(
                    batch_id,
                    request.viewer(),
                    action.uri_key(),
                    repository.uri_key(),
                    Some(model),
                );
                transaction.insert(ACTION_LOGS_TABLE, log.to_row()).await?;
            }
        }

        let response = action
            .handle(
                ActionContext {
                    request,
                    repository,
                    transaction: transaction.as_ref(),
                },
                models,
            )
            .await?;
        transaction.commit().await?;

        Ok(response)
    }
}

fn validate_action_payload(action: &dyn Action, request: &RestifyRequest) -> AppResult<()> {
    let fields = action.fields();
    if fields.is_empty() {
        return Ok(());
    }

    let payload = request.payload().as_object().cloned().unwrap_or_default();
    validate_payload(&fields, &payload, ValidationMode::Store).into_result()
}
