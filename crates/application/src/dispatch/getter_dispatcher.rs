use std::sync::Arc;

use restify_core::{AppError, AppResult};
use serde_json::{Value, json};

use super::{available_getters, resolve_getter};
use crate::actions::DispatchTarget;
use crate::authorization::AuthorizationGate;
use crate::getters::GetterContext;
use crate::loading::first_or_fail;
use crate::repository::Repository;
use crate::response::RestResponse;
use crate::store_ports::ModelStore;
use crate::RestifyRequest;

/// Runs repository getters outside of any transaction.
#[derive(Clone)]
pub struct GetterDispatcher {
    store: Arc<dyn ModelStore>,
    gate: AuthorizationGate,
}

impl GetterDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(store: Arc<dyn ModelStore>, gate: AuthorizationGate) -> Self {
        Self { store, gate }
    }

    /// Lists the getters the request may invoke from the route.
    pub async fn list(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        target: DispatchTarget,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        let data = available_getters(repository, request, target)
            .iter()
            .map(|getter| getter.describe())
            .collect::<Vec<_>>();
        Ok(json!({ "data": data }))
    }

    /// Runs a getter from the index route.
    pub async fn run_index(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        uri_key: &str,
    ) -> AppResult<RestResponse> {
        self.gate.authorize_repository(repository, request).await?;
        let getter = resolve_getter(repository, request, uri_key, DispatchTarget::Index)?;

        getter
            .handle(
                GetterContext {
                    request,
                    repository,
                    reader: self.store.as_ref(),
                },
                None,
            )
            .await
    }

    /// Runs a getter against one model from the show route.
    pub async fn run_show(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        uri_key: &str,
        identifier: &str,
    ) -> AppResult<RestResponse> {
        self.gate.authorize_repository(repository, request).await?;
        let getter = resolve_getter(repository, request, uri_key, DispatchTarget::Show)?;

        let mut query = repository.new_query();
        repository.main_query(request, &mut query)?;
        getter.index_query(request, &mut query)?;
        let model = first_or_fail(self.store.as_ref(), repository, query, identifier).await?;

        if !getter.authorized_to_run(request, &model) {
            return Err(AppError::Forbidden(format!(
                "getter '{}' may not run against model '{}'",
                getter.uri_key(),
                model.key()
            )));
        }

        getter
            .handle(
                GetterContext {
                    request,
                    repository,
                    reader: self.store.as_ref(),
                },
                Some(model),
            )
            .await
    }
}
