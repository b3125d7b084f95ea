use chrono::{SecondsFormat, Utc};
use restify_core::{AppError, AppResult};
use restify_domain::{Ability, ActionLog, KeyType, Model, ModelKey, Row, dirty_attributes};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{RepositoryService, ensure_writable, payload_object};
use crate::loading::first_or_fail;
use crate::query::ModelQuery;
use crate::repository::{Repository, ValidationMode, fillable_attributes, validate_payload};
use crate::store_ports::StoreTransaction;
use crate::RestifyRequest;

const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

impl RepositoryService {
    /// Creates a model from the request payload.
    pub async fn store(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        ensure_writable(repository)?;
        self.gate
            .authorize(repository, request, &Ability::Store, None)
            .await?;

        let payload = payload_object(request)?;
        validate_payload(&repository.fields(), &payload, ValidationMode::Store).into_result()?;

        let transaction = self.store.begin().await?;
        let attributes = fillable_attributes(&repository.fields(), &payload);
        let model = self
            .insert_model(transaction.as_ref(), repository, attributes)
            .await?;
        self.write_log(
            transaction.as_ref(),
            Some(ActionLog::for_stored(
                Uuid::new_v4(),
                request.viewer(),
                repository.uri_key(),
                &model,
            )),
        )
        .await?;
        transaction.commit().await?;

        info!(
            repository = repository.uri_key(),
            model = %model.key(),
            "stored model"
        );

        Ok(json!({ "data": self.serialize(repository, request, &model)? }))
    }

    /// Updates a model with the submitted fields.
    pub async fn update(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        identifier: &str,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        let query = self.show_query(repository, request)?;
        self.update_through(repository, request, query, identifier)
            .await
    }

    /// Deletes a model.
    pub async fn destroy(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        identifier: &str,
    ) -> AppResult<()> {
        self.gate.authorize_repository(repository, request).await?;
        let query = self.show_query(repository, request)?;
        self.destroy_through(repository, request, query, identifier)
            .await
    }

    /// Updates the model `query` resolves for the identifier.
    pub(super) async fn update_through(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        query: ModelQuery,
        identifier: &str,
    ) -> AppResult<Value> {
        ensure_writable(repository)?;

        let transaction = self.store.begin().await?;
        let model = first_or_fail(transaction.as_ref(), repository, query, identifier).await?;
        self.gate
            .authorize(repository, request, &Ability::Update, Some(&model))
            .await?;

        let payload = payload_object(request)?;
        validate_payload(&repository.fields(), &payload, ValidationMode::Update).into_result()?;

        let changes = fillable_attributes(&repository.fields(), &payload);
        let updated = self
            .update_model(transaction.as_ref(), repository, &model, changes)
            .await?;
        self.write_log(
            transaction.as_ref(),
            updated_log(Uuid::new_v4(), request, repository, &model, &updated),
        )
        .await?;
        transaction.commit().await?;

        info!(
            repository = repository.uri_key(),
            model = %updated.key(),
            "updated model"
        );

        Ok(json!({ "data": self.serialize(repository, request, &updated)? }))
    }

    /// Deletes the model `query` resolves for the identifier.
    pub(super) async fn destroy_through(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        query: ModelQuery,
        identifier: &str,
    ) -> AppResult<()> {
        ensure_writable(repository)?;

        let transaction = self.store.begin().await?;
        let model = first_or_fail(transaction.as_ref(), repository, query, identifier).await?;
        self.gate
            .authorize(repository, request, &Ability::Delete, Some(&model))
            .await?;

        self.delete_model(transaction.as_ref(), repository, &model)
            .await?;
        self.write_log(
            transaction.as_ref(),
            Some(ActionLog::for_deleted(
                Uuid::new_v4(),
                request.viewer(),
                repository.uri_key(),
                &model,
            )),
        )
        .await?;
        transaction.commit().await?;

        info!(
            repository = repository.uri_key(),
            model = %model.key(),
            "deleted model"
        );

        Ok(())
    }

    /// Inserts already filled attributes, generating uuid keys and timestamps.
    pub(super) async fn insert_model(
        &self,
        transaction: &dyn StoreTransaction,
        repository: &dyn Repository,
        mut attributes: Row,
    ) -> AppResult<Model> {
        if repository.key_type() == KeyType::Uuid
            && attributes
                .get(repository.key_column())
                .is_none_or(Value::is_null)
        {
            attributes.insert(
                repository.key_column().to_owned(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }

        if repository.timestamps() {
            let now = timestamp_now();
            attributes.insert(CREATED_AT.to_owned(), now.clone());
            attributes.insert(UPDATED_AT.to_owned(), now);
        }

        let row = transaction.insert(repository.table(), attributes).await?;
        Model::from_row(repository.table(), repository.key_column(), row)
    }

    /// Writes the changes onto one model and returns its new state.
    pub(super) async fn update_model(
        &self,
        transaction: &dyn StoreTransaction,
        repository: &dyn Repository,
        model: &Model,
        mut changes: Row,
    ) -> AppResult<Model> {
        changes.remove(repository.key_column());
        if dirty_attributes(model.attributes(), &changes).is_empty() {
            return Ok(model.clone());
        }

        if repository.timestamps() {
            changes.insert(UPDATED_AT.to_owned(), timestamp_now());
        }

        let rows = transaction
            .update(&key_query(repository, model.key()), changes)
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| {
            AppError::NotFound(format!(
                "model '{}' of repository '{}' does not exist",
                model.key(),
                repository.uri_key()
            ))
        })?;

        Model::from_row(repository.table(), repository.key_column(), row)
    }

    /// Deletes one model.
    pub(super) async fn delete_model(
        &self,
        transaction: &dyn StoreTransaction,
        repository: &dyn Repository,
        model: &Model,
    ) -> AppResult<()> {
        transaction
            .delete(&key_query(repository, model.key()))
            .await?;
        Ok(())
    }
}

/// Builds the update log, or nothing when no attribute changed.
pub(super) fn updated_log(
    batch_id: Uuid,
    request: &RestifyRequest,
    repository: &dyn Repository,
    before: &Model,
    after: &Model,
) -> Option<ActionLog> {
    if dirty_attributes(before.attributes(), after.attributes()).is_empty() {
        return None;
    }

    Some(ActionLog::for_updated(
        batch_id,
        request.viewer(),
        repository.uri_key(),
        before,
        after,
    ))
}

pub(super) fn key_query(repository: &dyn Repository, key: &ModelKey) -> ModelQuery {
    let mut query = repository.new_query();
    query.where_key(key.to_value(), repository.key_type());
    query
}

fn timestamp_now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
}
