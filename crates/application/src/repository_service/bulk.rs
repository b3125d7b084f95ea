use restify_core::{AppError, AppResult, ValidationErrors};
use restify_domain::{Ability, ActionLog, Row};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::mutations::updated_log;
use super::{RepositoryService, ensure_writable, payload_array};
use crate::loading::{first_or_fail, hydrate};
use crate::repository::{Repository, ValidationMode, fillable_attributes, validate_payload};
use crate::RestifyRequest;

impl RepositoryService {
    /// Creates every model of the payload array in one transaction.
    ///
    /// Validation errors are keyed `<index>.<field>`; nothing is written when any item fails.
    pub async fn store_bulk(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        ensure_writable(repository)?;
        self.gate
            .authorize(repository, request, &Ability::StoreBulk, None)
            .await?;

        let fields = repository.fields();
        let items = bulk_objects(payload_array(request)?)?;
        let mut errors = ValidationErrors::new();
        for (index, item) in items.iter().enumerate() {
            errors.merge_prefixed(
                &index.to_string(),
                validate_payload(&fields, item, ValidationMode::Store),
            );
        }
        errors.into_result()?;

        let batch_id = Uuid::new_v4();
        let transaction = self.store.begin().await?;
        let mut models = Vec::with_capacity(items.len());
        for item in &items {
            let model = self
                .insert_model(
                    transaction.as_ref(),
                    repository,
                    fillable_attributes(&fields, item),
                )
                .await?;
            self.write_log(
                transaction.as_ref(),
                Some(ActionLog::for_stored(
                    batch_id,
                    request.viewer(),
                    repository.uri_key(),
                    &model,
                )),
            )
            .await?;
            models.push(model);
        }
        transaction.commit().await?;

        info!(
            repository = repository.uri_key(),
            models = models.len(),
            "stored models in bulk"
        );

        let data = models
            .iter()
            .map(|model| self.serialize(repository, request, model))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(json!({ "data": data }))
    }

    /// Updates every model of the payload array; each item carries its key.
    pub async fn update_bulk(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        ensure_writable(repository)?;

        let fields = repository.fields();
        let items = bulk_objects(payload_array(request)?)?;
        let mut errors = ValidationErrors::new();
        let mut identifiers = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let identifier = item
                .get(repository.key_column())
                .and_then(|value| repository.key_type().normalize_identifier(value));
            match identifier {
                Some(identifier) => identifiers.push(identifier_text(&identifier)),
                None => errors.add(
                    format!("{index}.{}", repository.key_column()),
                    format!("The {} field is required.", repository.key_column()),
                ),
            }
            errors.merge_prefixed(
                &index.to_string(),
                validate_payload(&fields, item, ValidationMode::Update),
            );
        }
        errors.into_result()?;

        let batch_id = Uuid::new_v4();
        let transaction = self.store.begin().await?;
        let mut updated = Vec::with_capacity(items.len());
        for (item, identifier) in items.iter().zip(&identifiers) {
            let query = self.show_query(repository, request)?;
            let model = first_or_fail(transaction.as_ref(), repository, query, identifier).await?;
            self.gate
                .authorize(repository, request, &Ability::UpdateBulk, Some(&model))
                .await?;

            let after = self
                .update_model(
                    transaction.as_ref(),
                    repository,
                    &model,
                    fillable_attributes(&fields, item),
                )
                .await?;
            self.write_log(
                transaction.as_ref(),
                updated_log(batch_id, request, repository, &model, &after),
            )
            .await?;
            updated.push(after);
        }
        transaction.commit().await?;

        info!(
            repository = repository.uri_key(),
            models = updated.len(),
            "updated models in bulk"
        );

        let data = updated
            .iter()
            .map(|model| self.serialize(repository, request, model))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(json!({ "data": data }))
    }

    /// Deletes the models whose keys the payload array lists.
    pub async fn destroy_bulk(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        ensure_writable(repository)?;

        let keys = payload_array(request)?
            .iter()
            .map(|value| repository.key_type().normalize_identifier(value))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                AppError::Validation("bulk delete expects a list of model keys".to_owned())
            })?;
        if keys.is_empty() {
            return Ok(json!({ "data": { "deleted": 0 } }));
        }

        let batch_id = Uuid::new_v4();
        let transaction = self.store.begin().await?;
        let mut query = self.show_query(repository, request)?;
        query.where_keys_in(keys, repository.key_type());
        let models = hydrate(repository, transaction.fetch(&query).await?)?;

        for model in &models {
            self.gate
                .authorize(repository, request, &Ability::DeleteBulk, Some(model))
                .await?;
        }

        for model in &models {
            self.delete_model(transaction.as_ref(), repository, model)
                .await?;
            self.write_log(
                transaction.as_ref(),
                Some(ActionLog::for_deleted(
                    batch_id,
                    request.viewer(),
                    repository.uri_key(),
                    model,
                )),
            )
            .await?;
        }
        transaction.commit().await?;

        info!(
            repository = repository.uri_key(),
            models = models.len(),
            "deleted models in bulk"
        );

        Ok(json!({ "data": { "deleted": models.len() } }))
    }
}

fn bulk_objects(items: Vec<Value>) -> AppResult<Vec<Row>> {
    let mut errors = ValidationErrors::new();
    let mut objects = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(object) => objects.push(object),
            _ => errors.add(index.to_string(), "The item must be an object."),
        }
    }
    errors.into_result()?;
    Ok(objects)
}

fn identifier_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
