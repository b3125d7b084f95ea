use std::collections::BTreeSet;

use restify_core::{AppError, AppResult, ValidationErrors};
use restify_domain::{Ability, ModelKey, Row};
use serde_json::{Value, json};
use tracing::info;

use super::RepositoryService;
use super::nested::{NestedScope, pivot_fields_from};
use crate::query::{ColumnRef, Condition, ModelQuery};
use crate::repository::{PivotDefinition, Repository};
use crate::store_ports::{ModelReader, StoreTransaction};
use crate::RestifyRequest;

impl RepositoryService {
    /// Attaches related models to a parent through a belongs-to-many relation.
    ///
    /// Keys are read from the payload field named after the relation, or `related`. A unique
    /// relation rejects keys that are already attached and nothing is written.
    pub async fn attach(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
    ) -> AppResult<Value> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let pivot = scope.relation.require_pivot()?;
        self.gate
            .authorize(
                parent_repository,
                request,
                &Ability::Attach(scope.relation.name().to_owned()),
                Some(&scope.parent),
            )
            .await?;

        let keys = relation_keys(request, &scope, true)?;
        let transaction = self.store.begin().await?;
        let rows = self
            .attach_keys(transaction.as_ref(), request, &scope, pivot, &keys)
            .await?;
        transaction.commit().await?;

        info!(
            repository = parent_repository.uri_key(),
            parent = %scope.parent.key(),
            relation = scope.relation.name(),
            attached = rows.len(),
            "attached related models"
        );

        Ok(json!({ "data": rows }))
    }

    /// Detaches related models from a parent.
    pub async fn detach(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
    ) -> AppResult<Value> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let pivot = scope.relation.require_pivot()?;
        self.gate
            .authorize(
                parent_repository,
                request,
                &Ability::Detach(scope.relation.name().to_owned()),
                Some(&scope.parent),
            )
            .await?;

        let keys = relation_keys(request, &scope, true)?;
        let transaction = self.store.begin().await?;
        let detached = transaction
            .delete(&pivot_query(&scope, pivot, Some(keys)))
            .await?;
        transaction.commit().await?;

        info!(
            repository = parent_repository.uri_key(),
            parent = %scope.parent.key(),
            relation = scope.relation.name(),
            detached,
            "detached related models"
        );

        Ok(json!({ "data": { "detached": detached } }))
    }

    /// Makes the submitted keys the exact set of attached models.
    pub async fn sync(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
    ) -> AppResult<Value> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let pivot = scope.relation.require_pivot()?;
        self.gate
            .authorize(
                parent_repository,
                request,
                &Ability::Sync(scope.relation.name().to_owned()),
                Some(&scope.parent),
            )
            .await?;

        let wanted = relation_keys(request, &scope, false)?;
        let transaction = self.store.begin().await?;

        let current = attached_keys(transaction.as_ref(), &scope, pivot).await?;
        let wanted_keys = wanted
            .iter()
            .map(ModelKey::from_value)
            .collect::<AppResult<BTreeSet<_>>>()?;

        let detach = current
            .iter()
            .filter(|key| !wanted_keys.contains(*key))
            .map(ModelKey::to_value)
            .collect::<Vec<_>>();
        let attach = wanted
            .into_iter()
            .filter(|value| {
                ModelKey::from_value(value).is_ok_and(|key| !current.contains(&key))
            })
            .collect::<Vec<_>>();

        if !detach.is_empty() {
            transaction
                .delete(&pivot_query(&scope, pivot, Some(detach.clone())))
                .await?;
        }
        self.attach_keys(transaction.as_ref(), request, &scope, pivot, &attach)
            .await?;
        transaction.commit().await?;

        info!(
            repository = parent_repository.uri_key(),
            parent = %scope.parent.key(),
            relation = scope.relation.name(),
            attached = attach.len(),
            detached = detach.len(),
            "synchronized related models"
        );

        Ok(json!({ "data": { "attached": attach, "detached": detach } }))
    }

    async fn attach_keys(
        &self,
        transaction: &dyn StoreTransaction,
        request: &RestifyRequest,
        scope: &NestedScope,
        pivot: &PivotDefinition,
        keys: &[Value],
    ) -> AppResult<Vec<Value>> {
        let name = scope.relation.name();
        let related = scope.related.as_ref();
        let mut rows = Vec::with_capacity(keys.len());

        for key in keys {
            let mut exists = self.show_query(related, request)?;
            exists.where_key(key.clone(), related.key_type());
            if transaction.count(&exists).await? == 0 {
                let mut errors = ValidationErrors::new();
                errors.add(name, format!("The selected {name} is invalid."));
                return Err(AppError::InvalidFields(errors));
            }

            if pivot.unique
                && transaction
                    .count(&pivot_query(scope, pivot, Some(vec![key.clone()])))
                    .await?
                    > 0
            {
                let mut errors = ValidationErrors::new();
                errors.add(name, format!("The {name} is already attached."));
                return Err(AppError::InvalidFields(errors));
            }

            let mut row: Row = pivot_fields_from(request, &pivot.pivot_fields);
            row.insert(
                pivot.foreign_pivot_key.clone(),
                scope.parent.key().to_value(),
            );
            row.insert(pivot.related_pivot_key.clone(), key.clone());
            rows.push(Value::Object(transaction.insert(&pivot.table, row).await?));
        }

        Ok(rows)
    }
}

/// Reads related keys from the relation-named field or `related`.
fn relation_keys(
    request: &RestifyRequest,
    scope: &NestedScope,
    required: bool,
) -> AppResult<Vec<Value>> {
    let name = scope.relation.name();
    let key_type = scope.related.key_type();
    let raw = request
        .input(name)
        .or_else(|| request.input("related"))
        .unwrap_or(Value::Null);

    let values = match raw {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut keys: Vec<Value> = Vec::with_capacity(values.len());
    for value in &values {
        let key = key_type.normalize_identifier(value).ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add(name, format!("The selected {name} is invalid."));
            AppError::InvalidFields(errors)
        })?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    if required && keys.is_empty() {
        let mut errors = ValidationErrors::new();
        errors.add(name, format!("The {name} field is required."));
        return Err(AppError::InvalidFields(errors));
    }

    Ok(keys)
}

/// Pivot rows of the parent, optionally narrowed to related keys.
fn pivot_query(
    scope: &NestedScope,
    pivot: &PivotDefinition,
    related_keys: Option<Vec<Value>>,
) -> ModelQuery {
    let mut query = ModelQuery::new(pivot.table.clone(), pivot.foreign_pivot_key.clone());
    query.filter(Condition::eq(
        pivot.foreign_pivot_key.clone(),
        scope.parent.key().to_value(),
        scope.parent_key_type.field_type(),
    ));
    if let Some(values) = related_keys {
        query.filter(Condition::In {
            column: ColumnRef::root(pivot.related_pivot_key.clone()),
            values,
            field_type: scope.related.key_type().field_type(),
            negated: false,
        });
    }
    query
}

async fn attached_keys(
    reader: &dyn ModelReader,
    scope: &NestedScope,
    pivot: &PivotDefinition,
) -> AppResult<BTreeSet<ModelKey>> {
    reader
        .fetch(&pivot_query(scope, pivot, None))
        .await?
        .iter()
        .filter_map(|row| row.get(&pivot.related_pivot_key))
        .map(ModelKey::from_value)
        .collect()
}
