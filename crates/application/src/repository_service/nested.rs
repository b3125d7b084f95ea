use std::sync::Arc;

use restify_core::{AppError, AppResult};
use restify_domain::{Ability, ActionLog, KeyType, Model, Row};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{RepositoryService, ensure_writable, payload_object};
use crate::loading::first_or_fail;
use crate::query::ModelQuery;
use crate::repository::{
    Relation, RelationKind, Repository, ValidationMode, fillable_attributes, validate_payload,
};
use crate::RestifyRequest;

/// Parent model and relation a nested route works through.
pub(super) struct NestedScope {
    pub(super) relation: Relation,
    pub(super) related: Arc<dyn Repository>,
    pub(super) parent: Model,
    pub(super) parent_key_type: KeyType,
}

impl NestedScope {
    fn scoped_query(
        &self,
        service: &RepositoryService,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<ModelQuery> {
        let mut query = service.show_query(self.related.as_ref(), request)?;
        self.relation.scope_to_parent(
            parent_repository,
            &self.parent,
            self.related.as_ref(),
            &mut query,
        );
        Ok(query)
    }
}

impl RepositoryService {
    /// Lists the related models of a parent model.
    pub async fn nested_index(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
    ) -> AppResult<Value> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let related = scope.related.as_ref();
        self.gate
            .authorize(related, request, &Ability::ViewAny, None)
            .await?;

        let mut query = self.search.search(request, related)?;
        scope
            .relation
            .scope_to_parent(parent_repository, &scope.parent, related, &mut query);
        self.paginate(related, request, query).await
    }

    /// Shows one related model of a parent model.
    pub async fn nested_show(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
        identifier: &str,
    ) -> AppResult<Value> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let related = scope.related.as_ref();
        let query = scope.scoped_query(self, parent_repository, request)?;
        let model = first_or_fail(self.store.as_ref(), related, query, identifier).await?;
        self.gate
            .authorize(related, request, &Ability::Show, Some(&model))
            .await?;

        Ok(json!({ "data": self.serialize_with_meta(related, request, &model).await? }))
    }

    /// Creates a model through the parent's relation.
    ///
    /// Has-one and has-many relations receive the parent key as foreign key; belongs-to-many
    /// relations also get a pivot row.
    pub async fn nested_store(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
    ) -> AppResult<Value> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let related = scope.related.as_ref();
        ensure_writable(related)?;
        self.gate
            .authorize(related, request, &Ability::Store, None)
            .await?;

        let mut payload = payload_object(request)?;
        match scope.relation.kind() {
            RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                payload.insert(foreign_key.clone(), scope.parent.key().to_value());
            }
            RelationKind::BelongsToMany(_) => {}
            RelationKind::BelongsTo { .. } => {
                return Err(AppError::Validation(format!(
                    "relation '{}' cannot create models through its parent",
                    scope.relation.name()
                )));
            }
        }

        let fields = related.fields();
        validate_payload(&fields, &payload, ValidationMode::Store).into_result()?;

        let mut attributes = fillable_attributes(&fields, &payload);
        if let RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } =
            scope.relation.kind()
        {
            attributes.insert(foreign_key.clone(), scope.parent.key().to_value());
        }

        let transaction = self.store.begin().await?;
        let model = self
            .insert_model(transaction.as_ref(), related, attributes)
            .await?;
        if let RelationKind::BelongsToMany(pivot) = scope.relation.kind() {
            let mut row = pivot_fields_from(request, &pivot.pivot_fields);
            row.insert(
                pivot.foreign_pivot_key.clone(),
                scope.parent.key().to_value(),
            );
            row.insert(pivot.related_pivot_key.clone(), model.key().to_value());
            transaction.insert(&pivot.table, row).await?;
        }
        self.write_log(
            transaction.as_ref(),
            Some(ActionLog::for_stored(
                Uuid::new_v4(),
                request.viewer(),
                related.uri_key(),
                &model,
            )),
        )
        .await?;
        transaction.commit().await?;

        info!(
            repository = related.uri_key(),
            parent = %scope.parent.key(),
            relation = scope.relation.name(),
            model = %model.key(),
            "stored related model"
        );

        Ok(json!({ "data": self.serialize(related, request, &model)? }))
    }

    /// Updates one related model of a parent model.
    pub async fn nested_update(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
        identifier: &str,
    ) -> AppResult<Value> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let query = scope.scoped_query(self, parent_repository, request)?;
        self.update_through(scope.related.as_ref(), request, query, identifier)
            .await
    }

    /// Deletes one related model of a parent model.
    pub async fn nested_destroy(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
        identifier: &str,
    ) -> AppResult<()> {
        let scope = self
            .nested_scope(parent_repository, request, parent_identifier, relation)
            .await?;
        let query = scope.scoped_query(self, parent_repository, request)?;
        self.destroy_through(scope.related.as_ref(), request, query, identifier)
            .await
    }

    /// Resolves the relation by name (or related uri key) and loads the visible parent model.
    pub(super) async fn nested_scope(
        &self,
        parent_repository: &dyn Repository,
        request: &RestifyRequest,
        parent_identifier: &str,
        relation: &str,
    ) -> AppResult<NestedScope> {
        self.gate
            .authorize_repository(parent_repository, request)
            .await?;

        let relation = parent_repository
            .relation(relation)
            .or_else(|| {
                parent_repository
                    .relations()
                    .into_iter()
                    .find(|candidate| candidate.repository() == relation)
            })
            .filter(|relation| relation.authorized_to_see(request))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "repository '{}' has no relation '{relation}'",
                    parent_repository.uri_key()
                ))
            })?;
        let related = self.registry.related(&relation)?;
        self.gate
            .authorize_repository(related.as_ref(), request)
            .await?;

        let query = self.show_query(parent_repository, request)?;
        let parent = first_or_fail(
            self.store.as_ref(),
            parent_repository,
            query,
            parent_identifier,
        )
        .await?;
        self.gate
            .authorize(parent_repository, request, &Ability::Show, Some(&parent))
            .await?;

        Ok(NestedScope {
            relation,
            related,
            parent,
            parent_key_type: parent_repository.key_type(),
        })
    }
}

/// Extra pivot attributes read from the request.
pub(super) fn pivot_fields_from(
    request: &RestifyRequest,
    pivot_fields: &[String],
) -> Row {
    pivot_fields
        .iter()
        .filter_map(|field| {
            request
                .input(field)
                .filter(|value| !value.is_null())
                .map(|value| (field.clone(), value))
        })
        .collect()
}
