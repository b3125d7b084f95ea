use restify_core::AppResult;
use restify_domain::{Ability, Model, RelationValue, Row};
use serde_json::{Map, Value, json};

use super::RepositoryService;
use crate::repository::Repository;
use crate::RestifyRequest;

impl RepositoryService {
    /// Serializes a model with its loaded relations.
    pub(super) fn serialize(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        model: &Model,
    ) -> AppResult<Value> {
        let mut document = Map::new();
        document.insert("id".to_owned(), model.key().to_value());
        document.insert(
            "type".to_owned(),
            Value::String(repository.uri_key().to_owned()),
        );
        document.insert(
            "attributes".to_owned(),
            Value::Object(visible_attributes(repository, request, model)),
        );

        if !model.relations().is_empty() {
            let mut relationships = Map::new();
            for (name, value) in model.relations() {
                let Some(relation) = repository.relation(name) else {
                    continue;
                };
                let related = self.registry.related(&relation)?;
                let serialized = match value {
                    RelationValue::One(Some(model)) => {
                        self.serialize(related.as_ref(), request, model)?
                    }
                    RelationValue::One(None) => Value::Null,
                    RelationValue::Many(models) => Value::Array(
                        models
                            .iter()
                            .map(|model| self.serialize(related.as_ref(), request, model))
                            .collect::<AppResult<Vec<_>>>()?,
                    ),
                };
                relationships.insert(name.clone(), serialized);
            }
            document.insert("relationships".to_owned(), Value::Object(relationships));
        }

        Ok(Value::Object(document))
    }

    /// Serializes a model with per-item authorization meta.
    pub(super) async fn serialize_with_meta(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        model: &Model,
    ) -> AppResult<Value> {
        let mut document = self.serialize(repository, request, model)?;
        let authorized_to_show = self
            .gate
            .allows(repository, request, &Ability::Show, Some(model))
            .await?;
        let authorized_to_update = !repository.read_only()
            && self
                .gate
                .allows(repository, request, &Ability::Update, Some(model))
                .await?;
        let authorized_to_delete = !repository.read_only()
            && self
                .gate
                .allows(repository, request, &Ability::Delete, Some(model))
                .await?;
        let meta = json!({
            "authorizedToShow": authorized_to_show,
            "authorizedToUpdate": authorized_to_update,
            "authorizedToDelete": authorized_to_delete,
        });

        if let Value::Object(object) = &mut document {
            object.insert("meta".to_owned(), meta);
        }

        Ok(document)
    }
}

/// Returns attributes the request may read, excluding the key column.
fn visible_attributes(repository: &dyn Repository, request: &RestifyRequest, model: &Model) -> Row {
    let fields = repository.fields();
    model
        .attributes()
        .iter()
        .filter(|(name, _)| name.as_str() != repository.key_column())
        .filter(|(name, _)| {
            fields.is_empty()
                || fields
                    .iter()
                    .any(|field| field.name() == name.as_str() && field.is_visible(request))
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
