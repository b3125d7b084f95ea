use std::collections::BTreeMap;

use restify_core::AppResult;
use restify_domain::{Ability, Model, ModelKey, RelationValue, Row, SortDirection};
use serde_json::Value;
use tracing::debug;

use super::RepositoryService;
use crate::loading::hydrate;
use crate::query::{ColumnRef, Condition, ModelQuery};
use crate::repository::{RelationKind, Repository};
use crate::store_ports::ModelReader;
use crate::RestifyRequest;

impl RepositoryService {
    /// Loads the named relations for every model with one query per relation.
    ///
    /// Related models the viewer may not show are left out.
    pub(super) async fn load_relations(
        &self,
        reader: &dyn ModelReader,
        repository: &dyn Repository,
        request: &RestifyRequest,
        models: &mut [Model],
        names: &[String],
    ) -> AppResult<()> {
        if models.is_empty() {
            return Ok(());
        }

        for name in names {
            let Some(relation) = repository.relation(name) else {
                continue;
            };
            if !relation.authorized_to_see(request) {
                continue;
            }

            let related = self.registry.related(&relation)?;
            let mut query = related.new_query();
            related.main_query(request, &mut query)?;

            match relation.kind() {
                RelationKind::BelongsTo { foreign_key } => {
                    let keys = distinct_values(
                        models
                            .iter()
                            .filter_map(|model| model.attribute(foreign_key).cloned()),
                    );
                    let by_key = if keys.is_empty() {
                        BTreeMap::new()
                    } else {
                        query.where_keys_in(keys, related.key_type());
                        self.showable(related.as_ref(), request, reader.fetch(&query).await?)
                            .await?
                            .into_iter()
                            .map(|model| (model.key().clone(), model))
                            .collect::<BTreeMap<_, _>>()
                    };

                    for model in models.iter_mut() {
                        let target = model
                            .attribute(foreign_key)
                            .and_then(|value| ModelKey::from_value(value).ok())
                            .and_then(|key| by_key.get(&key).cloned())
                            .map(Box::new);
                        model.set_relation(name.clone(), RelationValue::One(target));
                    }
                }
                RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                    query.filter(Condition::In {
                        column: ColumnRef::root(foreign_key.clone()),
                        values: models.iter().map(|model| model.key().to_value()).collect(),
                        field_type: repository.key_type().field_type(),
                        negated: false,
                    });
                    query.order_by(ColumnRef::root(related.key_column()), SortDirection::Asc);

                    let mut grouped: BTreeMap<ModelKey, Vec<Model>> = BTreeMap::new();
                    for child in self
                        .showable(related.as_ref(), request, reader.fetch(&query).await?)
                        .await?
                    {
                        if let Some(parent_key) = child
                            .attribute(foreign_key)
                            .and_then(|value| ModelKey::from_value(value).ok())
                        {
                            grouped.entry(parent_key).or_default().push(child);
                        }
                    }

                    let to_one = relation.is_to_one();
                    for model in models.iter_mut() {
                        let children = grouped.remove(model.key()).unwrap_or_default();
                        let value = if to_one {
                            RelationValue::One(children.into_iter().next().map(Box::new))
                        } else {
                            RelationValue::Many(children)
                        };
                        model.set_relation(name.clone(), value);
                    }
                }
                RelationKind::BelongsToMany(pivot) => {
                    let mut pivot_query =
                        ModelQuery::new(pivot.table.clone(), pivot.foreign_pivot_key.clone());
                    pivot_query.filter(Condition::In {
                        column: ColumnRef::root(pivot.foreign_pivot_key.clone()),
                        values: models.iter().map(|model| model.key().to_value()).collect(),
                        field_type: repository.key_type().field_type(),
                        negated: false,
                    });
                    let pivot_rows = reader.fetch(&pivot_query).await?;

                    let related_keys = distinct_values(
                        pivot_rows
                            .iter()
                            .filter_map(|row| row.get(&pivot.related_pivot_key).cloned()),
                    );
                    let by_key = if related_keys.is_empty() {
                        BTreeMap::new()
                    } else {
                        query.where_keys_in(related_keys, related.key_type());
                        self.showable(related.as_ref(), request, reader.fetch(&query).await?)
                            .await?
                            .into_iter()
                            .map(|model| (model.key().clone(), model))
                            .collect::<BTreeMap<_, _>>()
                    };

                    let mut grouped: BTreeMap<ModelKey, Vec<Model>> = BTreeMap::new();
                    for row in &pivot_rows {
                        let parent_key = row
                            .get(&pivot.foreign_pivot_key)
                            .and_then(|value| ModelKey::from_value(value).ok());
                        let related_model = row
                            .get(&pivot.related_pivot_key)
                            .and_then(|value| ModelKey::from_value(value).ok())
                            .and_then(|key| by_key.get(&key).cloned());
                        if let (Some(parent_key), Some(related_model)) = (parent_key, related_model)
                        {
                            grouped.entry(parent_key).or_default().push(related_model);
                        }
                    }

                    for model in models.iter_mut() {
                        let children = grouped.remove(model.key()).unwrap_or_default();
                        model.set_relation(name.clone(), RelationValue::Many(children));
                    }
                }
            }
        }

        Ok(())
    }

    async fn showable(
        &self,
        related: &dyn Repository,
        request: &RestifyRequest,
        rows: Vec<Row>,
    ) -> AppResult<Vec<Model>> {
        let mut visible = Vec::new();
        for model in hydrate(related, rows)? {
            if self
                .gate
                .allows(related, request, &Ability::Show, Some(&model))
                .await?
            {
                visible.push(model);
            } else {
                debug!(
                    repository = related.uri_key(),
                    model = %model.key(),
                    "hiding related model the viewer may not show"
                );
            }
        }
        Ok(visible)
    }
}

fn distinct_values(values: impl Iterator<Item = Value>) -> Vec<Value> {
    let mut distinct: Vec<Value> = Vec::new();
    for value in values.filter(|value| !value.is_null()) {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    distinct
}
