use restify_core::{AppError, AppResult};
use restify_domain::Model;

use super::Repository;
use crate::filters::Visibility;
use crate::query::{ColumnRef, Condition, Join, ModelQuery, RelationLink};
use crate::RestifyRequest;

/// Pivot table configuration of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotDefinition {
    /// Pivot table.
    pub table: String,
    /// Pivot column holding the parent key.
    pub foreign_pivot_key: String,
    /// Pivot column holding the related key.
    pub related_pivot_key: String,
    /// Reject attaching an already attached model.
    pub unique: bool,
    /// Extra pivot columns accepted on attach.
    pub pivot_fields: Vec<String>,
}

/// Relation cardinality and keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Parent row holds the related key in `foreign_key`.
    BelongsTo {
        /// Column on the parent table.
        foreign_key: String,
    },
    /// One related row holds the parent key in `foreign_key`.
    HasOne {
        /// Column on the related table.
        foreign_key: String,
    },
    /// Related rows hold the parent key in `foreign_key`.
    HasMany {
        /// Column on the related table.
        foreign_key: String,
    },
    /// Rows are linked through a pivot table.
    BelongsToMany(PivotDefinition),
}

/// Relation declared by a repository towards another registered repository.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    repository: String,
    kind: RelationKind,
    visibility: Visibility,
}

impl Relation {
    /// Declares a to-one relation through a key on the parent table.
    #[must_use]
    pub fn belongs_to(
        name: impl Into<String>,
        repository: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            repository,
            RelationKind::BelongsTo {
                foreign_key: foreign_key.into(),
            },
        )
    }

    /// Declares a to-one relation through a key on the related table.
    #[must_use]
    pub fn has_one(
        name: impl Into<String>,
        repository: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            repository,
            RelationKind::HasOne {
                foreign_key: foreign_key.into(),
            },
        )
    }

    /// Declares a to-many relation through a key on the related table.
    #[must_use]
    pub fn has_many(
        name: impl Into<String>,
        repository: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            repository,
            RelationKind::HasMany {
                foreign_key: foreign_key.into(),
            },
        )
    }

    /// Declares a many-to-many relation through a pivot table.
    #[must_use]
    pub fn belongs_to_many(
        name: impl Into<String>,
        repository: impl Into<String>,
        pivot_table: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            repository,
            RelationKind::BelongsToMany(PivotDefinition {
                table: pivot_table.into(),
                foreign_pivot_key: foreign_pivot_key.into(),
                related_pivot_key: related_pivot_key.into(),
                unique: false,
                pivot_fields: Vec::new(),
            }),
        )
    }

    fn new(name: impl Into<String>, repository: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            repository: repository.into(),
            kind,
            visibility: Visibility::always(),
        }
    }

    /// Rejects attaching a model that is already attached.
    #[must_use]
    pub fn unique(mut self) -> Self {
        if let RelationKind::BelongsToMany(pivot) = &mut self.kind {
            pivot.unique = true;
        }
        self
    }

    /// Accepts extra pivot columns on attach.
    #[must_use]
    pub fn with_pivot_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let RelationKind::BelongsToMany(pivot) = &mut self.kind {
            pivot.pivot_fields = fields.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Restricts who may load or traverse the relation.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }

    /// Returns the relation name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the uri key of the related repository.
    #[must_use]
    pub fn repository(&self) -> &str {
        self.repository.as_str()
    }

    /// Returns the relation kind.
    #[must_use]
    pub fn kind(&self) -> &RelationKind {
        &self.kind
    }

    /// Returns the pivot definition of many-to-many relations.
    #[must_use]
    pub fn pivot(&self) -> Option<&PivotDefinition> {
        match &self.kind {
            RelationKind::BelongsToMany(pivot) => Some(pivot),
            _ => None,
        }
    }

    /// Returns whether the relation resolves to at most one model.
    #[must_use]
    pub fn is_to_one(&self) -> bool {
        matches!(
            self.kind,
            RelationKind::BelongsTo { .. } | RelationKind::HasOne { .. }
        )
    }

    /// Returns whether the request may traverse the relation.
    #[must_use]
    pub fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    /// Builds an existence predicate over related rows, evaluated from the parent scope.
    #[must_use]
    pub fn exists_condition(
        &self,
        parent: &dyn Repository,
        related: &dyn Repository,
        condition: Option<Condition>,
    ) -> Condition {
        match &self.kind {
            RelationKind::BelongsTo { foreign_key } => Condition::RelatedExists {
                link: RelationLink {
                    table: related.table().to_owned(),
                    related_column: related.key_column().to_owned(),
                    parent_column: ColumnRef::root(foreign_key.clone()),
                },
                condition: condition.map(Box::new),
            },
            RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                Condition::RelatedExists {
                    link: RelationLink {
                        table: related.table().to_owned(),
                        related_column: foreign_key.clone(),
                        parent_column: ColumnRef::root(parent.key_column().to_owned()),
                    },
                    condition: condition.map(Box::new),
                }
            }
            RelationKind::BelongsToMany(pivot) => {
                let related_exists = Condition::RelatedExists {
                    link: RelationLink {
                        table: related.table().to_owned(),
                        related_column: related.key_column().to_owned(),
                        parent_column: ColumnRef::root(pivot.related_pivot_key.clone()),
                    },
                    condition: condition.map(Box::new),
                };
                Condition::RelatedExists {
                    link: RelationLink {
                        table: pivot.table.clone(),
                        related_column: pivot.foreign_pivot_key.clone(),
                        parent_column: ColumnRef::root(parent.key_column().to_owned()),
                    },
                    condition: Some(Box::new(related_exists)),
                }
            }
        }
    }

    /// Builds the left join used to order by a related column; to-one relations only.
    #[must_use]
    pub fn join(&self, parent: &dyn Repository, related: &dyn Repository) -> Option<Join> {
        match &self.kind {
            RelationKind::BelongsTo { foreign_key } => Some(Join {
                alias: self.name.clone(),
                table: related.table().to_owned(),
                column: related.key_column().to_owned(),
                parent_column: ColumnRef::root(foreign_key.clone()),
            }),
            RelationKind::HasOne { foreign_key } => Some(Join {
                alias: self.name.clone(),
                table: related.table().to_owned(),
                column: foreign_key.clone(),
                parent_column: ColumnRef::root(parent.key_column().to_owned()),
            }),
            RelationKind::HasMany { .. } | RelationKind::BelongsToMany(_) => None,
        }
    }

    /// Restricts a query over the related repository to models related to `parent`.
    pub fn scope_to_parent(
        &self,
        parent_repository: &dyn Repository,
        parent: &Model,
        related: &dyn Repository,
        query: &mut ModelQuery,
    ) {
        match &self.kind {
            RelationKind::BelongsTo { foreign_key } => {
                let key = parent.attribute(foreign_key).cloned().unwrap_or_default();
                let keys = if key.is_null() { Vec::new() } else { vec![key] };
                query.where_keys_in(keys, related.key_type());
            }
            RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                query.filter(Condition::eq(
                    foreign_key.clone(),
                    parent.key().to_value(),
                    parent_repository.key_type().field_type(),
                ));
            }
            RelationKind::BelongsToMany(pivot) => {
                query.filter(Condition::RelatedExists {
                    link: RelationLink {
                        table: pivot.table.clone(),
                        related_column: pivot.related_pivot_key.clone(),
                        parent_column: ColumnRef::root(related.key_column().to_owned()),
                    },
                    condition: Some(Box::new(Condition::eq(
                        pivot.foreign_pivot_key.clone(),
                        parent.key().to_value(),
                        parent_repository.key_type().field_type(),
                    ))),
                });
            }
        }
    }

    /// Returns the pivot definition or fails for relations without one.
    pub fn require_pivot(&self) -> AppResult<&PivotDefinition> {
        self.pivot().ok_or_else(|| {
            AppError::Validation(format!(
                "relation '{}' does not support attaching models",
                self.name
            ))
        })
    }
}
