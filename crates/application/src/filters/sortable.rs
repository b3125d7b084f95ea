use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use restify_core::AppResult;
use restify_domain::SortDirection;

use super::Visibility;
use crate::query::{ColumnRef, Join, ModelQuery};
use crate::RestifyRequest;

/// Closure applying a custom ordering in the requested direction.
pub type SortCallback =
    Arc<dyn Fn(&RestifyRequest, &mut ModelQuery, SortDirection) -> AppResult<()> + Send + Sync>;

/// Declared meaning of a sort key.
#[derive(Clone)]
pub enum SortDefinition {
    /// Root column.
    Column(String),
    /// Column of a to-one relation, joined under the relation name.
    Related {
        /// Declared relation name.
        relation: String,
        /// Column on the related table.
        column: String,
    },
    /// Fully configured sortable filter.
    Filter(SortableFilter),
    /// Closure.
    Callback(SortCallback),
}

impl SortDefinition {
    /// Sorts by a root column.
    #[must_use]
    pub fn column(column: impl Into<String>) -> Self {
        Self::Column(column.into())
    }

    /// Sorts by a related column.
    #[must_use]
    pub fn related(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Related {
            relation: relation.into(),
            column: column.into(),
        }
    }

    /// Sorts through a closure.
    #[must_use]
    pub fn callback<F>(callback: F) -> Self
    where
        F: Fn(&RestifyRequest, &mut ModelQuery, SortDirection) -> AppResult<()>
            + Send
            + Sync
            + 'static,
    {
        Self::Callback(Arc::new(callback))
    }
}

impl Debug for SortDefinition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Column(column) => formatter.debug_tuple("Column").field(column).finish(),
            Self::Related { relation, column } => formatter
                .debug_struct("Related")
                .field("relation", relation)
                .field("column", column)
                .finish(),
            Self::Filter(filter) => formatter.debug_tuple("Filter").field(filter).finish(),
            Self::Callback(_) => formatter.write_str("Callback"),
        }
    }
}

/// Directional ordering on a column, optionally through a to-one relation.
#[derive(Debug, Clone)]
pub struct SortableFilter {
    key: String,
    column: String,
    direction: SortDirection,
    relation: Option<String>,
    visibility: Visibility,
}

impl SortableFilter {
    /// Creates an ascending sort whose column equals its key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            column: key.clone(),
            key,
            direction: SortDirection::Asc,
            relation: None,
            visibility: Visibility::always(),
        }
    }

    /// Targets an explicit column.
    #[must_use]
    pub fn on_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Orders through a to-one relation.
    #[must_use]
    pub fn using_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Sets the direction.
    #[must_use]
    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Restricts who may see the sort in metadata listings.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }

    /// Returns the request key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Returns the ordered column.
    #[must_use]
    pub fn column(&self) -> &str {
        self.column.as_str()
    }

    /// Returns the direction.
    #[must_use]
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Returns the relation the column belongs to.
    #[must_use]
    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    /// Returns whether the request may see the sort.
    #[must_use]
    pub fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    /// Orders the query; related sorts require the join resolved for their relation.
    pub fn apply(&self, query: &mut ModelQuery, join: Option<Join>) {
        let column = match join {
            Some(join) => {
                let alias = join.alias.clone();
                query.join(join);
                ColumnRef::scoped(alias, self.column.clone())
            }
            None => ColumnRef::root(self.column.clone()),
        };
        query.order_by(column, self.direction);
    }
}
