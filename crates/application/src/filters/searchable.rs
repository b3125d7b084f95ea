use super::Visibility;
use crate::RestifyRequest;

/// Column included in `search` term matching.
#[derive(Debug, Clone)]
pub struct SearchableFilter {
    column: String,
    relation: Option<String>,
    visibility: Visibility,
}

impl SearchableFilter {
    /// Searches a root column.
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            relation: None,
            visibility: Visibility::always(),
        }
    }

    /// Searches a column of a declared relation.
    #[must_use]
    pub fn related(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            relation: Some(relation.into()),
            visibility: Visibility::always(),
        }
    }

    /// Restricts who may search the column.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }

    /// Returns the searched column.
    #[must_use]
    pub fn column(&self) -> &str {
        self.column.as_str()
    }

    /// Returns the relation, if the column belongs to a related table.
    #[must_use]
    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    /// Returns the client-facing key (`column` or `relation.column`).
    #[must_use]
    pub fn key(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{relation}.{}", self.column),
            None => self.column.clone(),
        }
    }

    /// Returns whether the request may search the column.
    #[must_use]
    pub fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }
}
