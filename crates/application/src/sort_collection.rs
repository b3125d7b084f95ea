//! Normalization of `sort` directives against a repository's allow-list.

use restify_core::{AppError, AppResult};
use restify_domain::SortDirection;

use crate::filters::{SortCallback, SortDefinition, SortableFilter};
use crate::query::ModelQuery;
use crate::repository::{Repository, RepositoryRegistry};
use crate::RestifyRequest;

/// Ordering resolved from a declaration and the requested direction.
#[derive(Clone)]
pub enum HydratedSort {
    /// Column ordering, possibly through a relation join.
    Filter(SortableFilter),
    /// Closure ordering.
    Callback(SortCallback, SortDirection),
}

/// Requested sort directives in client order.
#[derive(Debug, Clone, Default)]
pub struct SortCollection {
    items: Vec<SortableFilter>,
}

impl SortCollection {
    /// Parses `sort=-created_at,title` into directional filters.
    #[must_use]
    pub fn from_request(request: &RestifyRequest) -> Self {
        let items = request
            .sort()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .filter_map(|token| {
                        let (key, direction) = match token.strip_prefix('-') {
                            Some(key) => (key, SortDirection::Desc),
                            None => (token.trim_start_matches('+'), SortDirection::Asc),
                        };
                        (!key.is_empty())
                            .then(|| SortableFilter::new(key).with_direction(direction))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { items }
    }

    /// Returns requested directives.
    #[must_use]
    pub fn items(&self) -> &[SortableFilter] {
        &self.items
    }

    /// Returns whether no directive was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keeps only directives on declared sort keys; others are dropped without error.
    #[must_use]
    pub fn allowed(self, declared: &[(String, SortDefinition)]) -> Self {
        let items = self
            .items
            .into_iter()
            .filter(|item| declared.iter().any(|(key, _)| key == item.key()))
            .collect();

        Self { items }
    }

    /// Resolves each directive to its declared definition, keeping the requested direction.
    pub fn hydrate_definition(
        self,
        declared: &[(String, SortDefinition)],
    ) -> AppResult<Vec<HydratedSort>> {
        self.items
            .into_iter()
            .filter_map(|item| {
                declared
                    .iter()
                    .find(|(key, _)| key == item.key())
                    .map(|(_, definition)| hydrate(item, definition))
            })
            .collect()
    }

    /// Applies hydrated directives in order, joining relations for cross-table sorts.
    pub fn apply(
        sorts: Vec<HydratedSort>,
        request: &RestifyRequest,
        repository: &dyn Repository,
        registry: &RepositoryRegistry,
        query: &mut ModelQuery,
    ) -> AppResult<()> {
        for sort in sorts {
            match sort {
                HydratedSort::Callback(callback, direction) => callback(request, query, direction)?,
                HydratedSort::Filter(filter) => {
                    let join = match filter.relation() {
                        Some(name) => {
                            let relation = repository.relation(name).ok_or_else(|| {
                                invalid_sort(filter.key(), "unknown relation")
                            })?;
                            let related = registry.related(&relation)?;
                            let join = relation
                                .join(repository, related.as_ref())
                                .ok_or_else(|| invalid_sort(filter.key(), "relation is not to-one"))?;
                            Some(join)
                        }
                        None => None,
                    };
                    filter.apply(query, join);
                }
            }
        }

        Ok(())
    }
}

fn hydrate(item: SortableFilter, definition: &SortDefinition) -> AppResult<HydratedSort> {
    let direction = item.direction();
    let filter = match definition {
        SortDefinition::Column(column) => item.on_column(column.clone()),
        SortDefinition::Related { relation, column } => {
            if relation.trim().is_empty() {
                return Err(invalid_sort(item.key(), "empty relation"));
            }
            item.on_column(column.clone()).using_relation(relation.clone())
        }
        SortDefinition::Filter(filter) => filter.clone().with_direction(direction),
        SortDefinition::Callback(callback) => {
            return Ok(HydratedSort::Callback(callback.clone(), direction));
        }
    };

    if filter.column().trim().is_empty() {
        return Err(invalid_sort(filter.key(), "empty column"));
    }

    Ok(HydratedSort::Filter(filter))
}

fn invalid_sort(key: &str, reason: &str) -> AppError {
    AppError::Internal(format!("Invalid argument to sort '{key}': {reason}"))
}

#[cfg(test)]
mod tests {
    use restify_core::AppError;
    use restify_domain::SortDirection;

    use super::{HydratedSort, SortCollection};
    use crate::filters::{SortDefinition, SortableFilter};
    use crate::RestifyRequest;

    fn declared() -> Vec<(String, SortDefinition)> {
        vec![
            ("title".to_owned(), SortDefinition::column("title")),
            (
                "owner".to_owned(),
                SortDefinition::related("owner", "name"),
            ),
            (
                "popular".to_owned(),
                SortDefinition::Filter(SortableFilter::new("popular").on_column("views")),
            ),
        ]
    }

    #[test]
    fn parses_directions_in_client_order() {
        let request = RestifyRequest::new(None).with_query([("sort", "-title, +owner,,views")]);
        let collection = SortCollection::from_request(&request);

        let parsed = collection
            .items()
            .iter()
            .map(|item| (item.key().to_owned(), item.direction()))
            .collect::<Vec<_>>();
        assert_eq!(
            parsed,
            vec![
                ("title".to_owned(), SortDirection::Desc),
                ("owner".to_owned(), SortDirection::Asc),
                ("views".to_owned(), SortDirection::Asc),
            ]
        );
    }

    #[test]
    fn undeclared_keys_are_dropped() {
        let request = RestifyRequest::new(None).with_query([("sort", "secret,-title")]);
        let collection = SortCollection::from_request(&request).allowed(&declared());

        assert_eq!(collection.items().len(), 1);
        assert_eq!(collection.items()[0].key(), "title");
    }

    #[test]
    fn hydration_reapplies_requested_direction() {
        let request = RestifyRequest::new(None).with_query([("sort", "-popular,owner")]);
        let sorts = SortCollection::from_request(&request)
            .allowed(&declared())
            .hydrate_definition(&declared())
            .unwrap_or_default();

        let [HydratedSort::Filter(popular), HydratedSort::Filter(owner)] = sorts.as_slice() else {
            unreachable!();
        };
        assert_eq!(popular.column(), "views");
        assert_eq!(popular.direction(), SortDirection::Desc);
        assert_eq!(owner.relation(), Some("owner"));
        assert_eq!(owner.column(), "name");
    }

    #[test]
    fn empty_column_is_an_invalid_sort() {
        let declared = vec![("broken".to_owned(), SortDefinition::column(""))];
        let request = RestifyRequest::new(None).with_query([("sort", "broken")]);
        let result = SortCollection::from_request(&request).hydrate_definition(&declared);

        assert!(matches!(result, Err(AppError::Internal(message)) if message.starts_with("Invalid argument to sort")));
    }
}
