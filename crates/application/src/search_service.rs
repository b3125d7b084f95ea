//! Composition of the index query from search, match, filter and sort input.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use restify_core::{AppError, AppResult};
use restify_domain::{FieldType, KeyType, SortDirection};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RestifyConfig;
use crate::filters::AdvancedFilter;
use crate::query::{ColumnRef, Condition, ModelQuery};
use crate::repository::{Repository, RepositoryRegistry};
use crate::sort_collection::SortCollection;
use crate::RestifyRequest;

/// One entry of the decoded `filters` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdvancedFilterPayload {
    /// Filter identity; `key` is accepted as an alias.
    #[serde(alias = "key")]
    pub class: Option<String>,
    /// Raw value.
    #[serde(default)]
    pub value: Value,
}

/// Decodes `base64(json([{class, value}, ...]))`.
///
/// Broken base64 or JSON is a bad request; entries without a class are dropped.
pub fn decode_advanced_filters(raw: &str) -> AppResult<Vec<AdvancedFilterPayload>> {
    let bytes = STANDARD.decode(raw.trim()).map_err(|error| {
        AppError::BadRequest(format!("filters payload is not valid base64: {error}"))
    })?;
    let entries: Vec<AdvancedFilterPayload> = serde_json::from_slice(&bytes).map_err(|error| {
        AppError::BadRequest(format!("filters payload is not a valid filter list: {error}"))
    })?;

    Ok(entries
        .into_iter()
        .filter(|entry| entry.class.as_deref().is_some_and(|class| !class.is_empty()))
        .collect())
}

/// Encodes filter entries the way clients submit them.
#[must_use]
pub fn encode_advanced_filters(entries: &[(&str, Value)]) -> String {
    let payload = entries
        .iter()
        .map(|(class, value)| serde_json::json!({"class": class, "value": value}))
        .collect::<Vec<_>>();
    STANDARD.encode(Value::Array(payload).to_string())
}

/// Builds index queries for repositories.
#[derive(Clone)]
pub struct SearchService {
    registry: Arc<RepositoryRegistry>,
    config: RestifyConfig,
}

impl SearchService {
    /// Creates a search service.
    #[must_use]
    pub fn new(registry: Arc<RepositoryRegistry>, config: RestifyConfig) -> Self {
        Self { registry, config }
    }

    /// Composes the index query.
    ///
    /// Steps run in a fixed order: match fields, eager relations, search term, advanced filters,
    /// ordering, then the repository's main and index hooks so they always constrain the result.
    pub fn search(
        &self,
        request: &RestifyRequest,
        repository: &dyn Repository,
    ) -> AppResult<ModelQuery> {
        let mut query = repository.new_query();

        self.apply_match_fields(request, repository, &mut query)?;
        self.apply_eager_relations(request, repository, &mut query);
        self.apply_search(request, repository, &mut query)?;
        self.apply_advanced_filters(request, repository, &mut query)?;
        self.apply_ordering(request, repository, &mut query)?;

        repository.main_query(request, &mut query)?;
        repository.index_query(request, &mut query)?;

        debug!(
            repository = repository.uri_key(),
            conditions = query.conditions().len(),
            orders = query.orders().len(),
            "composed index query"
        );

        Ok(query)
    }

    fn apply_match_fields(
        &self,
        request: &RestifyRequest,
        repository: &dyn Repository,
        query: &mut ModelQuery,
    ) -> AppResult<()> {
        for filter in repository.match_fields() {
            if !filter.authorized_to_see(request) {
                continue;
            }

            if let Some(raw) = request
                .match_value(filter.key())
                .filter(|raw| !raw.trim().is_empty())
            {
                filter.apply(request, query, raw, false)?;
            }

            if let Some(raw) = request
                .negated_match_value(filter.key())
                .filter(|raw| !raw.trim().is_empty())
            {
                filter.apply(request, query, raw, true)?;
            }
        }

        Ok(())
    }

    fn apply_eager_relations(
        &self,
        request: &RestifyRequest,
        repository: &dyn Repository,
        query: &mut ModelQuery,
    ) {
        for name in request.related() {
            match repository.relation(&name) {
                Some(relation) if relation.authorized_to_see(request) => {
                    query.with_relation(name);
                }
                _ => debug!(
                    repository = repository.uri_key(),
                    relation = %name,
                    "ignoring unknown eager relation"
                ),
            }
        }
    }

    fn apply_search(
        &self,
        request: &RestifyRequest,
        repository: &dyn Repository,
        query: &mut ModelQuery,
    ) -> AppResult<()> {
        let Some(term) = request.search_term() else {
            return Ok(());
        };

        let searchable = repository
            .search_fields()
            .into_iter()
            .filter(|field| field.authorized_to_see(request))
            .collect::<Vec<_>>();
        if searchable.is_empty() {
            return Ok(());
        }

        let pattern = format!("%{term}%");
        let case_insensitive = !self.config.search_case_sensitive;
        let mut alternatives = Vec::with_capacity(searchable.len() + 1);

        for field in &searchable {
            let like = Condition::Like {
                column: ColumnRef::root(field.column()),
                pattern: pattern.clone(),
                case_insensitive,
            };

            match field.relation() {
                Some(name) => {
                    let relation = repository.relation(name).ok_or_else(|| {
                        AppError::Internal(format!(
                            "searchable column '{}' uses unknown relation '{name}'",
                            field.column()
                        ))
                    })?;
                    let related = self.registry.related(&relation)?;
                    alternatives.push(relation.exists_condition(
                        repository,
                        related.as_ref(),
                        Some(like),
                    ));
                }
                None => alternatives.push(like),
            }
        }

        let key_is_searchable = searchable
            .iter()
            .any(|field| field.relation().is_none() && field.column() == repository.key_column());
        if repository.key_type() == KeyType::Integer
            && key_is_searchable
            && term.chars().all(|character| character.is_ascii_digit())
            && let Ok(key) = term.parse::<i64>()
        {
            alternatives.push(Condition::eq(
                repository.key_column(),
                Value::from(key),
                FieldType::Integer,
            ));
        }

        query.filter(Condition::any(alternatives));
        Ok(())
    }

    fn apply_advanced_filters(
        &self,
        request: &RestifyRequest,
        repository: &dyn Repository,
        query: &mut ModelQuery,
    ) -> AppResult<()> {
        let Some(raw) = request.advanced_filters() else {
            return Ok(());
        };

        let entries = decode_advanced_filters(raw)?;
        let available = repository
            .filters()
            .into_iter()
            .filter(|filter| !self.config.enforce_filter_visibility || filter.authorized_to_see(request))
            .collect::<Vec<Arc<dyn AdvancedFilter>>>();

        for entry in entries {
            let class = entry.class.unwrap_or_default();
            let Some(filter) = available.iter().find(|filter| filter.key() == class) else {
                warn!(
                    repository = repository.uri_key(),
                    filter = %class,
                    "dropping unavailable advanced filter"
                );
                continue;
            };

            filter.boot(request)?;
            match filter.resolve(request, &entry.value) {
                Some(value) => filter.apply(request, query, &value)?,
                None => debug!(
                    repository = repository.uri_key(),
                    filter = %class,
                    "skipping advanced filter with empty value"
                ),
            }
        }

        Ok(())
    }

    fn apply_ordering(
        &self,
        request: &RestifyRequest,
        repository: &dyn Repository,
        query: &mut ModelQuery,
    ) -> AppResult<()> {
        let declared = repository.sort_fields();
        let collection = SortCollection::from_request(request).allowed(&declared);
        let key_column = ColumnRef::root(repository.key_column());

        if collection.is_empty() {
            query.order_by(key_column, SortDirection::Desc);
            return Ok(());
        }

        let sorts = collection.hydrate_definition(&declared)?;
        SortCollection::apply(sorts, request, repository, &self.registry, query)?;

        if !query.orders().iter().any(|order| order.column == key_column) {
            query.order_by(key_column, SortDirection::Asc);
        }

        Ok(())
    }
}
