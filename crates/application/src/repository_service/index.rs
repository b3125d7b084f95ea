use restify_core::AppResult;
use restify_domain::Ability;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::RepositoryService;
use crate::loading::{first_or_fail, hydrate};
use crate::query::ModelQuery;
use crate::repository::Repository;
use crate::request::split_list;
use crate::RestifyRequest;

const FILTER_SECTIONS: [&str; 4] = ["filters", "matches", "sortables", "searchables"];

impl RepositoryService {
    /// Lists models through the search pipeline with pagination and aggregations.
    pub async fn index(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;
        self.gate
            .authorize(repository, request, &Ability::ViewAny, None)
            .await?;

        let query = self.search.search(request, repository)?;
        self.paginate(repository, request, query).await
    }

    /// Shows one model.
    pub async fn show(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        identifier: &str,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;

        let query = self.show_query(repository, request)?;
        let model = first_or_fail(self.store.as_ref(), repository, query, identifier).await?;
        self.gate
            .authorize(repository, request, &Ability::Show, Some(&model))
            .await?;

        let mut models = vec![model];
        self.load_relations(
            self.store.as_ref(),
            repository,
            request,
            &mut models,
            &request.related(),
        )
        .await?;

        let mut data = Value::Null;
        if let Some(model) = models.first() {
            data = self.serialize_with_meta(repository, request, model).await?;
        }

        Ok(json!({ "data": data }))
    }

    /// Describes the filters, match keys, sorts and search columns the request may use.
    ///
    /// `only=matches,sortables` narrows the listed sections.
    pub async fn filters(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<Value> {
        self.gate.authorize_repository(repository, request).await?;

        let only = request.filled("only").map(split_list).unwrap_or_default();
        let wants = |section: &str| only.is_empty() || only.iter().any(|item| item == section);

        let mut sections = Map::new();
        for section in FILTER_SECTIONS.into_iter().filter(|section| wants(section)) {
            let entries = match section {
                "filters" => repository
                    .filters()
                    .iter()
                    .filter(|filter| filter.authorized_to_see(request))
                    .map(|filter| filter.describe(request))
                    .collect::<Vec<_>>(),
                "matches" => repository
                    .match_fields()
                    .iter()
                    .filter(|filter| filter.authorized_to_see(request))
                    .map(|filter| {
                        json!({
                            "key": filter.key(),
                            "type": filter.match_type().map_or("custom", |match_type| match_type.as_str()),
                            "column": filter.target_column(),
                        })
                    })
                    .collect(),
                "sortables" => repository
                    .sort_fields()
                    .into_iter()
                    .filter(|(_, definition)| match definition {
                        crate::filters::SortDefinition::Filter(filter) => {
                            filter.authorized_to_see(request)
                        }
                        _ => true,
                    })
                    .map(|(key, _)| json!({ "key": key }))
                    .collect(),
                _ => repository
                    .search_fields()
                    .iter()
                    .filter(|field| field.authorized_to_see(request))
                    .map(|field| {
                        json!({
                            "key": field.key(),
                            "column": field.column(),
                            "relation": field.relation(),
                        })
                    })
                    .collect(),
            };
            sections.insert(section.to_owned(), Value::Array(entries));
        }

        Ok(json!({ "data": sections }))
    }

    /// Returns the base query for single-model lookups.
    pub(super) fn show_query(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
    ) -> AppResult<ModelQuery> {
        let mut query = repository.new_query();
        repository.main_query(request, &mut query)?;
        repository.show_query(request, &mut query)?;
        Ok(query)
    }

    /// Paginates a composed query into the index envelope.
    ///
    /// Models the viewer may not show are left out of the page.
    pub(super) async fn paginate(
        &self,
        repository: &dyn Repository,
        request: &RestifyRequest,
        mut query: ModelQuery,
    ) -> AppResult<Value> {
        let per_page = request
            .per_page()
            .unwrap_or_else(|| repository.per_page())
            .clamp(1, self.config.max_per_page.max(1));
        let page = request.page();

        let unpaginated = query.unpaginated();
        let total = self.store.count(&unpaginated).await?;

        let mut aggregations = Map::new();
        for aggregate in repository.aggregations() {
            let value = self.store.aggregate(&unpaginated, &aggregate).await?;
            aggregations.insert(aggregate.key.clone(), value);
        }

        query.for_page(page, per_page);
        let fetched = hydrate(repository, self.store.fetch(&query).await?)?;

        let mut models = Vec::with_capacity(fetched.len());
        for model in fetched {
            if self
                .gate
                .allows(repository, request, &Ability::Show, Some(&model))
                .await?
            {
                models.push(model);
            } else {
                debug!(
                    repository = repository.uri_key(),
                    model = %model.key(),
                    "hiding model the viewer may not show"
                );
            }
        }

        self.load_relations(
            self.store.as_ref(),
            repository,
            request,
            &mut models,
            query.eager(),
        )
        .await?;

        let mut data = Vec::with_capacity(models.len());
        for model in &models {
            data.push(self.serialize_with_meta(repository, request, model).await?);
        }

        let per_page_u64 = u64::try_from(per_page).unwrap_or(u64::MAX);
        let last_page = total.div_ceil(per_page_u64).max(1);

        let mut envelope = json!({
            "data": data,
            "currentPage": page,
            "perPage": per_page,
            "lastPage": last_page,
            "total": total,
        });
        if !aggregations.is_empty()
            && let Value::Object(object) = &mut envelope
        {
            object.insert("aggregations".to_owned(), Value::Object(aggregations));
        }

        Ok(envelope)
    }
}
