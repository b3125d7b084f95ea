//! Repository declarations: the per-model REST resource and its registry.

mod fields;
mod registry;
mod relations;

use std::sync::Arc;

use restify_core::AppResult;
use restify_domain::KeyType;

use crate::actions::Action;
use crate::authorization::Policy;
use crate::filters::{AdvancedFilter, MatchFilter, SearchableFilter, SortDefinition};
use crate::getters::Getter;
use crate::query::{Aggregate, ModelQuery};
use crate::support::title_from_key;
use crate::RestifyRequest;

pub use fields::{Field, Rule, ValidationMode, fillable_attributes, validate_payload};
pub use registry::{RepositoryRegistry, RepositoryRegistryBuilder};
pub use relations::{PivotDefinition, Relation, RelationKind};

/// REST resource wrapping one table.
///
/// Declarations are re-read for every request; implementations hold no per-request state.
pub trait Repository: Send + Sync {
    /// Returns the uri segment identifying the repository.
    fn uri_key(&self) -> &str;

    /// Returns the backing table.
    fn table(&self) -> &str;

    /// Returns the key column.
    fn key_column(&self) -> &str {
        "id"
    }

    /// Returns the key type.
    fn key_type(&self) -> KeyType {
        KeyType::Integer
    }

    /// Returns the display label.
    fn label(&self) -> String {
        title_from_key(self.uri_key())
    }

    /// Returns the default page size.
    fn per_page(&self) -> usize {
        15
    }

    /// Maintains `created_at` and `updated_at` on writes.
    fn timestamps(&self) -> bool {
        false
    }

    /// Rejects store, update and delete requests.
    fn read_only(&self) -> bool {
        false
    }

    /// Returns the exposed and fillable fields.
    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }

    /// Returns the columns matched by `search`.
    fn search_fields(&self) -> Vec<SearchableFilter> {
        Vec::new()
    }

    /// Returns the match keys.
    fn match_fields(&self) -> Vec<MatchFilter> {
        Vec::new()
    }

    /// Returns the sort allow-list keyed by request key.
    fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
        Vec::new()
    }

    /// Returns the declared relations.
    fn relations(&self) -> Vec<Relation> {
        Vec::new()
    }

    /// Returns the advanced filters.
    fn filters(&self) -> Vec<Arc<dyn AdvancedFilter>> {
        Vec::new()
    }

    /// Returns the actions.
    fn actions(&self) -> Vec<Arc<dyn Action>> {
        Vec::new()
    }

    /// Returns the getters.
    fn getters(&self) -> Vec<Arc<dyn Getter>> {
        Vec::new()
    }

    /// Returns aggregates reported with index responses.
    fn aggregations(&self) -> Vec<Aggregate> {
        Vec::new()
    }

    /// Returns the policy; repositories without one allow everything.
    fn policy(&self) -> Option<Arc<dyn Policy>> {
        None
    }

    /// Constrains every query of the repository.
    fn main_query(&self, _request: &RestifyRequest, _query: &mut ModelQuery) -> AppResult<()> {
        Ok(())
    }

    /// Constrains index queries, after [`Repository::main_query`].
    fn index_query(&self, _request: &RestifyRequest, _query: &mut ModelQuery) -> AppResult<()> {
        Ok(())
    }

    /// Constrains single-model lookups, after [`Repository::main_query`].
    fn show_query(&self, _request: &RestifyRequest, _query: &mut ModelQuery) -> AppResult<()> {
        Ok(())
    }

    /// Returns the declared relation with the name.
    fn relation(&self, name: &str) -> Option<Relation> {
        self.relations()
            .into_iter()
            .find(|relation| relation.name() == name)
    }

    /// Returns an unconstrained query over the table.
    fn new_query(&self) -> ModelQuery {
        ModelQuery::new(self.table(), self.key_column())
    }
}
