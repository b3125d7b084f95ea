//! Application services and ports: the request-to-query pipeline, authorization and dispatch.

#![forbid(unsafe_code)]

mod action_log_repository;
mod actions;
mod authorization;
mod config;
mod dispatch;
mod filters;
mod getters;
mod loading;
mod query;
mod repository;
mod repository_service;
mod request;
mod response;
mod search_service;
mod sort_collection;
mod store_ports;
mod support;

pub use action_log_repository::{ACTION_LOGS_URI_KEY, ActionLogRepository};
pub use actions::{Action, ActionContext, DispatchTarget, Placement};
pub use authorization::{AuthorizationGate, Policy, PolicyRule, RulePolicy, cache_key};
pub use config::RestifyConfig;
pub use dispatch::{
    ActionDispatcher, GetterDispatcher, RepositorySelection, available_actions,
    available_getters, resolve_action, resolve_getter,
};
pub use filters::{
    AdvancedFilter, BooleanFilter, CallbackFilter, FilterApply, FilterKind, FilterOption,
    IntegerFilter, MatchCallback, MatchDefinition, MatchFilter, Matchable, SearchableFilter,
    SeePredicate, SelectFilter, SortCallback, SortDefinition, SortableFilter, TimestampFilter,
    Visibility, typed_condition,
};
pub use getters::{Getter, GetterContext};
pub use loading::{first_or_fail, hydrate, parse_key};
pub use query::{
    Aggregate, AggregateFunction, ColumnRef, CompareOp, Condition, Join, LogicalMode,
    ModelQuery, Order, RelationLink,
};
pub use repository::{
    Field, PivotDefinition, Relation, RelationKind, Repository, RepositoryRegistry,
    RepositoryRegistryBuilder, Rule, ValidationMode, fillable_attributes, validate_payload,
};
pub use repository_service::RepositoryService;
pub use request::{RestifyRequest, split_list};
pub use response::RestResponse;
pub use search_service::{
    AdvancedFilterPayload, SearchService, decode_advanced_filters, encode_advanced_filters,
};
pub use sort_collection::{HydratedSort, SortCollection};
pub use store_ports::{ModelReader, ModelStore, PolicyCache, StoreTransaction};
pub use support::{attribute_label, title_from_key};
