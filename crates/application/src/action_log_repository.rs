//! Built-in read-only repository exposing the action log.

use std::sync::Arc;

use restify_domain::{ACTION_LOGS_TABLE, Ability, MatchType};

use crate::authorization::{Policy, RulePolicy};
use crate::filters::{MatchFilter, SearchableFilter, SortDefinition};
use crate::repository::{Field, Repository};

/// Uri key of the action log repository.
pub const ACTION_LOGS_URI_KEY: &str = "action-logs";

/// Lists action log entries to authenticated viewers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionLogRepository;

impl Repository for ActionLogRepository {
    fn uri_key(&self) -> &str {
        ACTION_LOGS_URI_KEY
    }

    fn table(&self) -> &str {
        ACTION_LOGS_TABLE
    }

    fn read_only(&self) -> bool {
        true
    }

    fn fields(&self) -> Vec<Field> {
        [
            "batch_id",
            "user_id",
            "name",
            "actionable_type",
            "actionable_id",
            "target_type",
            "target_id",
            "status",
            "original",
            "changes",
            "exception",
            "created_at",
        ]
        .into_iter()
        .map(|name| Field::new(name).readonly())
        .collect()
    }

    fn search_fields(&self) -> Vec<SearchableFilter> {
        vec![SearchableFilter::new("name")]
    }

    fn match_fields(&self) -> Vec<MatchFilter> {
        vec![
            MatchFilter::new("name", MatchType::Text),
            MatchFilter::new("actionable_type", MatchType::Text),
            MatchFilter::new("actionable_id", MatchType::Text),
            MatchFilter::new("user_id", MatchType::Text),
            MatchFilter::new("batch_id", MatchType::Text),
            MatchFilter::new("created_at", MatchType::Datetime),
        ]
    }

    fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
        vec![
            ("id".to_owned(), SortDefinition::column("id")),
            ("name".to_owned(), SortDefinition::column("name")),
            ("created_at".to_owned(), SortDefinition::column("created_at")),
        ]
    }

    fn policy(&self) -> Option<Arc<dyn Policy>> {
        Some(Arc::new(
            RulePolicy::new()
                .allow_authenticated(Ability::AllowRestify)
                .allow_authenticated(Ability::ViewAny)
                .allow_authenticated(Ability::Show),
        ))
    }
}
