use std::sync::Arc;

use restify_application::{
    Field, MatchFilter, Policy, Relation, Repository, Rule, RulePolicy, SearchableFilter,
    SortDefinition,
};
use restify_core::UserIdentity;
use restify_domain::{Ability, FieldType, MatchType, Model};

use super::owner_or_admin;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommentRepository;

impl Repository for CommentRepository {
    fn uri_key(&self) -> &str {
        "comments"
    }

    fn table(&self) -> &str {
        "comments"
    }

    fn timestamps(&self) -> bool {
        true
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("body").rules([Rule::Required, Rule::String]),
            Field::new("post_id")
                .of_type(FieldType::Integer)
                .store_rules([Rule::Required, Rule::Integer])
                .update_rules([Rule::Integer]),
            Field::new("user_id")
                .of_type(FieldType::Integer)
                .rules([Rule::Nullable, Rule::Integer]),
            Field::new("created_at").readonly(),
            Field::new("updated_at").readonly(),
        ]
    }

    fn search_fields(&self) -> Vec<SearchableFilter> {
        vec![SearchableFilter::new("body")]
    }

    fn match_fields(&self) -> Vec<MatchFilter> {
        vec![
            MatchFilter::new("post_id", MatchType::Integer),
            MatchFilter::new("user_id", MatchType::Integer),
        ]
    }

    fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
        vec![
            ("id".to_owned(), SortDefinition::column("id")),
            ("created_at".to_owned(), SortDefinition::column("created_at")),
        ]
    }

    fn relations(&self) -> Vec<Relation> {
        vec![
            Relation::belongs_to("post", "posts", "post_id"),
            Relation::belongs_to("author", "users", "user_id"),
        ]
    }

    fn policy(&self) -> Option<Arc<dyn Policy>> {
        Some(Arc::new(
            RulePolicy::new()
                .allow(Ability::Show)
                .allow_authenticated(Ability::Store)
                .allow_authenticated(Ability::StoreBulk)
                .rule(Ability::Update, written_by_viewer)
                .rule(Ability::UpdateBulk, written_by_viewer)
                .rule(Ability::Delete, written_by_viewer)
                .rule(Ability::DeleteBulk, written_by_viewer),
        ))
    }
}

fn written_by_viewer(viewer: Option<&UserIdentity>, model: Option<&Model>) -> bool {
    owner_or_admin(viewer, model, "user_id")
}
