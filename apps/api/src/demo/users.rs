use std::sync::Arc;

use restify_application::{
    Field, MatchFilter, Policy, Relation, Repository, Rule, RulePolicy, SearchableFilter,
    SortDefinition,
};
use restify_core::UserIdentity;
use restify_domain::{Ability, MatchType, Model};

use super::is_admin;

#[derive(Debug, Clone, Copy, Default)]
pub struct UserRepository;

impl Repository for UserRepository {
    fn uri_key(&self) -> &str {
        "users"
    }

    fn table(&self) -> &str {
        "users"
    }

    fn timestamps(&self) -> bool {
        true
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("name").rules([Rule::Required, Rule::String, Rule::MaxLength(255)]),
            Field::new("email")
                .rules([Rule::Required, Rule::String, Rule::MaxLength(255)])
                .can_see(|request| request.viewer().is_some()),
            Field::new("created_at").readonly(),
            Field::new("updated_at").readonly(),
        ]
    }

    fn search_fields(&self) -> Vec<SearchableFilter> {
        vec![SearchableFilter::new("name")]
    }

    fn match_fields(&self) -> Vec<MatchFilter> {
        vec![
            MatchFilter::new("id", MatchType::Array),
            MatchFilter::new("name", MatchType::Text),
            MatchFilter::new("email", MatchType::Text).can_see(|request| request.viewer().is_some()),
        ]
    }

    fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
        vec![
            ("id".to_owned(), SortDefinition::column("id")),
            ("name".to_owned(), SortDefinition::column("name")),
        ]
    }

    fn relations(&self) -> Vec<Relation> {
        vec![
            Relation::has_many("posts", "posts", "user_id"),
            Relation::belongs_to_many("roles", "roles", "role_user", "user_id", "role_id")
                .unique()
                .with_pivot_fields(["assigned_by"])
                .can_see(|request| request.viewer().is_some()),
        ]
    }

    fn policy(&self) -> Option<Arc<dyn Policy>> {
        Some(Arc::new(
            RulePolicy::new()
                .allow(Ability::Show)
                .rule(Ability::Store, admin_only)
                .rule(Ability::StoreBulk, admin_only)
                .rule(Ability::Update, self_or_admin)
                .rule(Ability::UpdateBulk, admin_only)
                .rule(Ability::Delete, admin_only)
                .rule(Ability::DeleteBulk, admin_only)
                .rule(Ability::Attach("roles".to_owned()), admin_only)
                .rule(Ability::Detach("roles".to_owned()), admin_only)
                .rule(Ability::Sync("roles".to_owned()), admin_only),
        ))
    }
}

fn admin_only(viewer: Option<&UserIdentity>, _model: Option<&Model>) -> bool {
    is_admin(viewer)
}

fn self_or_admin(viewer: Option<&UserIdentity>, model: Option<&Model>) -> bool {
    is_admin(viewer)
        || viewer
            .zip(model)
            .is_some_and(|(viewer, model)| model.key().to_string() == viewer.subject())
}
