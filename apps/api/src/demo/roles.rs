use std::sync::Arc;

use restify_application::{
    Field, Policy, Relation, Repository, Rule, RulePolicy, SearchableFilter, SortDefinition,
};
use restify_core::UserIdentity;
use restify_domain::{Ability, Model};

use super::is_admin;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleRepository;

impl Repository for RoleRepository {
    fn uri_key(&self) -> &str {
        "roles"
    }

    fn table(&self) -> &str {
        "roles"
    }

    fn timestamps(&self) -> bool {
        true
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("name").rules([Rule::Required, Rule::String, Rule::MaxLength(64)]),
            Field::new("created_at").readonly(),
            Field::new("updated_at").readonly(),
        ]
    }

    fn search_fields(&self) -> Vec<SearchableFilter> {
        vec![SearchableFilter::new("name")]
    }

    fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
        vec![("name".to_owned(), SortDefinition::column("name"))]
    }

    fn relations(&self) -> Vec<Relation> {
        vec![Relation::belongs_to_many(
            "users",
            "users",
            "role_user",
            "role_id",
            "user_id",
        )]
    }

    fn policy(&self) -> Option<Arc<dyn Policy>> {
        Some(Arc::new(
            RulePolicy::new()
                .rule(Ability::ViewAny, signed_in)
                .rule(Ability::Show, signed_in)
                .rule(Ability::Store, admin_only)
                .rule(Ability::Update, admin_only)
                .rule(Ability::Delete, admin_only),
        ))
    }
}

fn signed_in(viewer: Option<&UserIdentity>, _model: Option<&Model>) -> bool {
    viewer.is_some()
}

fn admin_only(viewer: Option<&UserIdentity>, _model: Option<&Model>) -> bool {
    is_admin(viewer)
}
