use std::sync::Arc;

use restify_application::{
    Action, AdvancedFilter, Aggregate, AggregateFunction, BooleanFilter, CallbackFilter,
    Condition, Field, FilterKind, FilterOption, Getter, MatchFilter, ModelQuery, Policy,
    Relation, Repository, RestifyRequest, Rule, RulePolicy, SearchableFilter, SelectFilter,
    SortDefinition, TimestampFilter,
};
use restify_core::{AppResult, UserIdentity};
use restify_domain::{Ability, FieldType, MatchType, Model, parse_bool};
use serde_json::Value;

use super::actions::{AssignOwner, PublishPosts, ResetViews};
use super::getters::{PostStats, PostSummary};
use super::{is_admin, owner_or_admin, viewer_user_id};

/// Post categories offered by the category filter and accepted on writes.
const CATEGORIES: [&str; 3] = ["news", "tutorial", "general"];

/// Blog posts owned by users.
///
/// Guests and members see published posts plus, for members, their own drafts. Admins see all.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostRepository;

impl Repository for PostRepository {
    fn uri_key(&self) -> &str {
        "posts"
    }

    fn table(&self) -> &str {
        "posts"
    }

    fn timestamps(&self) -> bool {
        true
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("title").rules([Rule::Required, Rule::String, Rule::MaxLength(255)]),
            Field::new("body").rules([Rule::Nullable, Rule::String]),
            Field::new("category").rules([Rule::In(
                CATEGORIES.iter().map(|category| (*category).to_owned()).collect(),
            )]),
            Field::new("user_id")
                .of_type(FieldType::Integer)
                .rules([Rule::Nullable, Rule::Integer]),
            Field::new("views")
                .of_type(FieldType::Integer)
                .rules([Rule::Integer]),
            Field::new("is_published")
                .of_type(FieldType::Boolean)
                .rules([Rule::Boolean]),
            Field::new("published_at")
                .of_type(FieldType::Timestamp)
                .rules([Rule::Nullable]),
            Field::new("created_at").readonly(),
            Field::new("updated_at").readonly(),
        ]
    }

    fn search_fields(&self) -> Vec<SearchableFilter> {
        vec![
            SearchableFilter::new("id"),
            SearchableFilter::new("title"),
            SearchableFilter::related("owner", "name"),
        ]
    }

    fn match_fields(&self) -> Vec<MatchFilter> {
        vec![
            MatchFilter::new("id", MatchType::Array),
            MatchFilter::new("title", MatchType::Text),
            MatchFilter::new("user_id", MatchType::Integer),
            MatchFilter::column("published", "is_published", MatchType::Boolean),
            MatchFilter::new("published_at", MatchType::Datetime),
            MatchFilter::new("views", MatchType::Between),
        ]
    }

    fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
        vec![
            ("id".to_owned(), SortDefinition::column("id")),
            ("title".to_owned(), SortDefinition::column("title")),
            ("views".to_owned(), SortDefinition::column("views")),
            ("created_at".to_owned(), SortDefinition::column("created_at")),
            ("owner.name".to_owned(), SortDefinition::related("owner", "name")),
        ]
    }

    fn relations(&self) -> Vec<Relation> {
        vec![
            Relation::belongs_to("owner", "users", "user_id"),
            Relation::has_many("comments", "comments", "post_id"),
        ]
    }

    fn filters(&self) -> Vec<Arc<dyn AdvancedFilter>> {
        vec![
            Arc::new(BooleanFilter::new("published", "is_published")),
            Arc::new(SelectFilter::new(
                "category",
                "category",
                CATEGORIES
                    .iter()
                    .map(|category| FilterOption::new(title_case(category), *category))
                    .collect(),
            )),
            Arc::new(TimestampFilter::new("published-at", "published_at")),
            Arc::new(
                CallbackFilter::new("mine", FilterKind::Boolean, only_mine)
                    .can_see(|request| request.viewer().is_some()),
            ),
        ]
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(PublishPosts),
            Arc::new(AssignOwner),
            Arc::new(ResetViews),
        ]
    }

    fn getters(&self) -> Vec<Arc<dyn Getter>> {
        vec![Arc::new(PostStats), Arc::new(PostSummary)]
    }

    fn aggregations(&self) -> Vec<Aggregate> {
        vec![Aggregate::of("total_views", AggregateFunction::Sum, "views")]
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

    fn main_query(&self, request: &RestifyRequest, query: &mut ModelQuery) -> AppResult<()> {
        if is_admin(request.viewer()) {
            return Ok(());
        }

        let mut visible = vec![Condition::eq(
            "is_published",
            Value::Bool(true),
            FieldType::Boolean,
        )];
        if let Some(user_id) = viewer_user_id(request.viewer()) {
            visible.push(Condition::eq(
                "user_id",
                Value::from(user_id),
                FieldType::Integer,
            ));
        }

        query.filter(Condition::any(visible));
        Ok(())
    }
}

fn written_by_viewer(viewer: Option<&UserIdentity>, model: Option<&Model>) -> bool {
    owner_or_admin(viewer, model, "user_id")
}

/// Narrows to the viewer's posts when the submitted value is truthy.
fn only_mine(request: &RestifyRequest, query: &mut ModelQuery, value: &Value) -> AppResult<()> {
    let enabled = match value {
        Value::Bool(enabled) => *enabled,
        Value::String(text) => parse_bool(text).unwrap_or(false),
        Value::Number(number) => number.as_i64() == Some(1),
        _ => false,
    };
    if !enabled {
        return Ok(());
    }

    match viewer_user_id(request.viewer()) {
        Some(user_id) => {
            query.filter(Condition::eq(
                "user_id",
                Value::from(user_id),
                FieldType::Integer,
            ));
        }
        None => {
            query.filter(Condition::any(Vec::new()));
        }
    }

    Ok(())
}

fn title_case(value: &str) -> String {
    let mut characters = value.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}
