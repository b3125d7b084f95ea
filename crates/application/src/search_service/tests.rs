use std::sync::Arc;

use restify_core::{AppError, AppResult};
use restify_domain::{FieldType, MatchType, SortDirection};
use serde_json::json;

use super::{SearchService, decode_advanced_filters, encode_advanced_filters};
use crate::config::RestifyConfig;
use crate::filters::{
    AdvancedFilter, BooleanFilter, FilterKind, IntegerFilter, MatchFilter, SearchableFilter,
    SortDefinition,
};
use crate::query::{ColumnRef, CompareOp, Condition, ModelQuery, Order};
use crate::repository::{Relation, Repository, RepositoryRegistry};
use crate::RestifyRequest;

/// Only signed-in viewers may filter archived posts.
struct ArchivedFilter;

impl AdvancedFilter for ArchivedFilter {
    fn key(&self) -> String {
        "archived".to_owned()
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Boolean
    }

    fn boot(&self, request: &RestifyRequest) -> AppResult<()> {
        if request.viewer().is_none() {
            return Err(AppError::Forbidden("sign in to filter archived posts".to_owned()));
        }
        Ok(())
    }

    fn resolve(&self, _request: &RestifyRequest, raw: &serde_json::Value) -> Option<serde_json::Value> {
        raw.as_bool().map(serde_json::Value::Bool)
    }

    fn apply(
        &self,
        _request: &RestifyRequest,
        query: &mut ModelQuery,
        value: &serde_json::Value,
    ) -> AppResult<()> {
        query.filter(Condition::eq("is_archived", value.clone(), FieldType::Boolean));
        Ok(())
    }
}

struct PostsRepository;

impl Repository for PostsRepository {
    fn uri_key(&self) -> &str {
        "posts"
    }

    fn table(&self) -> &str {
        "posts"
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
            MatchFilter::new("title", MatchType::Text),
            MatchFilter::new("is_active", MatchType::Boolean),
        ]
    }

    fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
        vec![
            ("title".to_owned(), SortDefinition::column("title")),
            (
                "owner.name".to_owned(),
                SortDefinition::related("owner", "name"),
            ),
        ]
    }

    fn relations(&self) -> Vec<Relation> {
        vec![
            Relation::belongs_to("owner", "users", "user_id"),
            Relation::has_many("comments", "comments", "post_id")
                .can_see(|request| request.viewer().is_some()),
        ]
    }

    fn filters(&self) -> Vec<Arc<dyn AdvancedFilter>> {
        vec![
            Arc::new(BooleanFilter::new("active-posts", "is_active")),
            Arc::new(
                BooleanFilter::new("flagged-posts", "is_flagged")
                    .can_see(|request| request.viewer().is_some()),
            ),
            Arc::new(IntegerFilter::new("author", "user_id")),
            Arc::new(ArchivedFilter),
        ]
    }

    fn main_query(&self, _request: &RestifyRequest, query: &mut ModelQuery) -> AppResult<()> {
        query.filter(Condition::eq("tenant_id", json!(1), FieldType::Integer));
        Ok(())
    }
}

struct UsersRepository;

impl Repository for UsersRepository {
    fn uri_key(&self) -> &str {
        "users"
    }

    fn table(&self) -> &str {
        "users"
    }
}

struct CommentsRepository;

impl Repository for CommentsRepository {
    fn uri_key(&self) -> &str {
        "comments"
    }

    fn table(&self) -> &str {
        "comments"
    }
}

fn service(config: RestifyConfig) -> SearchService {
    let registry = RepositoryRegistry::builder()
        .register(Arc::new(PostsRepository))
        .register(Arc::new(UsersRepository))
        .register(Arc::new(CommentsRepository))
        .build()
        .unwrap_or_else(|_| unreachable!());

    SearchService::new(Arc::new(registry), config)
}

fn search(request: RestifyRequest) -> AppResult<ModelQuery> {
    service(RestifyConfig::default()).search(&request, &PostsRepository)
}

fn tenant_scope() -> Condition {
    Condition::eq("tenant_id", json!(1), FieldType::Integer)
}

#[test]
fn plain_index_orders_by_key_descending_and_applies_main_query_last() {
    let query = search(RestifyRequest::new(None)).unwrap_or_else(|_| unreachable!());

    assert_eq!(query.conditions(), &[tenant_scope()]);
    assert_eq!(
        query.orders(),
        &[Order {
            column: ColumnRef::root("id"),
            direction: SortDirection::Desc,
        }]
    );
}

#[test]
fn match_field_precedes_hooks_and_reads_unprefixed_column() {
    let request = RestifyRequest::new(None)
        .with_query([("title", "Another one"), ("-is_active", "false")]);
    let query = search(request).unwrap_or_else(|_| unreachable!());

    assert_eq!(
        query.conditions(),
        &[
            Condition::eq("title", json!("Another one"), FieldType::Text),
            Condition::Compare {
                column: ColumnRef::root("is_active"),
                op: CompareOp::Neq,
                value: json!(false),
                field_type: FieldType::Boolean,
            },
            tenant_scope(),
        ]
    );
}

#[test]
fn numeric_search_also_matches_integer_key() {
    let request = RestifyRequest::new(None).with_query([("search", "42")]);
    let query = search(request).unwrap_or_else(|_| unreachable!());

    let Condition::Group { conditions, .. } = &query.conditions()[0] else {
        unreachable!();
    };
    assert_eq!(conditions.len(), 4);
    assert_eq!(
        conditions.last(),
        Some(&Condition::eq("id", json!(42), FieldType::Integer))
    );
    assert!(matches!(
        &conditions[2],
        Condition::RelatedExists { link, .. } if link.table == "users"
    ));
}

#[test]
fn textual_search_uses_case_insensitive_like_by_default() {
    let request = RestifyRequest::new(None).with_query([("search", "rust")]);
    let query = search(request).unwrap_or_else(|_| unreachable!());

    let Condition::Group { conditions, .. } = &query.conditions()[0] else {
        unreachable!();
    };
    assert_eq!(conditions.len(), 3);
    assert_eq!(
        conditions[1],
        Condition::Like {
            column: ColumnRef::root("title"),
            pattern: "%rust%".to_owned(),
            case_insensitive: true,
        }
    );

    let sensitive = service(RestifyConfig {
        search_case_sensitive: true,
        ..RestifyConfig::default()
    })
    .search(
        &RestifyRequest::new(None).with_query([("search", "rust")]),
        &PostsRepository,
    )
    .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        &sensitive.conditions()[0],
        Condition::Group { conditions, .. }
            if matches!(conditions[1], Condition::Like { case_insensitive: false, .. })
    ));
}

#[test]
fn undeclared_sort_tokens_leave_ordering_untouched() {
    let plain = search(RestifyRequest::new(None)).unwrap_or_else(|_| unreachable!());
    let with_secret = search(RestifyRequest::new(None).with_query([("sort", "-password")]))
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(plain.orders(), with_secret.orders());
}

#[test]
fn related_sort_joins_relation_and_appends_key_tiebreaker() {
    let request = RestifyRequest::new(None).with_query([("sort", "-owner.name,title")]);
    let query = search(request).unwrap_or_else(|_| unreachable!());

    assert_eq!(query.joins().len(), 1);
    assert_eq!(query.joins()[0].table, "users");
    assert_eq!(
        query.orders(),
        &[
            Order {
                column: ColumnRef::scoped("owner", "name"),
                direction: SortDirection::Desc,
            },
            Order {
                column: ColumnRef::root("title"),
                direction: SortDirection::Asc,
            },
            Order {
                column: ColumnRef::root("id"),
                direction: SortDirection::Asc,
            },
        ]
    );
}

#[test]
fn encoded_filters_apply_like_direct_filters() {
    let encoded = encode_advanced_filters(&[("active-posts", json!(true))]);
    let via_payload = search(RestifyRequest::new(None).with_query([("filters", encoded)]))
        .unwrap_or_else(|_| unreachable!());

    let mut direct = ModelQuery::new("posts", "id");
    let filter = BooleanFilter::new("active-posts", "is_active");
    let request = RestifyRequest::new(None);
    let value = filter
        .resolve(&request, &json!(true))
        .unwrap_or_else(|| unreachable!());
    filter
        .apply(&request, &mut direct, &value)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(via_payload.conditions()[0], direct.conditions()[0]);
}

#[test]
fn unknown_and_hidden_filters_are_dropped() {
    let encoded = encode_advanced_filters(&[
        ("no-such-filter", json!(true)),
        ("flagged-posts", json!(true)),
        ("active-posts", json!("")),
    ]);
    let query = search(RestifyRequest::new(None).with_query([("filters", encoded)]))
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(query.conditions(), &[tenant_scope()]);
}

#[test]
fn hidden_filters_apply_when_visibility_is_not_enforced() {
    let encoded = encode_advanced_filters(&[("flagged-posts", json!(true))]);
    let query = service(RestifyConfig {
        enforce_filter_visibility: false,
        ..RestifyConfig::default()
    })
    .search(
        &RestifyRequest::new(None).with_query([("filters", encoded)]),
        &PostsRepository,
    )
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(query.conditions().len(), 2);
}

#[test]
fn integer_filter_accepts_numeric_strings_and_lists() {
    let single = encode_advanced_filters(&[("author", json!("2"))]);
    let query = search(RestifyRequest::new(None).with_query([("filters", single)]))
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(
        query.conditions()[0],
        Condition::Compare {
            column: ColumnRef::root("user_id"),
            op: CompareOp::Eq,
            value: json!(2),
            field_type: FieldType::Integer,
        }
    );

    let many = encode_advanced_filters(&[("author", json!([1, "3"]))]);
    let query = search(RestifyRequest::new(None).with_query([("filters", many)]))
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(
        query.conditions()[0],
        Condition::In {
            column: ColumnRef::root("user_id"),
            values: vec![json!(1), json!(3)],
            field_type: FieldType::Integer,
            negated: false,
        }
    );

    let invalid = encode_advanced_filters(&[("author", json!("someone"))]);
    let query = search(RestifyRequest::new(None).with_query([("filters", invalid)]))
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(query.conditions(), &[tenant_scope()]);
}

#[test]
fn filters_boot_before_resolving_their_value() {
    let encoded = encode_advanced_filters(&[("archived", json!(true))]);

    let guest = search(RestifyRequest::new(None).with_query([("filters", encoded.clone())]));
    assert!(matches!(guest, Err(AppError::Forbidden(_))));

    let member = search(
        RestifyRequest::new(Some(restify_core::UserIdentity::new("7", "Member", None)))
            .with_query([("filters", encoded)]),
    )
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(
        member.conditions()[0],
        Condition::eq("is_archived", json!(true), FieldType::Boolean)
    );
}

#[test]
fn malformed_filters_payload_is_a_bad_request() {
    let broken_base64 = search(RestifyRequest::new(None).with_query([("filters", "%%%")]));
    assert!(matches!(broken_base64, Err(AppError::BadRequest(_))));

    let not_a_list = decode_advanced_filters("eyJjbGFzcyI6MX0=");
    assert!(matches!(not_a_list, Err(AppError::BadRequest(_))));
}

#[test]
fn eager_relations_ignore_unknown_and_hidden_names() {
    let request = RestifyRequest::new(None).with_query([("related", "owner,comments,ghosts")]);
    let query = search(request).unwrap_or_else(|_| unreachable!());

    assert_eq!(query.eager(), &["owner".to_owned()]);
}

#[test]
fn identical_requests_compose_identical_queries() {
    let request = || {
        RestifyRequest::new(None).with_query([("search", "a"), ("sort", "title"), ("title", "x")])
    };

    assert_eq!(
        search(request()).unwrap_or_else(|_| unreachable!()),
        search(request()).unwrap_or_else(|_| unreachable!())
    );
}
