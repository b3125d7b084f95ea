use std::sync::Arc;

use restify_application::{
    AuthorizationGate, Policy, Relation, Repository, RepositoryRegistry, RepositoryService,
    RestifyConfig, RestifyRequest, RulePolicy,
};
use restify_domain::{Ability, Model};
use serde_json::{Value, json};

use crate::InMemoryModelStore;

fn flagged(model: Option<&Model>, attribute: &str) -> bool {
    model
        .and_then(|model| model.attribute(attribute))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

struct PostsRepository;

impl Repository for PostsRepository {
    fn uri_key(&self) -> &str {
        "posts"
    }

    fn table(&self) -> &str {
        "posts"
    }

    fn relations(&self) -> Vec<Relation> {
        vec![Relation::has_many("comments", "comments", "post_id")]
    }

    fn policy(&self) -> Option<Arc<dyn Policy>> {
        Some(Arc::new(
            RulePolicy::new().rule(Ability::Show, |_, model| !flagged(model, "hidden")),
        ))
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

    fn relations(&self) -> Vec<Relation> {
        vec![Relation::belongs_to("post", "posts", "post_id")]
    }

    fn policy(&self) -> Option<Arc<dyn Policy>> {
        Some(Arc::new(
            RulePolicy::new().rule(Ability::Show, |_, model| !flagged(model, "spam")),
        ))
    }
}

async fn seeded_service() -> RepositoryService {
    let store = InMemoryModelStore::new();
    let rows = |values: Vec<Value>| {
        values
            .into_iter()
            .filter_map(|value| value.as_object().cloned())
            .collect::<Vec<_>>()
    };
    store
        .seed(
            "posts",
            rows(vec![
                json!({ "title": "visible", "hidden": false }),
                json!({ "title": "moderated", "hidden": true }),
            ]),
        )
        .await;
    store
        .seed(
            "comments",
            rows(vec![
                json!({ "post_id": 1, "body": "kind words", "spam": false }),
                json!({ "post_id": 1, "body": "buy now", "spam": true }),
                json!({ "post_id": 2, "body": "on a hidden post", "spam": false }),
            ]),
        )
        .await;

    let registry = RepositoryRegistry::builder()
        .register(Arc::new(PostsRepository))
        .register(Arc::new(CommentsRepository))
        .build()
        .unwrap_or_else(|_| unreachable!());

    RepositoryService::new(
        Arc::new(store),
        Arc::new(registry),
        AuthorizationGate::new(),
        RestifyConfig::default(),
    )
}

fn keys(items: &Value) -> Vec<i64> {
    items
        .as_array()
        .map(|items| items.iter().filter_map(|item| item["id"].as_i64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn has_many_leaves_out_children_the_viewer_may_not_show() {
    let service = seeded_service().await;
    let request = RestifyRequest::new(None).with_query([("related", "comments")]);

    let body = service
        .show(&PostsRepository, &request, "1")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(keys(&body["data"]["relationships"]["comments"]), vec![1]);
}

#[tokio::test]
async fn belongs_to_is_null_when_the_parent_may_not_be_shown() {
    let service = seeded_service().await;
    let request = RestifyRequest::new(None).with_query([("related", "post")]);

    let body = service
        .index(&CommentsRepository, &request)
        .await
        .unwrap_or_else(|_| unreachable!());
    let comments = body["data"].as_array().cloned().unwrap_or_default();

    assert_eq!(keys(&body["data"]), vec![3, 1]);
    let parents = comments
        .iter()
        .map(|comment| comment["relationships"]["post"]["id"].as_i64())
        .collect::<Vec<_>>();
    assert_eq!(parents, vec![None, Some(1)]);
}
