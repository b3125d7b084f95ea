use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::{Extension, http::HeaderValue};
use restify_application::{ModelStore, RestifyConfig, encode_advanced_filters};
use restify_core::UserIdentity;
use restify_infrastructure::InMemoryModelStore;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::build_router;
use crate::api_config::{ApiCommand, ApiConfig, StoreDriver};
use crate::api_services::{build_app_state, build_memory_session_layer};
use crate::demo::ADMIN_ROLE;
use crate::dev_seed;

const PREFIX: &str = "/api/restify";
const BOOTSTRAP_TOKEN: &str = "bootstrap-token-for-tests";

fn test_config() -> ApiConfig {
    ApiConfig {
        command: ApiCommand::Serve,
        api_host: "127.0.0.1".to_owned(),
        api_port: 0,
        route_prefix: PREFIX.to_owned(),
        store_driver: StoreDriver::Memory,
        redis_url: None,
        frontend_url: "http://localhost:3000".to_owned(),
        cookie_secure: false,
        bootstrap_token: Some(BOOTSTRAP_TOKEN.to_owned()),
        restify: RestifyConfig {
            policy_cache_ttl_seconds: Some(60),
            ..RestifyConfig::default()
        },
    }
}

async fn seeded_app() -> (Router, InMemoryModelStore) {
    let store = InMemoryModelStore::new();
    dev_seed::run(&store).await.unwrap_or_else(|_| unreachable!());

    let shared: Arc<dyn ModelStore> = Arc::new(store.clone());
    let config = test_config();
    let state = build_app_state(shared, &config, "memory").unwrap_or_else(|_| unreachable!());
    let router = build_router(
        state,
        &config.route_prefix,
        &config.frontend_url,
        build_memory_session_layer(false),
    )
    .unwrap_or_else(|_| unreachable!());

    (router, store)
}

fn admin() -> UserIdentity {
    UserIdentity::new("1", "Ada Lovelace", None).with_roles([ADMIN_ROLE])
}

fn grace() -> UserIdentity {
    UserIdentity::new("2", "Grace Hopper", None)
}

fn alan() -> UserIdentity {
    UserIdentity::new("3", "Alan Turing", None)
}

async fn send(
    router: &Router,
    viewer: Option<UserIdentity>,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).unwrap_or_else(|_| unreachable!());

    let app = match viewer {
        Some(identity) => router.clone().layer(Extension(identity)),
        None => router.clone(),
    };
    let response = app.oneshot(request).await.unwrap_or_else(|_| unreachable!());
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|_| unreachable!());
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| unreachable!())
    };

    (status, body)
}

fn titles(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["attributes"]["title"].as_str().map(ToOwned::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

fn query_escape(raw: &str) -> String {
    raw.replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D")
}

#[tokio::test]
async fn guests_see_published_posts_with_aggregations() {
    let (router, _) = seeded_app().await;

    let (status, body) = send(&router, None, Method::GET, "/api/restify/posts", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        titles(&body),
        vec!["Compilers for everyone", "Notes on the analytical engine"]
    );
    assert_eq!(body["aggregations"]["total_views"], json!(195));
    assert_eq!(body["data"][0]["meta"]["authorizedToUpdate"], json!(false));
}

#[tokio::test]
async fn match_and_sort_parameters_shape_the_listing() {
    let (router, _) = seeded_app().await;

    let (_, matched) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts?title=Compilers%20for%20everyone",
        None,
    )
    .await;
    assert_eq!(titles(&matched), vec!["Compilers for everyone"]);

    let (_, negated) = send(
        &router,
        Some(admin()),
        Method::GET,
        "/api/restify/posts?-published=true&sort=-views",
        None,
    )
    .await;
    assert_eq!(titles(&negated), vec!["Draft: machines that think"]);

    let (_, sorted) = send(
        &router,
        Some(admin()),
        Method::GET,
        "/api/restify/posts?sort=-owner.name",
        None,
    )
    .await;
    assert_eq!(
        titles(&sorted),
        vec![
            "Compilers for everyone",
            "Draft: machines that think",
            "Notes on the analytical engine",
        ]
    );
}

#[tokio::test]
async fn search_reaches_related_owner_names() {
    let (router, _) = seeded_app().await;

    let (status, body) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts?search=hopper",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Compilers for everyone"]);
}

#[tokio::test]
async fn encoded_advanced_filters_narrow_results() {
    let (router, _) = seeded_app().await;
    let filters = encode_advanced_filters(&[("category", json!("news"))]);

    let (status, body) = send(
        &router,
        None,
        Method::GET,
        &format!("/api/restify/posts?filters={}", query_escape(&filters)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Compilers for everyone"]);

    let (status, _) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts?filters=not-base64!",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn filters_metadata_hides_viewer_only_filters_from_guests() {
    let (router, _) = seeded_app().await;
    let keys = |body: &Value| -> Vec<String> {
        body["data"]["filters"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["key"].as_str().map(ToOwned::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    };

    let (status, guest) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts/filters?only=filters",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!keys(&guest).contains(&"mine".to_owned()));
    assert!(guest["data"].get("matches").is_none());

    let (_, member) = send(
        &router,
        Some(grace()),
        Method::GET,
        "/api/restify/posts/filters",
        None,
    )
    .await;
    assert!(keys(&member).contains(&"mine".to_owned()));
}

#[tokio::test]
async fn hidden_drafts_are_not_found_while_foreign_posts_are_forbidden() {
    let (router, _) = seeded_app().await;

    let (status, _) = send(&router, Some(grace()), Method::GET, "/api/restify/posts/3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &router,
        Some(grace()),
        Method::PATCH,
        "/api/restify/posts/1",
        Some(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&router, None, Method::GET, "/api/restify/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_validates_and_creates_posts() {
    let (router, store) = seeded_app().await;

    let (status, body) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/posts",
        Some(json!({ "title": "", "category": "gossip" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["title"], json!(["The title field is required."]));
    assert!(body["errors"]["category"].is_array());

    let (status, body) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/posts",
        Some(json!({ "title": "Fresh post", "user_id": 2, "views": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["attributes"]["user_id"], json!(2));
    assert_eq!(store.rows("posts").await.len(), 4);

    let (status, _) = send(
        &router,
        None,
        Method::POST,
        "/api/restify/posts",
        Some(json!({ "title": "Anonymous" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn update_records_only_dirty_attributes_in_the_action_log() {
    let (router, store) = seeded_app().await;

    let (status, body) = send(
        &router,
        Some(grace()),
        Method::PATCH,
        "/api/restify/posts/2",
        Some(json!({ "title": "Compilers for all" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attributes"]["title"], json!("Compilers for all"));

    let logs = store.rows("action_logs").await;
    let Some(log) = logs.last() else {
        unreachable!("update must write a log entry");
    };
    assert_eq!(log.get("name"), Some(&json!("Updated")));
    assert_eq!(log.get("actionable_id"), Some(&json!("2")));
    assert_eq!(log.get("user_id"), Some(&json!("2")));
    assert_eq!(log["changes"]["title"], json!("Compilers for all"));
    assert_eq!(log["original"]["title"], json!("Compilers for everyone"));
    assert!(log["changes"].get("body").is_none());
}

#[tokio::test]
async fn destroy_returns_no_content_for_owners() {
    let (router, store) = seeded_app().await;

    let (status, _) = send(
        &router,
        Some(alan()),
        Method::DELETE,
        "/api/restify/posts/3",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(store.rows("posts").await.len(), 2);
}

#[tokio::test]
async fn bulk_store_reports_errors_by_item_index() {
    let (router, store) = seeded_app().await;

    let (status, body) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/posts/bulk",
        Some(json!([{ "title": "First" }, { "title": "" }])),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["1.title"].is_array());
    assert_eq!(store.rows("posts").await.len(), 3);
}

#[tokio::test]
async fn actions_run_over_all_visible_models() {
    let (router, store) = seeded_app().await;

    let (status, listing) = send(
        &router,
        Some(admin()),
        Method::GET,
        "/api/restify/posts/actions",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        listing["data"]
            .as_array()
            .map(Vec::len)
            .unwrap_or_default(),
        3
    );

    let (status, body) = send(
        &router,
        Some(admin()),
        Method::POST,
        "/api/restify/posts/action?action=publish-posts",
        Some(json!({ "repositories": "all" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["published"], json!(3));
    assert!(
        store
            .rows("posts")
            .await
            .iter()
            .all(|post| post.get("is_published") == Some(&json!(true)))
    );
    assert_eq!(
        store
            .rows("action_logs")
            .await
            .iter()
            .filter(|log| log.get("name") == Some(&json!("publish-posts")))
            .count(),
        3
    );
}

#[tokio::test]
async fn actions_distinguish_hidden_from_unknown_keys() {
    let (router, _) = seeded_app().await;

    let (status, _) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/posts/action?action=reset-views",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/posts/action?action=does-not-exist",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &router,
        Some(admin()),
        Method::POST,
        "/api/restify/posts/1/action?action=reset-views",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn show_actions_check_the_target_model() {
    let (router, store) = seeded_app().await;

    let (status, _) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/posts/1/action?action=publish-posts",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        Some(alan()),
        Method::POST,
        "/api/restify/posts/3/action",
        Some(json!({ "action": "publish-posts" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let posts = store.rows("posts").await;
    assert_eq!(
        posts.last().and_then(|post| post.get("is_published")),
        Some(&json!(true))
    );
}

#[tokio::test]
async fn action_payload_fields_are_validated() {
    let (router, _) = seeded_app().await;

    let (status, body) = send(
        &router,
        Some(admin()),
        Method::POST,
        "/api/restify/posts/2/action?action=assign-owner",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["user_id"].is_array());

    let (status, body) = send(
        &router,
        Some(admin()),
        Method::POST,
        "/api/restify/posts/2/action?action=assign-owner",
        Some(json!({ "user_id": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["assigned"], json!(1));
}

#[tokio::test]
async fn getters_run_on_their_routes() {
    let (router, _) = seeded_app().await;

    let (status, stats) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts/getters/post-stats",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"], json!({ "posts": 2, "views": 195 }));

    let (status, summary) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts/1/getters/post-summary",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["data"]["comments"], json!(2));

    let (status, _) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts/1/getters/post-stats",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_comments_are_scoped_to_their_post() {
    let (router, store) = seeded_app().await;

    let (status, listing) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts/1/comments",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["data"].as_array().map(Vec::len), Some(2));

    let (status, created) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/posts/2/comments",
        Some(json!({ "body": "Commenting on my own post", "post_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["attributes"]["post_id"], json!(2));
    assert_eq!(store.rows("comments").await.len(), 3);

    let (status, _) = send(
        &router,
        None,
        Method::GET,
        "/api/restify/posts/2/comments/1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attaching_roles_respects_uniqueness_and_policy() {
    let (router, store) = seeded_app().await;

    let (status, _) = send(
        &router,
        Some(grace()),
        Method::POST,
        "/api/restify/users/3/attach/roles",
        Some(json!({ "roles": [2] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        Some(admin()),
        Method::POST,
        "/api/restify/users/3/attach/roles",
        Some(json!({ "roles": [2], "assigned_by": "ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pivots = store.rows("role_user").await;
    assert_eq!(pivots.len(), 3);
    assert_eq!(
        pivots.last().and_then(|row| row.get("assigned_by")),
        Some(&json!("ada"))
    );

    let (status, body) = send(
        &router,
        Some(admin()),
        Method::POST,
        "/api/restify/users/3/attach/roles",
        Some(json!({ "roles": [2] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().is_some());
    assert_eq!(store.rows("role_user").await.len(), 3);
}

#[tokio::test]
async fn action_logs_are_read_only_for_members() {
    let (router, _) = seeded_app().await;

    let (status, _) = send(&router, None, Method::GET, "/api/restify/action-logs", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        Some(grace()),
        Method::GET,
        "/api/restify/action-logs",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        Some(admin()),
        Method::POST,
        "/api/restify/action-logs",
        Some(json!({ "name": "forged" })),
    )
    .await;
    assert_ne!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn bootstrap_session_identifies_later_requests() {
    let (router, _) = seeded_app().await;

    let (status, _) = send(&router, None, Method::GET, "/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/bootstrap")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "subject": "2", "display_name": "Grace Hopper", "token": BOOTSTRAP_TOKEN })
                .to_string(),
        ))
        .unwrap_or_else(|_| unreachable!());
    let response = router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| unreachable!("bootstrap must set a session cookie"));

    let request = Request::builder()
        .uri("/auth/me")
        .header(
            header::COOKIE,
            HeaderValue::from_str(&cookie).unwrap_or_else(|_| unreachable!()),
        )
        .body(Body::empty())
        .unwrap_or_else(|_| unreachable!());
    let response = router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|_| unreachable!());
    let body: Value = serde_json::from_slice(&bytes).unwrap_or_else(|_| unreachable!());
    assert_eq!(body["subject"], json!("2"));
}

#[tokio::test]
async fn health_reports_the_store_driver() {
    let (router, _) = seeded_app().await;

    let (status, body) = send(&router, None, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "store": "memory" }));
}
