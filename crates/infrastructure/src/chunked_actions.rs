use std::sync::Arc;

use async_trait::async_trait;
use restify_application::{
    Action, ActionContext, ActionDispatcher, AuthorizationGate, ColumnRef, ModelQuery,
    Repository, RestResponse, RestifyConfig, RestifyRequest,
};
use restify_core::{AppError, AppResult};
use restify_domain::{ACTION_LOGS_TABLE, Model, ModelKey, Row, SortDirection};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::InMemoryModelStore;

/// Marks every model it receives and records the keys of each invocation.
#[derive(Default)]
struct TouchPosts {
    calls: Mutex<Vec<Vec<i64>>>,
    order_by_title: bool,
    fail_on: Option<i64>,
}

#[async_trait]
impl Action for TouchPosts {
    fn uri_key(&self) -> &str {
        "touch-posts"
    }

    fn index_query(&self, _request: &RestifyRequest, query: &mut ModelQuery) -> AppResult<()> {
        if self.order_by_title {
            query.order_by(ColumnRef::root("title"), SortDirection::Desc);
        }
        Ok(())
    }

    async fn handle(
        &self,
        context: ActionContext<'_>,
        models: Vec<Model>,
    ) -> AppResult<RestResponse> {
        let keys = models
            .iter()
            .filter_map(|model| match model.key() {
                ModelKey::Int(key) => Some(*key),
                ModelKey::Text(_) => None,
            })
            .collect::<Vec<_>>();
        self.calls.lock().await.push(keys.clone());

        if !keys.is_empty() {
            let mut query = context.repository.new_query();
            query.where_keys_in(
                keys.iter().copied().map(Value::from).collect(),
                context.repository.key_type(),
            );
            let mut changes = Row::new();
            changes.insert("touched".to_owned(), Value::Bool(true));
            context.transaction.update(&query, changes).await?;
        }

        if let Some(failing) = self.fail_on
            && keys.contains(&failing)
        {
            return Err(AppError::Internal(format!("post {failing} cannot be touched")));
        }

        Ok(RestResponse::ok().data(json!(keys)))
    }
}

struct PostsRepository {
    action: Arc<TouchPosts>,
}

impl Repository for PostsRepository {
    fn uri_key(&self) -> &str {
        "posts"
    }

    fn table(&self) -> &str {
        "posts"
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        let action: Arc<dyn Action> = self.action.clone();
        vec![action]
    }
}

async fn store_with_posts(count: usize) -> InMemoryModelStore {
    let store = InMemoryModelStore::new();
    // Titles sort opposite to keys so a title ordering interleaves with key paging.
    let titles = ["e", "d", "c", "b", "a"];
    store
        .seed(
            "posts",
            titles.iter().take(count).map(|title| {
                json!({ "title": title, "touched": false })
                    .as_object()
                    .cloned()
                    .unwrap_or_default()
            }),
        )
        .await;
    store
}

fn dispatcher(store: &InMemoryModelStore, chunk_size: usize) -> ActionDispatcher {
    ActionDispatcher::new(
        Arc::new(store.clone()),
        AuthorizationGate::new(),
        RestifyConfig {
            action_chunk_size: chunk_size,
            ..RestifyConfig::default()
        },
    )
}

fn run_all() -> RestifyRequest {
    RestifyRequest::new(None).with_payload(json!({ "repositories": "all" }))
}

async fn touched_keys(store: &InMemoryModelStore) -> Vec<i64> {
    store
        .rows("posts")
        .await
        .iter()
        .filter(|row| row.get("touched") == Some(&Value::Bool(true)))
        .filter_map(|row| row.get("id").and_then(Value::as_i64))
        .collect()
}

#[tokio::test]
async fn empty_selection_runs_the_handler_once() {
    let store = store_with_posts(0).await;
    let action = Arc::new(TouchPosts::default());
    let repository = PostsRepository {
        action: action.clone(),
    };

    let response = dispatcher(&store, 2)
        .run_index(&repository, &run_all(), "touch-posts")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(*action.calls.lock().await, vec![Vec::<i64>::new()]);
    assert_eq!(response.body()["data"], json!([]));
}

#[tokio::test]
async fn chunks_cover_every_model_and_return_the_last_response() {
    let store = store_with_posts(5).await;
    let action = Arc::new(TouchPosts::default());
    let repository = PostsRepository {
        action: action.clone(),
    };

    let response = dispatcher(&store, 2)
        .run_index(&repository, &run_all(), "touch-posts")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(*action.calls.lock().await, vec![vec![1, 2], vec![3, 4], vec![5]]);
    assert_eq!(response.body()["data"], json!([5]));
    assert_eq!(touched_keys(&store).await, vec![1, 2, 3, 4, 5]);
    assert_eq!(store.rows(ACTION_LOGS_TABLE).await.len(), 5);
}

#[tokio::test]
async fn hook_ordering_does_not_skip_models_between_chunks() {
    let store = store_with_posts(5).await;
    let action = Arc::new(TouchPosts {
        order_by_title: true,
        ..TouchPosts::default()
    });
    let repository = PostsRepository {
        action: action.clone(),
    };

    dispatcher(&store, 2)
        .run_index(&repository, &run_all(), "touch-posts")
        .await
        .unwrap_or_else(|_| unreachable!());

    let mut seen = action.calls.lock().await.concat();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(touched_keys(&store).await, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn failing_chunk_rolls_back_alone() {
    let store = store_with_posts(5).await;
    let action = Arc::new(TouchPosts {
        fail_on: Some(3),
        ..TouchPosts::default()
    });
    let repository = PostsRepository {
        action: action.clone(),
    };

    let result = dispatcher(&store, 2)
        .run_index(&repository, &run_all(), "touch-posts")
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(*action.calls.lock().await, vec![vec![1, 2], vec![3, 4]]);
    assert_eq!(touched_keys(&store).await, vec![1, 2]);
    assert_eq!(store.rows(ACTION_LOGS_TABLE).await.len(), 2);
}
