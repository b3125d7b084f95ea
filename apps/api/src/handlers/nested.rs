use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use restify_core::UserIdentity;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

use super::restify_request;

pub async fn nested_index_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, related)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .repository_service
        .nested_index(parent.as_ref(), &request, &id, &related)
        .await?;
    Ok(Json(body))
}

pub async fn nested_store_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, related)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .nested_store(parent.as_ref(), &request, &id, &related)
        .await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn nested_show_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, related, related_id)): Path<(String, String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .repository_service
        .nested_show(parent.as_ref(), &request, &id, &related, &related_id)
        .await?;
    Ok(Json(body))
}

pub async fn nested_update_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, related, related_id)): Path<(String, String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .nested_update(parent.as_ref(), &request, &id, &related, &related_id)
        .await?;
    Ok(Json(body))
}

pub async fn nested_destroy_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, related, related_id)): Path<(String, String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<StatusCode> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    state
        .repository_service
        .nested_destroy(parent.as_ref(), &request, &id, &related, &related_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
