use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use restify_core::UserIdentity;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

use super::restify_request;

pub async fn attach_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, relation)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .attach(parent.as_ref(), &request, &id, &relation)
        .await?;
    Ok(Json(body))
}

pub async fn detach_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, relation)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .detach(parent.as_ref(), &request, &id, &relation)
        .await?;
    Ok(Json(body))
}

pub async fn sync_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, relation)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let parent = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .sync(parent.as_ref(), &request, &id, &relation)
        .await?;
    Ok(Json(body))
}
