use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use restify_core::UserIdentity;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

use super::restify_request;

pub async fn index_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .repository_service
        .index(repository.as_ref(), &request)
        .await?;
    Ok(Json(body))
}

pub async fn store_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .store(repository.as_ref(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn show_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .repository_service
        .show(repository.as_ref(), &request, &id)
        .await?;
    Ok(Json(body))
}

pub async fn update_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .update(repository.as_ref(), &request, &id)
        .await?;
    Ok(Json(body))
}

pub async fn destroy_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<StatusCode> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    state
        .repository_service
        .destroy(repository.as_ref(), &request, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn filters_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .repository_service
        .filters(repository.as_ref(), &request)
        .await?;
    Ok(Json(body))
}
