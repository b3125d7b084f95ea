use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use restify_core::UserIdentity;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

use super::restify_request;

pub async fn store_bulk_handler(
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
        .store_bulk(repository.as_ref(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn update_bulk_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .update_bulk(repository.as_ref(), &request)
        .await?;
    Ok(Json(body))
}

pub async fn destroy_bulk_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);

    let body = state
        .repository_service
        .destroy_bulk(repository.as_ref(), &request)
        .await?;
    Ok(Json(body))
}
