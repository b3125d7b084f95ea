use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use restify_application::DispatchTarget;
use restify_core::UserIdentity;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

use super::actions::into_reply;
use super::restify_request;

pub async fn list_index_getters_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .getter_dispatcher
        .list(repository.as_ref(), &request, DispatchTarget::Index)
        .await?;
    Ok(Json(body))
}

pub async fn run_index_getter_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, getter)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let response = state
        .getter_dispatcher
        .run_index(repository.as_ref(), &request, &getter)
        .await?;
    Ok(into_reply(response))
}

pub async fn list_show_getters_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, _id)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .getter_dispatcher
        .list(repository.as_ref(), &request, DispatchTarget::Show)
        .await?;
    Ok(Json(body))
}

pub async fn run_show_getter_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id, getter)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let response = state
        .getter_dispatcher
        .run_show(repository.as_ref(), &request, &getter, &id)
        .await?;
    Ok(into_reply(response))
}
