use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use restify_application::{DispatchTarget, RestResponse, RestifyRequest};
use restify_core::{AppError, UserIdentity};
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

use super::restify_request;

pub async fn list_index_actions_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .action_dispatcher
        .list(repository.as_ref(), &request, DispatchTarget::Index)
        .await?;
    Ok(Json(body))
}

pub async fn run_index_action_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path(repository): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);
    let action = action_key(&request)?;

    let response = state
        .action_dispatcher
        .run_index(repository.as_ref(), &request, &action)
        .await?;
    Ok(into_reply(response))
}

pub async fn list_show_actions_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, _id)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, None);

    let body = state
        .action_dispatcher
        .list(repository.as_ref(), &request, DispatchTarget::Show)
        .await?;
    Ok(Json(body))
}

pub async fn run_show_action_handler(
    State(state): State<AppState>,
    viewer: Option<Extension<UserIdentity>>,
    Path((repository, id)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    payload: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let repository = state.repository_service.resolve(&repository)?;
    let request = restify_request(viewer, query, payload);
    let action = action_key(&request)?;

    let response = state
        .action_dispatcher
        .run_show(repository.as_ref(), &request, &action, &id)
        .await?;
    Ok(into_reply(response))
}

/// Reads the invoked action from the `action` query parameter or payload key.
fn action_key(request: &RestifyRequest) -> ApiResult<String> {
    request
        .input("action")
        .and_then(|value| value.as_str().map(str::trim).map(ToOwned::to_owned))
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::Validation("the action field is required".to_owned()).into())
}

pub(super) fn into_reply(response: RestResponse) -> (StatusCode, Json<Value>) {
    let (status, body) = response.into_parts();
    (status, Json(body))
}
