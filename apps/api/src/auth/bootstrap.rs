use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use restify_core::{AppError, UserIdentity};
use tower_sessions::Session;
use tracing::info;

use crate::dto::BootstrapSessionRequest;
use crate::error::ApiResult;
use crate::state::AppState;

use super::SESSION_USER_KEY;

/// Starts a session for the provided identity when the bootstrap token matches.
pub async fn bootstrap_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<BootstrapSessionRequest>,
) -> ApiResult<StatusCode> {
    let Some(expected_token) = state.bootstrap_token.as_deref() else {
        return Err(AppError::NotFound("session bootstrap is disabled".to_owned()).into());
    };
    if payload.token != expected_token {
        return Err(AppError::Unauthorized("invalid bootstrap token".to_owned()).into());
    }

    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(AppError::Validation("subject must not be empty".to_owned()).into());
    }

    let display_name = payload
        .display_name
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| subject.to_owned());
    let identity =
        UserIdentity::new(subject, display_name, payload.email).with_roles(payload.roles);

    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to cycle session id: {error}")))?;

    session
        .insert(SESSION_USER_KEY, &identity)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session identity: {error}"))
        })?;

    info!(subject = %identity.subject(), "bootstrapped session");
    Ok(StatusCode::NO_CONTENT)
}
