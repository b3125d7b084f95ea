use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use restify_core::{AppError, UserIdentity};
use tower_sessions::Session;

use crate::auth::SESSION_USER_KEY;
use crate::error::ApiResult;

/// Places the session identity, if any, in the request extensions.
///
/// Requests without an identity continue as guests; repository policies decide what guests may
/// do. An identity already present in the extensions is kept.
pub async fn load_viewer(session: Session, mut request: Request, next: Next) -> ApiResult<Response> {
    if let Some(identity) = resolve_identity(&session, request.extensions()).await? {
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}

/// Like [`load_viewer`] but rejects guests with `401`.
pub async fn require_auth(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = resolve_identity(&session, request.extensions())
        .await?
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

async fn resolve_identity(
    session: &Session,
    extensions: &axum::http::Extensions,
) -> ApiResult<Option<UserIdentity>> {
    if let Some(identity) = extensions.get::<UserIdentity>() {
        return Ok(Some(identity.clone()));
    }

    let identity = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?;
    Ok(identity)
}
