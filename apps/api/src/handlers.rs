pub mod actions;
pub mod bulk;
pub mod getters;
pub mod health;
pub mod nested;
pub mod pivots;
pub mod repositories;

use axum::{Extension, Json};
use restify_application::RestifyRequest;
use restify_core::UserIdentity;
use serde_json::Value;

/// Assembles the pipeline request from the extracted viewer, query pairs and JSON body.
fn restify_request(
    viewer: Option<Extension<UserIdentity>>,
    query: Vec<(String, String)>,
    payload: Option<Json<Value>>,
) -> RestifyRequest {
    RestifyRequest::new(viewer.map(|Extension(identity)| identity))
        .with_query(query)
        .with_payload(payload.map(|Json(value)| value).unwrap_or_default())
}
