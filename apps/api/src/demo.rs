//! Demo blog domain served by the API: posts, users, comments and roles.

mod actions;
mod comments;
mod getters;
mod posts;
mod roles;
mod users;

use std::sync::Arc;

use restify_application::{ActionLogRepository, RepositoryRegistry};
use restify_core::{AppResult, UserIdentity};
use restify_domain::Model;

pub use comments::CommentRepository;
pub use posts::PostRepository;
pub use roles::RoleRepository;
pub use users::UserRepository;

/// Role granting every ability on the demo repositories.
pub const ADMIN_ROLE: &str = "admin";

/// Registers the demo repositories and the action log.
pub fn build_registry() -> AppResult<RepositoryRegistry> {
    RepositoryRegistry::builder()
        .register(Arc::new(PostRepository))
        .register(Arc::new(UserRepository))
        .register(Arc::new(CommentRepository))
        .register(Arc::new(RoleRepository))
        .register(Arc::new(ActionLogRepository))
        .build()
}

fn is_admin(viewer: Option<&UserIdentity>) -> bool {
    viewer.is_some_and(|viewer| viewer.has_role(ADMIN_ROLE))
}

/// Users table key of the viewer; subjects are user ids.
fn viewer_user_id(viewer: Option<&UserIdentity>) -> Option<i64> {
    viewer.and_then(|viewer| viewer.subject().parse::<i64>().ok())
}

/// Returns whether the model's owner column points at the viewer.
fn owns(viewer: Option<&UserIdentity>, model: Option<&Model>, column: &str) -> bool {
    let Some(user_id) = viewer_user_id(viewer) else {
        return false;
    };

    model
        .and_then(|model| model.attribute(column))
        .and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|text| text.parse::<i64>().ok()))
        })
        .is_some_and(|owner| owner == user_id)
}

fn owner_or_admin(viewer: Option<&UserIdentity>, model: Option<&Model>, column: &str) -> bool {
    is_admin(viewer) || owns(viewer, model, column)
}
