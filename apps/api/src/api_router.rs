mod cors;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{delete, get, post};
use restify_core::AppError;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;
use crate::{auth, handlers, middleware};

use self::cors::build_cors_layer;

pub fn build_router<S>(
    app_state: AppState,
    route_prefix: &str,
    frontend_url: &str,
    session_layer: SessionManagerLayer<S>,
) -> Result<Router, AppError>
where
    S: SessionStore + Clone,
{
    let restify_routes = restify_routes().route_layer(from_fn(middleware::load_viewer));

    let mut auth_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route_layer(from_fn(middleware::require_auth))
        .route("/auth/logout", post(auth::logout_handler));
    if app_state.bootstrap_token.is_some() {
        auth_routes = auth_routes.route("/auth/bootstrap", post(auth::bootstrap_handler));
    }

    let router = if route_prefix.is_empty() {
        Router::new().merge(restify_routes)
    } else {
        Router::new().nest(route_prefix, restify_routes)
    };

    Ok(router
        .merge(auth_routes)
        .route("/health", get(handlers::health::health_handler))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_url)?)
        .with_state(app_state))
}

fn restify_routes() -> Router<AppState> {
    use handlers::{actions, bulk, getters, nested, pivots, repositories};

    Router::new()
        .route(
            "/{repository}",
            get(repositories::index_handler).post(repositories::store_handler),
        )
        .route("/{repository}/filters", get(repositories::filters_handler))
        .route("/{repository}/bulk", post(bulk::store_bulk_handler))
        .route("/{repository}/bulk/update", post(bulk::update_bulk_handler))
        .route("/{repository}/bulk/delete", delete(bulk::destroy_bulk_handler))
        .route(
            "/{repository}/actions",
            get(actions::list_index_actions_handler).post(actions::run_index_action_handler),
        )
        .route("/{repository}/action", post(actions::run_index_action_handler))
        .route(
            "/{repository}/getters",
            get(getters::list_index_getters_handler),
        )
        .route(
            "/{repository}/getters/{getter}",
            get(getters::run_index_getter_handler),
        )
        .route(
            "/{repository}/{id}",
            get(repositories::show_handler)
                .put(repositories::update_handler)
                .patch(repositories::update_handler)
                .post(repositories::update_handler)
                .delete(repositories::destroy_handler),
        )
        .route(
            "/{repository}/{id}/actions",
            get(actions::list_show_actions_handler).post(actions::run_show_action_handler),
        )
        .route(
            "/{repository}/{id}/action",
            post(actions::run_show_action_handler),
        )
        .route(
            "/{repository}/{id}/getters",
            get(getters::list_show_getters_handler),
        )
        .route(
            "/{repository}/{id}/getters/{getter}",
            get(getters::run_show_getter_handler),
        )
        .route(
            "/{repository}/{id}/attach/{related}",
            post(pivots::attach_handler),
        )
        .route(
            "/{repository}/{id}/detach/{related}",
            post(pivots::detach_handler),
        )
        .route(
            "/{repository}/{id}/sync/{related}",
            post(pivots::sync_handler),
        )
        .route(
            "/{repository}/{id}/{related}",
            get(nested::nested_index_handler).post(nested::nested_store_handler),
        )
        .route(
            "/{repository}/{id}/{related}/{related_id}",
            get(nested::nested_show_handler)
                .put(nested::nested_update_handler)
                .patch(nested::nested_update_handler)
                .post(nested::nested_update_handler)
                .delete(nested::nested_destroy_handler),
        )
}

#[cfg(test)]
mod tests;
