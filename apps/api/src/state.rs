use restify_application::{ActionDispatcher, GetterDispatcher, RepositoryService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repository_service: RepositoryService,
    pub action_dispatcher: ActionDispatcher,
    pub getter_dispatcher: GetterDispatcher,
    pub bootstrap_token: Option<String>,
    pub store_driver: &'static str,
}
