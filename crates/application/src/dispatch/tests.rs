use std::sync::Arc;

use async_trait::async_trait;
use restify_core::{AppError, AppResult, UserIdentity};
use restify_domain::Model;
use serde_json::json;

use super::{RepositorySelection, available_actions, resolve_action, resolve_getter};
use crate::actions::{Action, ActionContext, DispatchTarget, Placement};
use crate::getters::{Getter, GetterContext};
use crate::repository::Repository;
use crate::response::RestResponse;
use crate::RestifyRequest;

struct NamedAction {
    uri_key: &'static str,
    placement: Placement,
    admins_only: bool,
}

#[async_trait]
impl Action for NamedAction {
    fn uri_key(&self) -> &str {
        self.uri_key
    }

    fn placement(&self) -> Placement {
        self.placement
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        !self.admins_only || request.viewer().is_some_and(|viewer| viewer.has_role("admin"))
    }

    async fn handle(
        &self,
        _context: ActionContext<'_>,
        _models: Vec<Model>,
    ) -> AppResult<RestResponse> {
        Ok(RestResponse::ok())
    }
}

struct StatsGetter;

#[async_trait]
impl Getter for StatsGetter {
    fn uri_key(&self) -> &str {
        "stats"
    }

    fn placement(&self) -> Placement {
        Placement::OnlyOnIndex
    }

    async fn handle(
        &self,
        _context: GetterContext<'_>,
        _model: Option<Model>,
    ) -> AppResult<RestResponse> {
        Ok(RestResponse::ok())
    }
}

struct PostsRepository;

impl Repository for PostsRepository {
    fn uri_key(&self) -> &str {
        "posts"
    }

    fn table(&self) -> &str {
        "posts"
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(NamedAction {
                uri_key: "publish-posts",
                placement: Placement::Everywhere,
                admins_only: false,
            }),
            Arc::new(NamedAction {
                uri_key: "purge-posts",
                placement: Placement::OnlyOnIndex,
                admins_only: true,
            }),
            Arc::new(NamedAction {
                uri_key: "feature-post",
                placement: Placement::OnlyOnShow,
                admins_only: false,
            }),
        ]
    }

    fn getters(&self) -> Vec<Arc<dyn Getter>> {
        vec![Arc::new(StatsGetter)]
    }
}

fn guest() -> RestifyRequest {
    RestifyRequest::new(None)
}

fn admin() -> RestifyRequest {
    RestifyRequest::new(Some(
        UserIdentity::new("root", "Root", None).with_roles(["admin"]),
    ))
}

#[test]
fn undeclared_action_is_not_found() {
    let result = resolve_action(&PostsRepository, &guest(), "missing", DispatchTarget::Index);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn hidden_action_is_forbidden_not_missing() {
    let result = resolve_action(&PostsRepository, &guest(), "purge-posts", DispatchTarget::Index);
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let resolved = resolve_action(&PostsRepository, &admin(), "purge-posts", DispatchTarget::Index);
    assert!(resolved.is_ok());
}

#[test]
fn show_only_action_is_not_found_on_index() {
    let result = resolve_action(&PostsRepository, &guest(), "feature-post", DispatchTarget::Index);
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let resolved = resolve_action(&PostsRepository, &guest(), "feature-post", DispatchTarget::Show);
    assert!(resolved.is_ok());
}

#[test]
fn available_actions_filter_by_visibility_and_placement() {
    let keys = |request: &RestifyRequest, target| {
        available_actions(&PostsRepository, request, target)
            .iter()
            .map(|action| action.uri_key().to_owned())
            .collect::<Vec<_>>()
    };

    assert_eq!(keys(&guest(), DispatchTarget::Index), vec!["publish-posts"]);
    assert_eq!(
        keys(&admin(), DispatchTarget::Index),
        vec!["publish-posts", "purge-posts"]
    );
    assert_eq!(
        keys(&guest(), DispatchTarget::Show),
        vec!["publish-posts", "feature-post"]
    );
}

#[test]
fn index_only_getter_is_not_found_on_show() {
    let result = resolve_getter(&PostsRepository, &guest(), "stats", DispatchTarget::Show);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn repositories_selector_accepts_all_or_keys() {
    let all = guest().with_payload(json!({"repositories": "all"}));
    assert_eq!(
        RepositorySelection::from_request(&PostsRepository, &all).ok(),
        Some(RepositorySelection::All)
    );

    let keys = guest().with_payload(json!({"repositories": [1, "2"]}));
    assert_eq!(
        RepositorySelection::from_request(&PostsRepository, &keys).ok(),
        Some(RepositorySelection::Keys(vec![json!(1), json!(2)]))
    );

    let missing = guest().with_payload(json!({}));
    assert!(matches!(
        RepositorySelection::from_request(&PostsRepository, &missing),
        Err(AppError::Validation(_))
    ));
}
