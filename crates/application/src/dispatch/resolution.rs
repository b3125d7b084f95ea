use std::sync::Arc;

use restify_core::{AppError, AppResult};

use crate::actions::{Action, DispatchTarget, Placement};
use crate::getters::Getter;
use crate::repository::Repository;
use crate::RestifyRequest;

/// Lists actions the request may invoke from the route.
#[must_use]
pub fn available_actions(
    repository: &dyn Repository,
    request: &RestifyRequest,
    target: DispatchTarget,
) -> Vec<Arc<dyn Action>> {
    repository
        .actions()
        .into_iter()
        .filter(|action| action.authorized_to_see(request) && target.admits(action.placement()))
        .collect()
}

/// Lists getters the request may invoke from the route.
#[must_use]
pub fn available_getters(
    repository: &dyn Repository,
    request: &RestifyRequest,
    target: DispatchTarget,
) -> Vec<Arc<dyn Getter>> {
    repository
        .getters()
        .into_iter()
        .filter(|getter| getter.authorized_to_see(request) && target.admits(getter.placement()))
        .collect()
}

/// Locates an action by uri key.
///
/// Undeclared actions and actions not placed on the route are not found; declared actions the
/// request may not see are forbidden.
pub fn resolve_action(
    repository: &dyn Repository,
    request: &RestifyRequest,
    uri_key: &str,
    target: DispatchTarget,
) -> AppResult<Arc<dyn Action>> {
    let action = repository
        .actions()
        .into_iter()
        .find(|action| action.uri_key() == uri_key);

    resolve_unit(
        repository,
        "action",
        uri_key,
        target,
        action.map(|action| {
            let visible = action.authorized_to_see(request);
            let placement = action.placement();
            (action, visible, placement)
        }),
    )
}

/// Locates a getter by uri key, with the same failure kinds as [`resolve_action`].
pub fn resolve_getter(
    repository: &dyn Repository,
    request: &RestifyRequest,
    uri_key: &str,
    target: DispatchTarget,
) -> AppResult<Arc<dyn Getter>> {
    let getter = repository
        .getters()
        .into_iter()
        .find(|getter| getter.uri_key() == uri_key);

    resolve_unit(
        repository,
        "getter",
        uri_key,
        target,
        getter.map(|getter| {
            let visible = getter.authorized_to_see(request);
            let placement = getter.placement();
            (getter, visible, placement)
        }),
    )
}

fn resolve_unit<T>(
    repository: &dyn Repository,
    kind: &str,
    uri_key: &str,
    target: DispatchTarget,
    declared: Option<(T, bool, Placement)>,
) -> AppResult<T> {
    let Some((unit, visible, placement)) = declared else {
        return Err(AppError::NotFound(format!(
            "{kind} '{uri_key}' is not declared on repository '{}'",
            repository.uri_key()
        )));
    };

    if !visible {
        return Err(AppError::Forbidden(format!(
            "{kind} '{uri_key}' is not available for this request"
        )));
    }

    if !target.admits(placement) {
        return Err(AppError::NotFound(format!(
            "{kind} '{uri_key}' cannot run from this route"
        )));
    }

    Ok(unit)
}
