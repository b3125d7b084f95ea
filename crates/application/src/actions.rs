//! Actions: named operations run against one, many or no models inside a transaction.

use async_trait::async_trait;
use restify_core::AppResult;
use restify_domain::Model;
use serde_json::{Value, json};

use crate::query::ModelQuery;
use crate::repository::{Field, Repository};
use crate::response::RestResponse;
use crate::store_ports::StoreTransaction;
use crate::support::title_from_key;
use crate::RestifyRequest;

/// Where an action or getter may be invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Index and show routes.
    Everywhere,
    /// Index routes only.
    OnlyOnIndex,
    /// Show routes only.
    OnlyOnShow,
}

impl Placement {
    /// Returns whether the unit may run on index routes.
    #[must_use]
    pub fn on_index(&self) -> bool {
        !matches!(self, Self::OnlyOnShow)
    }

    /// Returns whether the unit may run on show routes.
    #[must_use]
    pub fn on_show(&self) -> bool {
        !matches!(self, Self::OnlyOnIndex)
    }
}

/// Route an action or getter is dispatched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTarget {
    /// Repository index route.
    Index,
    /// Single model route.
    Show,
}

impl DispatchTarget {
    /// Returns whether the placement admits this route.
    #[must_use]
    pub fn admits(&self, placement: Placement) -> bool {
        match self {
            Self::Index => placement.on_index(),
            Self::Show => placement.on_show(),
        }
    }
}

/// Collaborators passed to an action handler.
pub struct ActionContext<'a> {
    /// Incoming request.
    pub request: &'a RestifyRequest,
    /// Repository the action was invoked on.
    pub repository: &'a dyn Repository,
    /// Transaction wrapping the current run.
    pub transaction: &'a dyn StoreTransaction,
}

/// Named operation declared by a repository.
#[async_trait]
pub trait Action: Send + Sync {
    /// Returns the uri key clients invoke the action by.
    fn uri_key(&self) -> &str;

    /// Returns the display name.
    fn name(&self) -> String {
        title_from_key(self.uri_key())
    }

    /// Runs once without models.
    fn standalone(&self) -> bool {
        false
    }

    /// Returns where the action may be invoked from.
    fn placement(&self) -> Placement {
        Placement::Everywhere
    }

    /// Returns whether the request may see and invoke the action.
    fn authorized_to_see(&self, _request: &RestifyRequest) -> bool {
        true
    }

    /// Returns whether the action may run against one model.
    fn authorized_to_run(&self, _request: &RestifyRequest, _model: &Model) -> bool {
        true
    }

    /// Returns the payload fields validated before the action runs.
    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }

    /// Constrains the models the action loads.
    fn index_query(&self, _request: &RestifyRequest, _query: &mut ModelQuery) -> AppResult<()> {
        Ok(())
    }

    /// Runs the action; standalone actions receive no models.
    async fn handle(&self, context: ActionContext<'_>, models: Vec<Model>)
    -> AppResult<RestResponse>;

    /// Describes the action for listings.
    fn describe(&self) -> Value {
        let placement = self.placement();
        json!({
            "uriKey": self.uri_key(),
            "name": self.name(),
            "standalone": self.standalone(),
            "onlyOnIndex": placement == Placement::OnlyOnIndex,
            "onlyOnShow": placement == Placement::OnlyOnShow,
            "payload": self
                .fields()
                .iter()
                .map(|field| field.name().to_owned())
                .collect::<Vec<_>>(),
        })
    }
}
