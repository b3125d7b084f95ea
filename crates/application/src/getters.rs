//! Getters: read-only counterparts of actions.

use async_trait::async_trait;
use restify_core::AppResult;
use restify_domain::Model;
use serde_json::{Value, json};

use crate::actions::Placement;
use crate::query::ModelQuery;
use crate::repository::Repository;
use crate::response::RestResponse;
use crate::store_ports::ModelReader;
use crate::support::title_from_key;
use crate::RestifyRequest;

/// Collaborators passed to a getter handler.
pub struct GetterContext<'a> {
    /// Incoming request.
    pub request: &'a RestifyRequest,
    /// Repository the getter was invoked on.
    pub repository: &'a dyn Repository,
    /// Read access to the store.
    pub reader: &'a dyn ModelReader,
}

/// Named read-only operation declared by a repository.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Returns the uri key clients invoke the getter by.
    fn uri_key(&self) -> &str;

    /// Returns the display name.
    fn name(&self) -> String {
        title_from_key(self.uri_key())
    }

    /// Returns where the getter may be invoked from.
    fn placement(&self) -> Placement {
        Placement::Everywhere
    }

    /// Returns whether the request may see and invoke the getter.
    fn authorized_to_see(&self, _request: &RestifyRequest) -> bool {
        true
    }

    /// Returns whether the getter may run against one model.
    fn authorized_to_run(&self, _request: &RestifyRequest, _model: &Model) -> bool {
        true
    }

    /// Constrains the model lookup on show routes.
    fn index_query(&self, _request: &RestifyRequest, _query: &mut ModelQuery) -> AppResult<()> {
        Ok(())
    }

    /// Runs the getter; index invocations receive no model.
    async fn handle(&self, context: GetterContext<'_>, model: Option<Model>)
    -> AppResult<RestResponse>;

    /// Describes the getter for listings.
    fn describe(&self) -> Value {
        let placement = self.placement();
        json!({
            "uriKey": self.uri_key(),
            "name": self.name(),
            "onlyOnIndex": placement == Placement::OnlyOnIndex,
            "onlyOnShow": placement == Placement::OnlyOnShow,
        })
    }
}
