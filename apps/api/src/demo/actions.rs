use async_trait::async_trait;
use chrono::Utc;
use restify_application::{
    Action, ActionContext, Condition, Field, ModelQuery, Placement, RestResponse, RestifyRequest,
    Rule,
};
use restify_core::{AppError, AppResult};
use restify_domain::{FieldType, Model, Row};
use serde_json::{Value, json};

use super::{is_admin, owner_or_admin};

/// Publishes the selected posts.
pub struct PublishPosts;

#[async_trait]
impl Action for PublishPosts {
    fn uri_key(&self) -> &str {
        "publish-posts"
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        request.viewer().is_some()
    }

    fn authorized_to_run(&self, request: &RestifyRequest, model: &Model) -> bool {
        owner_or_admin(request.viewer(), Some(model), "user_id")
    }

    async fn handle(
        &self,
        context: ActionContext<'_>,
        models: Vec<Model>,
    ) -> AppResult<RestResponse> {
        let mut changes = Row::new();
        changes.insert("is_published".to_owned(), Value::Bool(true));
        changes.insert(
            "published_at".to_owned(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let published = update_models(&context, &models, changes).await?;
        Ok(RestResponse::ok()
            .message("posts published")
            .data(json!({ "published": published })))
    }
}

/// Moves the selected posts to another owner.
pub struct AssignOwner;

#[async_trait]
impl Action for AssignOwner {
    fn uri_key(&self) -> &str {
        "assign-owner"
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        is_admin(request.viewer())
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("user_id")
                .of_type(FieldType::Integer)
                .rules([Rule::Required, Rule::Integer]),
        ]
    }

    async fn handle(
        &self,
        context: ActionContext<'_>,
        models: Vec<Model>,
    ) -> AppResult<RestResponse> {
        let user_id = context
            .request
            .input("user_id")
            .and_then(|value| {
                value
                    .as_i64()
                    .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
            })
            .ok_or_else(|| AppError::Validation("user_id must be an integer".to_owned()))?;

        let mut owner = ModelQuery::new("users", "id");
        owner.filter(Condition::eq(
            "id",
            Value::from(user_id),
            FieldType::Integer,
        ));
        if context.transaction.count(&owner).await? == 0 {
            return Ok(RestResponse::invalid()
                .message("the given data was invalid")
                .errors(json!({ "user_id": ["The selected user id is invalid."] })));
        }

        let mut changes = Row::new();
        changes.insert("user_id".to_owned(), Value::from(user_id));
        let assigned = update_models(&context, &models, changes).await?;

        Ok(RestResponse::ok().data(json!({ "assigned": assigned })))
    }
}

/// Zeroes the view counter of every post; runs once without models.
pub struct ResetViews;

#[async_trait]
impl Action for ResetViews {
    fn uri_key(&self) -> &str {
        "reset-views"
    }

    fn standalone(&self) -> bool {
        true
    }

    fn placement(&self) -> Placement {
        Placement::OnlyOnIndex
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        is_admin(request.viewer())
    }

    async fn handle(
        &self,
        context: ActionContext<'_>,
        _models: Vec<Model>,
    ) -> AppResult<RestResponse> {
        let mut changes = Row::new();
        changes.insert("views".to_owned(), Value::from(0));

        let updated = context
            .transaction
            .update(&context.repository.new_query(), changes)
            .await?;

        Ok(RestResponse::ok()
            .message("views reset")
            .data(json!({ "reset": updated.len() })))
    }
}

async fn update_models(
    context: &ActionContext<'_>,
    models: &[Model],
    changes: Row,
) -> AppResult<usize> {
    if models.is_empty() {
        return Ok(0);
    }

    let repository = context.repository;
    let mut query = repository.new_query();
    query.where_keys_in(
        models.iter().map(|model| model.key().to_value()).collect(),
        repository.key_type(),
    );

    Ok(context.transaction.update(&query, changes).await?.len())
}
