use async_trait::async_trait;
use restify_application::{
    Aggregate, AggregateFunction, Condition, Getter, GetterContext, ModelQuery, Placement,
    RestResponse,
};
use restify_core::{AppError, AppResult};
use restify_domain::{FieldType, Model};
use serde_json::json;

/// Counts the visible posts and sums their views.
pub struct PostStats;

#[async_trait]
impl Getter for PostStats {
    fn uri_key(&self) -> &str {
        "post-stats"
    }

    fn placement(&self) -> Placement {
        Placement::OnlyOnIndex
    }

    async fn handle(
        &self,
        context: GetterContext<'_>,
        _model: Option<Model>,
    ) -> AppResult<RestResponse> {
        let mut query = context.repository.new_query();
        context
            .repository
            .main_query(context.request, &mut query)?;

        let posts = context.reader.count(&query).await?;
        let views = context
            .reader
            .aggregate(
                &query,
                &Aggregate::of("views", AggregateFunction::Sum, "views"),
            )
            .await?;

        Ok(RestResponse::ok().data(json!({ "posts": posts, "views": views })))
    }
}

/// Summarizes one post with its comment count.
pub struct PostSummary;

#[async_trait]
impl Getter for PostSummary {
    fn uri_key(&self) -> &str {
        "post-summary"
    }

    fn placement(&self) -> Placement {
        Placement::OnlyOnShow
    }

    async fn handle(
        &self,
        context: GetterContext<'_>,
        model: Option<Model>,
    ) -> AppResult<RestResponse> {
        let model =
            model.ok_or_else(|| AppError::Internal("post summary requires a post".to_owned()))?;

        let mut comments = ModelQuery::new("comments", "id");
        comments.filter(Condition::eq(
            "post_id",
            model.key().to_value(),
            FieldType::Integer,
        ));
        let comment_count = context.reader.count(&comments).await?;

        Ok(RestResponse::ok().data(json!({
            "id": model.key().to_value(),
            "title": model.attribute("title"),
            "comments": comment_count,
        })))
    }
}
