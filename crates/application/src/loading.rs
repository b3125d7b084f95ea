use restify_core::{AppError, AppResult};
use restify_domain::{Model, Row};
use serde_json::Value;

use crate::query::ModelQuery;
use crate::repository::Repository;
use crate::store_ports::ModelReader;

/// Builds models of a repository from stored rows.
pub fn hydrate(repository: &dyn Repository, rows: Vec<Row>) -> AppResult<Vec<Model>> {
    rows.into_iter()
        .map(|row| Model::from_row(repository.table(), repository.key_column(), row))
        .collect()
}

/// Parses a route identifier; identifiers that cannot be keys resolve to not found.
pub fn parse_key(repository: &dyn Repository, identifier: &str) -> AppResult<Value> {
    repository
        .key_type()
        .parse_identifier(identifier)
        .ok_or_else(|| not_found(repository, identifier))
}

/// Loads the model with the identifier through an already constrained query.
pub async fn first_or_fail(
    reader: &dyn ModelReader,
    repository: &dyn Repository,
    mut query: ModelQuery,
    identifier: &str,
) -> AppResult<Model> {
    let key = parse_key(repository, identifier)?;
    query.where_key(key, repository.key_type()).set_limit(Some(1));

    let row = reader
        .fetch(&query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(repository, identifier))?;

    Model::from_row(repository.table(), repository.key_column(), row)
}

fn not_found(repository: &dyn Repository, identifier: &str) -> AppError {
    AppError::NotFound(format!(
        "model '{identifier}' of repository '{}' does not exist",
        repository.uri_key()
    ))
}
