//! PostgreSQL-backed model store.

mod sql;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use restify_application::{Aggregate, ModelQuery, ModelReader, ModelStore, StoreTransaction};
use restify_core::{AppError, AppResult};
use restify_domain::Row;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

/// PostgreSQL implementation of the model store port.
#[derive(Clone)]
pub struct PostgresModelStore {
    pool: PgPool,
}

impl PostgresModelStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelReader for PostgresModelStore {
    async fn fetch(&self, query: &ModelQuery) -> AppResult<Vec<Row>> {
        let mut connection = self.acquire().await?;
        fetch_rows(&mut connection, query).await
    }

    async fn count(&self, query: &ModelQuery) -> AppResult<u64> {
        let mut connection = self.acquire().await?;
        count_rows(&mut connection, query).await
    }

    async fn aggregate(&self, query: &ModelQuery, aggregate: &Aggregate) -> AppResult<Value> {
        let mut connection = self.acquire().await?;
        aggregate_rows(&mut connection, query, aggregate).await
    }
}

impl PostgresModelStore {
    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire database connection: {error}"))
        })
    }
}

#[async_trait]
impl ModelStore for PostgresModelStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start model transaction: {error}"))
        })?;

        Ok(Box::new(PostgresStoreTransaction {
            transaction: Mutex::new(transaction),
        }))
    }
}

/// Transaction handle; dropping it without commit rolls back.
struct PostgresStoreTransaction {
    transaction: Mutex<Transaction<'static, Postgres>>,
}

#[async_trait]
impl ModelReader for PostgresStoreTransaction {
    async fn fetch(&self, query: &ModelQuery) -> AppResult<Vec<Row>> {
        let mut transaction = self.transaction.lock().await;
        fetch_rows(&mut transaction, query).await
    }

    async fn count(&self, query: &ModelQuery) -> AppResult<u64> {
        let mut transaction = self.transaction.lock().await;
        count_rows(&mut transaction, query).await
    }

    async fn aggregate(&self, query: &ModelQuery, aggregate: &Aggregate) -> AppResult<Value> {
        let mut transaction = self.transaction.lock().await;
        aggregate_rows(&mut transaction, query, aggregate).await
    }
}

#[async_trait]
impl StoreTransaction for PostgresStoreTransaction {
    async fn insert(&self, table: &str, row: Row) -> AppResult<Row> {
        let mut builder = sql::insert_row(table, row)?;
        let mut transaction = self.transaction.lock().await;
        let stored = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_one(&mut **transaction)
            .await
            .map_err(|error| write_error(table, "insert", error))?;

        into_row(stored.0)
    }

    async fn update(&self, query: &ModelQuery, changes: Row) -> AppResult<Vec<Row>> {
        if changes.is_empty() {
            let mut transaction = self.transaction.lock().await;
            return fetch_rows(&mut transaction, query).await;
        }

        let mut builder = sql::update_rows(query, changes)?;
        let mut transaction = self.transaction.lock().await;
        let rows = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&mut **transaction)
            .await
            .map_err(|error| write_error(query.table(), "update", error))?;

        rows.into_iter().map(|row| into_row(row.0)).collect()
    }

    async fn delete(&self, query: &ModelQuery) -> AppResult<u64> {
        let mut builder = sql::delete_rows(query)?;
        let mut transaction = self.transaction.lock().await;
        let result = builder
            .build()
            .execute(&mut **transaction)
            .await
            .map_err(|error| write_error(query.table(), "delete", error))?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.transaction
            .into_inner()
            .commit()
            .await
            .map_err(|error| AppError::Internal(format!("failed to commit model transaction: {error}")))
    }
}

async fn fetch_rows(connection: &mut PgConnection, query: &ModelQuery) -> AppResult<Vec<Row>> {
    let mut builder = sql::select_rows(query)?;
    let rows = builder
        .build_query_scalar::<Json<Value>>()
        .fetch_all(connection)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to fetch rows from '{}': {error}", query.table()))
        })?;

    rows.into_iter().map(|row| into_row(row.0)).collect()
}

async fn count_rows(connection: &mut PgConnection, query: &ModelQuery) -> AppResult<u64> {
    let mut builder = sql::count_rows(query)?;
    let count = builder
        .build_query_scalar::<i64>()
        .fetch_one(connection)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count rows in '{}': {error}", query.table()))
        })?;

    u64::try_from(count).map_err(|error| AppError::Internal(format!("invalid row count: {error}")))
}

async fn aggregate_rows(
    connection: &mut PgConnection,
    query: &ModelQuery,
    aggregate: &Aggregate,
) -> AppResult<Value> {
    let mut builder = sql::aggregate_rows(query, aggregate)?;
    let value = builder
        .build_query_scalar::<Option<Json<Value>>>()
        .fetch_one(connection)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to evaluate aggregate '{}' on '{}': {error}",
                aggregate.key,
                query.table()
            ))
        })?;

    Ok(value.map_or(Value::Null, |value| value.0))
}

fn into_row(value: Value) -> AppResult<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(AppError::Internal(format!(
            "expected a row object from the database, got {other}"
        ))),
    }
}

/// Maps constraint violations to conflicts; anything else is internal.
fn write_error(table: &str, statement: &str, error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        if database_error.is_unique_violation() || database_error.is_foreign_key_violation() {
            return AppError::Conflict(format!(
                "{statement} on '{table}' violates a constraint: {}",
                database_error.message()
            ));
        }
    }

    AppError::Internal(format!("failed to {statement} rows in '{table}': {error}"))
}
