use async_trait::async_trait;
use restify_core::AppResult;
use restify_domain::Row;
use serde_json::Value;

use crate::query::{Aggregate, ModelQuery};

/// Read access to repository tables.
#[async_trait]
pub trait ModelReader: Send + Sync {
    /// Returns rows matching the query, honoring joins, orders and pagination.
    async fn fetch(&self, query: &ModelQuery) -> AppResult<Vec<Row>>;

    /// Counts rows matching the query conditions.
    async fn count(&self, query: &ModelQuery) -> AppResult<u64>;

    /// Evaluates one aggregate over rows matching the query conditions.
    async fn aggregate(&self, query: &ModelQuery, aggregate: &Aggregate) -> AppResult<Value>;
}

/// Unit of work over repository tables.
///
/// Dropping a transaction without calling [`StoreTransaction::commit`] rolls back every write
/// performed through it.
#[async_trait]
pub trait StoreTransaction: ModelReader {
    /// Inserts a row and returns it as stored, including generated columns.
    async fn insert(&self, table: &str, row: Row) -> AppResult<Row>;

    /// Applies changes to every row matching the query and returns the updated rows.
    async fn update(&self, query: &ModelQuery, changes: Row) -> AppResult<Vec<Row>>;

    /// Deletes every row matching the query and returns the affected row count.
    async fn delete(&self, query: &ModelQuery) -> AppResult<u64>;

    /// Commits all writes.
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Storage backend for repository models.
#[async_trait]
pub trait ModelStore: ModelReader {
    /// Opens a new transaction.
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}
