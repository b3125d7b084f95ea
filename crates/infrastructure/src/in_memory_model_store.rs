//! In-memory model store evaluating query plans over JSON rows.

mod evaluate;


use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use restify_application::{Aggregate, ModelQuery, ModelReader, ModelStore, StoreTransaction};
use restify_core::{AppError, AppResult};
use restify_domain::Row;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use evaluate::{aggregate_rows, matching_rows, row_matches, select_rows};

/// Column receiving auto-incremented integer keys.
const AUTO_INCREMENT_COLUMN: &str = "id";

#[derive(Debug, Clone, Default)]
struct TableState {
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    tables: HashMap<String, TableState>,
}

impl StoreState {
    fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|state| state.rows.as_slice())
            .unwrap_or_default()
    }

    fn tables(&self) -> HashMap<&str, &[Row]> {
        self.tables
            .iter()
            .map(|(name, state)| (name.as_str(), state.rows.as_slice()))
            .collect()
    }

    fn insert(&mut self, table: &str, mut row: Row) -> Row {
        let state = self.tables.entry(table.to_owned()).or_default();
        match row.get(AUTO_INCREMENT_COLUMN).and_then(Value::as_i64) {
            Some(id) => state.next_id = state.next_id.max(id),
            None if row
                .get(AUTO_INCREMENT_COLUMN)
                .is_none_or(Value::is_null) =>
            {
                state.next_id += 1;
                row.insert(AUTO_INCREMENT_COLUMN.to_owned(), Value::from(state.next_id));
            }
            None => {}
        }

        state.rows.push(row.clone());
        row
    }
}

/// Model store keeping tables in process memory.
///
/// Tables are created on first insert. Rows without an `id` receive the next integer of their
/// table. Transactions work on a snapshot and are serialized; commit publishes the snapshot.
#[derive(Clone, Default)]
pub struct InMemoryModelStore {
    state: Arc<RwLock<StoreState>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryModelStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts rows outside of any transaction, as used by seeders and tests.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
        let mut state = self.state.write().await;
        rows.into_iter()
            .map(|row| state.insert(table, row))
            .collect()
    }

    /// Returns every committed row of a table in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.state.read().await.rows(table).to_vec()
    }
}

#[async_trait]
impl ModelReader for InMemoryModelStore {
    async fn fetch(&self, query: &ModelQuery) -> AppResult<Vec<Row>> {
        let state = self.state.read().await;
        select_rows(&state.tables(), query)
    }

    async fn count(&self, query: &ModelQuery) -> AppResult<u64> {
        let state = self.state.read().await;
        count_rows(&state, query)
    }

    async fn aggregate(&self, query: &ModelQuery, aggregate: &Aggregate) -> AppResult<Value> {
        let state = self.state.read().await;
        aggregate_rows(&state.tables(), query, aggregate)
    }
}

#[async_trait]
impl ModelStore for InMemoryModelStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let guard = self.writer.clone().lock_owned().await;
        let snapshot = self.state.read().await.clone();

        Ok(Box::new(InMemoryTransaction {
            committed: self.state.clone(),
            working: Mutex::new(snapshot),
            _guard: guard,
        }))
    }
}

struct InMemoryTransaction {
    committed: Arc<RwLock<StoreState>>,
    working: Mutex<StoreState>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl ModelReader for InMemoryTransaction {
    async fn fetch(&self, query: &ModelQuery) -> AppResult<Vec<Row>> {
        let state = self.working.lock().await;
        select_rows(&state.tables(), query)
    }

    async fn count(&self, query: &ModelQuery) -> AppResult<u64> {
        let state = self.working.lock().await;
        count_rows(&state, query)
    }

    async fn aggregate(&self, query: &ModelQuery, aggregate: &Aggregate) -> AppResult<Value> {
        let state = self.working.lock().await;
        aggregate_rows(&state.tables(), query, aggregate)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert(&self, table: &str, row: Row) -> AppResult<Row> {
        Ok(self.working.lock().await.insert(table, row))
    }

    async fn update(&self, query: &ModelQuery, changes: Row) -> AppResult<Vec<Row>> {
        let mut state = self.working.lock().await;
        let positions = matching_positions(&state, query)?;

        let Some(table) = state.tables.get_mut(query.table()) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::with_capacity(positions.len());
        for position in positions {
            if let Some(row) = table.rows.get_mut(position) {
                for (column, value) in &changes {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn delete(&self, query: &ModelQuery) -> AppResult<u64> {
        let mut state = self.working.lock().await;
        let positions = matching_positions(&state, query)?;

        let Some(table) = state.tables.get_mut(query.table()) else {
            return Ok(0);
        };
        let mut position = 0;
        table.rows.retain(|_| {
            let keep = !positions.contains(&position);
            position += 1;
            keep
        });

        u64::try_from(positions.len())
            .map_err(|error| AppError::Internal(format!("invalid deleted row count: {error}")))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self {
            committed,
            working,
            _guard,
        } = *self;
        *committed.write().await = working.into_inner();
        debug!("committed in-memory transaction");
        Ok(())
    }
}

fn count_rows(state: &StoreState, query: &ModelQuery) -> AppResult<u64> {
    let count = matching_rows(&state.tables(), query)?.len();
    u64::try_from(count)
        .map_err(|error| AppError::Internal(format!("invalid row count: {error}")))
}

fn matching_positions(state: &StoreState, query: &ModelQuery) -> AppResult<Vec<usize>> {
    let tables = state.tables();
    let mut positions = Vec::new();
    for (position, row) in state.rows(query.table()).iter().enumerate() {
        if row_matches(&tables, query, row)? {
            positions.push(position);
        }
    }
    Ok(positions)
}
