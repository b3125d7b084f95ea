use restify_application::{
    Aggregate, AggregateFunction, ColumnRef, CompareOp, Condition, Join, ModelQuery, ModelReader,
    ModelStore, RelationLink,
};
use restify_domain::{FieldType, Row, SortDirection};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresModelStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres model store tests: {error}");
    }

    Some(pool)
}

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

fn titles(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get("title").and_then(Value::as_str))
        .map(str::to_owned)
        .collect()
}

/// Seeds one author with two posts whose titles share a unique marker.
async fn seed_posts(store: &PostgresModelStore, marker: &str) -> i64 {
    let transaction = store.begin().await.unwrap_or_else(|_| unreachable!());
    let author = transaction
        .insert(
            "users",
            row(json!({"name": format!("Ada {marker}"), "email": format!("{marker}@example.test")})),
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    let author_id = author.get("id").and_then(Value::as_i64).unwrap_or_default();

    for (title, views) in [("Post 1", 10), ("Another one", 5)] {
        transaction
            .insert(
                "posts",
                row(json!({
                    "title": format!("{title} {marker}"),
                    "user_id": author_id,
                    "views": views,
                    "published_at": "2024-01-05T10:00:00Z"
                })),
            )
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    transaction
        .commit()
        .await
        .unwrap_or_else(|_| unreachable!());
    author_id
}

fn marked_posts(marker: &str) -> ModelQuery {
    let mut query = ModelQuery::new("posts", "id");
    query.filter(Condition::Like {
        column: ColumnRef::root("title"),
        pattern: format!("%{marker}"),
        case_insensitive: false,
    });
    query
}

#[tokio::test]
async fn inserted_rows_are_returned_with_generated_columns() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresModelStore::new(pool);
    let marker = Uuid::new_v4().simple().to_string();
    seed_posts(&store, &marker).await;

    let rows = store
        .fetch(&marked_posts(&marker))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.get("id").is_some_and(Value::is_i64)));
    assert!(rows.iter().all(|row| row.get("created_at").is_some_and(Value::is_string)));
}

#[tokio::test]
async fn typed_predicates_joins_and_aggregates_run_against_postgres() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresModelStore::new(pool);
    let marker = Uuid::new_v4().simple().to_string();
    seed_posts(&store, &marker).await;

    let mut exact = marked_posts(&marker);
    exact.filter(Condition::eq(
        "title",
        json!(format!("Another one {marker}")),
        FieldType::Text,
    ));
    assert_eq!(
        titles(&store.fetch(&exact).await.unwrap_or_else(|_| unreachable!())),
        vec![format!("Another one {marker}")]
    );

    let mut by_author = marked_posts(&marker);
    by_author
        .filter(Condition::RelatedExists {
            link: RelationLink {
                table: "users".to_owned(),
                related_column: "id".to_owned(),
                parent_column: ColumnRef::root("user_id"),
            },
            condition: Some(Box::new(Condition::Like {
                column: ColumnRef::root("name"),
                pattern: "ada%".to_owned(),
                case_insensitive: true,
            })),
        })
        .filter(Condition::eq("published_at", json!("2024-01-05"), FieldType::Date))
        .join(Join {
            alias: "owner".to_owned(),
            table: "users".to_owned(),
            column: "id".to_owned(),
            parent_column: ColumnRef::root("user_id"),
        })
        .order_by(ColumnRef::scoped("owner", "name"), SortDirection::Asc)
        .order_by(ColumnRef::root("views"), SortDirection::Asc);
    assert_eq!(
        titles(&store.fetch(&by_author).await.unwrap_or_else(|_| unreachable!())),
        vec![format!("Another one {marker}"), format!("Post 1 {marker}")]
    );

    let unpaginated = by_author.unpaginated();
    let sum = store
        .aggregate(
            &unpaginated,
            &Aggregate::of("views", AggregateFunction::Sum, "views"),
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(sum.as_f64(), Some(15.0));
    assert_eq!(
        store
            .count(&unpaginated)
            .await
            .unwrap_or_else(|_| unreachable!()),
        2
    );
}

#[tokio::test]
async fn dropped_transactions_roll_back() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresModelStore::new(pool);
    let marker = Uuid::new_v4().simple().to_string();
    seed_posts(&store, &marker).await;

    {
        let transaction = store.begin().await.unwrap_or_else(|_| unreachable!());
        let deleted = transaction
            .delete(&marked_posts(&marker))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(deleted, 2);
    }

    assert_eq!(
        store
            .count(&marked_posts(&marker))
            .await
            .unwrap_or_else(|_| unreachable!()),
        2
    );
}

#[tokio::test]
async fn committed_updates_return_the_new_rows() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresModelStore::new(pool);
    let marker = Uuid::new_v4().simple().to_string();
    seed_posts(&store, &marker).await;

    let transaction = store.begin().await.unwrap_or_else(|_| unreachable!());
    let mut query = marked_posts(&marker);
    query.filter(Condition::Compare {
        column: ColumnRef::root("views"),
        op: CompareOp::Gt,
        value: json!("7"),
        field_type: FieldType::Integer,
    });
    let updated = transaction
        .update(&query, row(json!({"is_published": true})))
        .await
        .unwrap_or_else(|_| unreachable!());
    transaction
        .commit()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(titles(&updated), vec![format!("Post 1 {marker}")]);
    assert_eq!(updated[0].get("is_published"), Some(&json!(true)));
}
