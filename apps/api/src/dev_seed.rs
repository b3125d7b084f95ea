use restify_application::{ModelQuery, ModelStore, StoreTransaction};
use restify_core::{AppError, AppResult};
use restify_domain::Row;
use serde_json::{Value, json};
use tracing::info;

use crate::demo::ADMIN_ROLE;

const SEED_USERS: [(&str, &str); 3] = [
    ("Ada Lovelace", "ada@restify.local"),
    ("Grace Hopper", "grace@restify.local"),
    ("Alan Turing", "alan@restify.local"),
];

const SEED_ROLES: [&str; 2] = [ADMIN_ROLE, "editor"];

/// Seeds demo users, roles, posts and comments unless users already exist.
pub async fn run(store: &dyn ModelStore) -> AppResult<()> {
    if store.count(&ModelQuery::new("users", "id")).await? > 0 {
        info!("demo data already present, skipping seed");
        return Ok(());
    }

    let transaction = store.begin().await?;

    let mut user_ids = Vec::with_capacity(SEED_USERS.len());
    for (name, email) in SEED_USERS {
        let user = insert(
            transaction.as_ref(),
            "users",
            json!({ "name": name, "email": email }),
        )
        .await?;
        user_ids.push(key_of(&user)?);
    }

    let mut role_ids = Vec::with_capacity(SEED_ROLES.len());
    for name in SEED_ROLES {
        let role = insert(transaction.as_ref(), "roles", json!({ "name": name })).await?;
        role_ids.push(key_of(&role)?);
    }

    let [ada, grace, alan] = user_ids.as_slice() else {
        return Err(AppError::Internal("unexpected seeded user count".to_owned()));
    };
    let [admin_role, editor_role] = role_ids.as_slice() else {
        return Err(AppError::Internal("unexpected seeded role count".to_owned()));
    };

    for (user_id, role_id) in [(ada, admin_role), (grace, editor_role)] {
        insert(
            transaction.as_ref(),
            "role_user",
            json!({ "user_id": user_id, "role_id": role_id, "assigned_by": "seed" }),
        )
        .await?;
    }

    let posts = [
        json!({
            "user_id": ada,
            "title": "Notes on the analytical engine",
            "body": "The engine weaves algebraic patterns.",
            "category": "tutorial",
            "views": 120,
            "is_published": true,
            "published_at": "2026-01-05T09:00:00Z",
        }),
        json!({
            "user_id": grace,
            "title": "Compilers for everyone",
            "body": "Programs should read like English.",
            "category": "news",
            "views": 75,
            "is_published": true,
            "published_at": "2026-02-14T12:30:00Z",
        }),
        json!({
            "user_id": alan,
            "title": "Draft: machines that think",
            "body": null,
            "category": "general",
            "views": 0,
            "is_published": false,
            "published_at": null,
        }),
    ];

    let mut post_ids = Vec::with_capacity(posts.len());
    for post in posts {
        let post = insert(transaction.as_ref(), "posts", post).await?;
        post_ids.push(key_of(&post)?);
    }

    if let Some(first_post) = post_ids.first() {
        for (user_id, body) in [(grace, "Beautiful notes."), (alan, "Agreed, remarkable.")] {
            insert(
                transaction.as_ref(),
                "comments",
                json!({ "post_id": first_post, "user_id": user_id, "body": body }),
            )
            .await?;
        }
    }

    transaction.commit().await?;
    info!(
        users = user_ids.len(),
        posts = post_ids.len(),
        "seeded demo data"
    );

    Ok(())
}

async fn insert(transaction: &dyn StoreTransaction, table: &str, value: Value) -> AppResult<Row> {
    let row = match value {
        Value::Object(row) => row,
        _ => return Err(AppError::Internal(format!("seed row for '{table}' is not an object"))),
    };

    transaction.insert(table, row).await
}

fn key_of(row: &Row) -> AppResult<i64> {
    row.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::Internal("seeded row has no integer id".to_owned()))
}

#[cfg(test)]
mod tests {
    use restify_infrastructure::InMemoryModelStore;
    use serde_json::json;

    use super::run;

    #[tokio::test]
    async fn seeding_is_idempotent_and_links_rows() {
        let store = InMemoryModelStore::new();

        run(&store).await.unwrap_or_else(|_| unreachable!());
        run(&store).await.unwrap_or_else(|_| unreachable!());

        assert_eq!(store.rows("users").await.len(), 3);
        assert_eq!(store.rows("posts").await.len(), 3);
        let comments = store.rows("comments").await;
        assert_eq!(comments.len(), 2);
        assert!(
            comments
                .iter()
                .all(|comment| comment.get("post_id") == Some(&json!(1)))
        );
        assert_eq!(store.rows("role_user").await.len(), 2);
    }
}
