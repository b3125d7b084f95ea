//! Translation of query plans into PostgreSQL statements.
//!
//! Rows travel as `jsonb`: reads select `to_jsonb(alias)` and writes go through
//! `jsonb_populate_record`, so column types are resolved by the database. Every identifier is
//! validated before it is quoted into a statement; every value is bound.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use restify_application::{Aggregate, AggregateFunction, ColumnRef, Condition, LogicalMode, ModelQuery};
use restify_core::{AppError, AppResult};
use restify_domain::{FieldType, Row, SortDirection, parse_bool};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

const ROOT_ALIAS: &str = "\"restify_root\"";

pub(super) type SqlBuilder = QueryBuilder<'static, Postgres>;

/// Builds `SELECT to_jsonb(root) ...` honoring joins, orders and pagination.
pub(super) fn select_rows(query: &ModelQuery) -> AppResult<SqlBuilder> {
    let mut builder = SqlBuilder::new(format!("SELECT to_jsonb({ROOT_ALIAS}) "));
    push_from(&mut builder, query)?;
    push_where(&mut builder, query.conditions())?;

    if !query.orders().is_empty() {
        builder.push(" ORDER BY ");
        for (index, order) in query.orders().iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(column_sql(&order.column, ROOT_ALIAS)?);
            builder.push(match order.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
        }
    }

    if let Some(limit) = query.limit() {
        builder.push(" LIMIT ");
        builder.push_bind(to_i64(limit, "limit")?);
    }
    if query.offset() > 0 {
        builder.push(" OFFSET ");
        builder.push_bind(to_i64(query.offset(), "offset")?);
    }

    Ok(builder)
}

/// Builds `SELECT COUNT(*) ...` over the query conditions.
pub(super) fn count_rows(query: &ModelQuery) -> AppResult<SqlBuilder> {
    let mut builder = SqlBuilder::new("SELECT COUNT(*) ");
    push_from(&mut builder, query)?;
    push_where(&mut builder, query.conditions())?;
    Ok(builder)
}

/// Builds a single-value aggregate returned as `jsonb`.
pub(super) fn aggregate_rows(query: &ModelQuery, aggregate: &Aggregate) -> AppResult<SqlBuilder> {
    let expression = match (aggregate.function, aggregate.column.as_deref()) {
        (AggregateFunction::Count, _) => "COUNT(*)".to_owned(),
        (function, Some(column)) => format!(
            "{}({ROOT_ALIAS}.{})",
            function.as_sql(),
            quote_identifier(column)?
        ),
        (function, None) => {
            return Err(AppError::Internal(format!(
                "aggregate '{}' ({}) requires a column",
                aggregate.key,
                function.as_sql()
            )));
        }
    };

    let mut builder = SqlBuilder::new(format!("SELECT to_jsonb({expression}) "));
    push_from(&mut builder, query)?;
    push_where(&mut builder, query.conditions())?;
    Ok(builder)
}

/// Builds an insert of the provided columns returning the stored row.
pub(super) fn insert_row(table: &str, row: Row) -> AppResult<SqlBuilder> {
    let table = quote_identifier(table)?;
    if row.is_empty() {
        return Ok(SqlBuilder::new(format!(
            "INSERT INTO {table} AS {ROOT_ALIAS} DEFAULT VALUES RETURNING to_jsonb({ROOT_ALIAS})"
        )));
    }

    let columns = quoted_columns(&row)?;
    let mut builder = SqlBuilder::new(format!(
        "INSERT INTO {table} AS {ROOT_ALIAS} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, "
    ));
    builder.push_bind(Json(Value::Object(row)));
    builder.push(format!(") RETURNING to_jsonb({ROOT_ALIAS})"));
    Ok(builder)
}

/// Builds an update of every matching row returning the updated rows.
pub(super) fn update_rows(query: &ModelQuery, changes: Row) -> AppResult<SqlBuilder> {
    ensure_without_joins(query, "update")?;
    let table = quote_identifier(query.table())?;
    let columns = quoted_columns(&changes)?;

    let mut builder = SqlBuilder::new(format!(
        "UPDATE {table} AS {ROOT_ALIAS} SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, "
    ));
    builder.push_bind(Json(Value::Object(changes)));
    builder.push("))");
    push_where(&mut builder, query.conditions())?;
    builder.push(format!(" RETURNING to_jsonb({ROOT_ALIAS})"));
    Ok(builder)
}

/// Builds a delete of every matching row.
pub(super) fn delete_rows(query: &ModelQuery) -> AppResult<SqlBuilder> {
    ensure_without_joins(query, "delete")?;
    let mut builder = SqlBuilder::new(format!(
        "DELETE FROM {} AS {ROOT_ALIAS}",
        quote_identifier(query.table())?
    ));
    push_where(&mut builder, query.conditions())?;
    Ok(builder)
}

/// Quotes a table or column name after checking it is a plain identifier.
pub(super) fn quote_identifier(name: &str) -> AppResult<String> {
    let mut characters = name.chars();
    let valid_start = characters
        .next()
        .is_some_and(|character| character.is_ascii_alphabetic() || character == '_');
    let valid_rest = characters.all(|character| character.is_ascii_alphanumeric() || character == '_');

    if !valid_start || !valid_rest || name.len() > 63 {
        return Err(AppError::Internal(format!("invalid sql identifier '{name}'")));
    }

    Ok(format!("\"{name}\""))
}

fn quoted_columns(row: &Row) -> AppResult<String> {
    if row.is_empty() {
        return Err(AppError::Internal("no columns to write".to_owned()));
    }

    row.keys()
        .map(|column| quote_identifier(column))
        .collect::<AppResult<Vec<_>>>()
        .map(|columns| columns.join(", "))
}

fn ensure_without_joins(query: &ModelQuery, statement: &str) -> AppResult<()> {
    if query.joins().is_empty() {
        return Ok(());
    }

    Err(AppError::Internal(format!(
        "joins are not supported in {statement} statements on '{}'",
        query.table()
    )))
}

fn push_from(builder: &mut SqlBuilder, query: &ModelQuery) -> AppResult<()> {
    builder.push(format!(
        "FROM {} AS {ROOT_ALIAS}",
        quote_identifier(query.table())?
    ));

    for join in query.joins() {
        let alias = quote_identifier(&join.alias)?;
        builder.push(format!(
            " LEFT JOIN {} AS {alias} ON {alias}.{} = {}",
            quote_identifier(&join.table)?,
            quote_identifier(&join.column)?,
            column_sql(&join.parent_column, ROOT_ALIAS)?
        ));
    }

    Ok(())
}

fn push_where(builder: &mut SqlBuilder, conditions: &[Condition]) -> AppResult<()> {
    if conditions.is_empty() {
        return Ok(());
    }

    let mut depth = 0;
    builder.push(" WHERE ");
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            builder.push(" AND ");
        }
        push_condition(builder, condition, ROOT_ALIAS, &mut depth)?;
    }

    Ok(())
}

fn push_condition(
    builder: &mut SqlBuilder,
    condition: &Condition,
    current: &str,
    depth: &mut usize,
) -> AppResult<()> {
    match condition {
        Condition::Compare {
            column,
            op,
            value,
            field_type,
        } => {
            builder.push(typed_column(column_sql(column, current)?, *field_type));
            builder.push(format!(" {} ", op.as_sql()));
            push_typed_value(builder, value, *field_type);
        }
        Condition::Like {
            column,
            pattern,
            case_insensitive,
        } => {
            builder.push(format!("({})::text", column_sql(column, current)?));
            builder.push(if *case_insensitive { " ILIKE " } else { " LIKE " });
            builder.push_bind(pattern.clone());
        }
        Condition::In {
            column,
            values,
            field_type,
            negated,
        } => {
            if values.is_empty() {
                builder.push(if *negated { "TRUE" } else { "FALSE" });
                return Ok(());
            }

            builder.push(typed_column(column_sql(column, current)?, *field_type));
            builder.push(if *negated { " NOT IN (" } else { " IN (" });
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    builder.push(", ");
                }
                push_typed_value(builder, value, *field_type);
            }
            builder.push(')');
        }
        Condition::Null { column, negated } => {
            builder.push(column_sql(column, current)?);
            builder.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Condition::Between {
            column,
            low,
            high,
            field_type,
            negated,
        } => {
            builder.push(typed_column(column_sql(column, current)?, *field_type));
            builder.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
            push_typed_value(builder, low, *field_type);
            builder.push(" AND ");
            push_typed_value(builder, high, *field_type);
        }
        Condition::Group { mode, conditions } => {
            if conditions.is_empty() {
                builder.push(match mode {
                    LogicalMode::And => "TRUE",
                    LogicalMode::Or => "FALSE",
                });
                return Ok(());
            }

            builder.push('(');
            for (index, child) in conditions.iter().enumerate() {
                if index > 0 {
                    builder.push(match mode {
                        LogicalMode::And => " AND ",
                        LogicalMode::Or => " OR ",
                    });
                }
                push_condition(builder, child, current, depth)?;
            }
            builder.push(')');
        }
        Condition::Not(inner) => {
            builder.push("NOT (");
            push_condition(builder, inner, current, depth)?;
            builder.push(')');
        }
        Condition::RelatedExists { link, condition } => {
            *depth += 1;
            let alias = format!("\"restify_exists_{depth}\"");
            builder.push(format!(
                "EXISTS (SELECT 1 FROM {} AS {alias} WHERE {alias}.{} = {}",
                quote_identifier(&link.table)?,
                quote_identifier(&link.related_column)?,
                column_sql(&link.parent_column, current)?
            ));
            if let Some(condition) = condition {
                builder.push(" AND ");
                push_condition(builder, condition, &alias, depth)?;
            }
            builder.push(')');
        }
    }

    Ok(())
}

fn column_sql(column: &ColumnRef, current: &str) -> AppResult<String> {
    let scope = match column.scope.as_deref() {
        Some(alias) => quote_identifier(alias)?,
        None => current.to_owned(),
    };

    Ok(format!("{scope}.{}", quote_identifier(&column.column)?))
}

fn typed_column(column: String, field_type: FieldType) -> String {
    match field_type {
        FieldType::Text => format!("({column})::text"),
        FieldType::Numeric => format!("({column})::numeric"),
        FieldType::Date => format!("({column})::date"),
        FieldType::Json => format!("to_jsonb({column})"),
        FieldType::Integer | FieldType::Boolean | FieldType::Timestamp | FieldType::Uuid => column,
    }
}

fn sql_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "text",
        FieldType::Integer => "bigint",
        FieldType::Numeric => "numeric",
        FieldType::Boolean => "boolean",
        FieldType::Timestamp => "timestamptz",
        FieldType::Date => "date",
        FieldType::Uuid => "uuid",
        FieldType::Json => "jsonb",
    }
}

/// Binds a value cast to the column type. Values that cannot be cast bind as NULL, which
/// matches nothing.
fn push_typed_value(builder: &mut SqlBuilder, value: &Value, field_type: FieldType) {
    builder.push("CAST(");
    builder.push_bind(bound_text(value, field_type));
    builder.push(format!(" AS {})", sql_type(field_type)));
}

fn bound_text(value: &Value, field_type: FieldType) -> Option<String> {
    if value.is_null() {
        return None;
    }

    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        other => other.to_string(),
    };

    match field_type {
        FieldType::Text => Some(text),
        FieldType::Json => Some(value.to_string()),
        FieldType::Integer => text
            .parse::<i64>()
            .ok()
            .or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|number| number.fract() == 0.0 && number.abs() < 9.0e15)
                    .map(|number| number as i64)
            })
            .map(|number| number.to_string()),
        FieldType::Numeric => text
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(|_| text),
        FieldType::Boolean => match value {
            Value::Bool(flag) => Some(flag.to_string()),
            _ => parse_bool(&text).map(|flag| flag.to_string()),
        },
        FieldType::Date => {
            let day = text.get(..10).unwrap_or(text.as_str()).to_owned();
            NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .ok()
                .map(|_| day)
        }
        FieldType::Timestamp => {
            let valid = DateTime::parse_from_rfc3339(&text).is_ok()
                || NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S").is_ok()
                || NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_ok();
            valid.then_some(text)
        }
        FieldType::Uuid => Uuid::parse_str(&text).ok().map(|uuid| uuid.to_string()),
    }
}

fn to_i64(value: usize, name: &str) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid query {name}: {error}")))
}

#[cfg(test)]
mod tests {
    use restify_application::{ColumnRef, Condition, Join, ModelQuery, RelationLink};
    use restify_domain::{FieldType, KeyType, SortDirection};
    use serde_json::json;

    use super::{bound_text, count_rows, delete_rows, quote_identifier, select_rows};

    #[test]
    fn identifiers_reject_injection() {
        assert_eq!(
            quote_identifier("user_id").unwrap_or_else(|_| unreachable!()),
            "\"user_id\""
        );
        assert!(quote_identifier("id; DROP TABLE users").is_err());
        assert!(quote_identifier("\"id\"").is_err());
        assert!(quote_identifier("").is_err());
    }

    #[test]
    fn select_renders_joins_orders_and_pagination() {
        let mut query = ModelQuery::new("posts", "id");
        query
            .join(Join {
                alias: "owner".to_owned(),
                table: "users".to_owned(),
                column: "id".to_owned(),
                parent_column: ColumnRef::root("user_id"),
            })
            .filter(Condition::eq("title", json!("Post 1"), FieldType::Text))
            .order_by(ColumnRef::scoped("owner", "name"), SortDirection::Asc)
            .for_page(2, 15);

        let builder = select_rows(&query).unwrap_or_else(|_| unreachable!());
        assert_eq!(
            builder.sql(),
            "SELECT to_jsonb(\"restify_root\") FROM \"posts\" AS \"restify_root\" \
             LEFT JOIN \"users\" AS \"owner\" ON \"owner\".\"id\" = \"restify_root\".\"user_id\" \
             WHERE (\"restify_root\".\"title\")::text = CAST($1 AS text) \
             ORDER BY \"owner\".\"name\" ASC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn related_exists_correlates_with_the_enclosing_scope() {
        let mut query = ModelQuery::new("posts", "id");
        query.filter(Condition::RelatedExists {
            link: RelationLink {
                table: "users".to_owned(),
                related_column: "id".to_owned(),
                parent_column: ColumnRef::root("user_id"),
            },
            condition: Some(Box::new(Condition::Like {
                column: ColumnRef::root("name"),
                pattern: "%ad%".to_owned(),
                case_insensitive: true,
            })),
        });

        let builder = count_rows(&query).unwrap_or_else(|_| unreachable!());
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM \"posts\" AS \"restify_root\" WHERE EXISTS (SELECT 1 FROM \"users\" \
             AS \"restify_exists_1\" WHERE \"restify_exists_1\".\"id\" = \"restify_root\".\"user_id\" \
             AND (\"restify_exists_1\".\"name\")::text ILIKE $1)"
        );
    }

    #[test]
    fn empty_key_sets_match_nothing() {
        let mut query = ModelQuery::new("posts", "id");
        query.where_keys_in(Vec::new(), KeyType::Integer);

        let builder = delete_rows(&query).unwrap_or_else(|_| unreachable!());
        assert_eq!(
            builder.sql(),
            "DELETE FROM \"posts\" AS \"restify_root\" WHERE FALSE"
        );
    }

    #[test]
    fn uncastable_values_bind_as_null() {
        assert_eq!(bound_text(&json!("12"), FieldType::Integer), Some("12".to_owned()));
        assert_eq!(bound_text(&json!("twelve"), FieldType::Integer), None);
        assert_eq!(
            bound_text(&json!("2024-01-05T10:00:00Z"), FieldType::Date),
            Some("2024-01-05".to_owned())
        );
        assert_eq!(bound_text(&json!("yes"), FieldType::Boolean), Some("true".to_owned()));
        assert_eq!(bound_text(&json!("not-a-uuid"), FieldType::Uuid), None);
        assert_eq!(bound_text(&json!({"a": 1}), FieldType::Json), Some("{\"a\":1}".to_owned()));
    }
}
