use std::cmp::Ordering;
use std::collections::HashMap;

use restify_application::{
    Aggregate, AggregateFunction, ColumnRef, CompareOp, Condition, LogicalMode, ModelQuery,
};
use restify_core::{AppError, AppResult};
use restify_domain::{FieldType, Row, SortDirection, parse_bool};
use serde_json::{Number, Value};

/// Committed or working tables by name.
pub(super) type Tables<'a> = HashMap<&'a str, &'a [Row]>;

/// Rows visible while evaluating one condition: the current root row and its joined rows.
struct Scope<'a> {
    root: &'a Row,
    joined: HashMap<String, Option<&'a Row>>,
}

impl<'a> Scope<'a> {
    fn new(root: &'a Row) -> Self {
        Self {
            root,
            joined: HashMap::new(),
        }
    }

    fn value(&self, column: &ColumnRef) -> AppResult<Option<&'a Value>> {
        match column.scope.as_deref() {
            None => Ok(self.root.get(&column.column)),
            Some(alias) => match self.joined.get(alias) {
                Some(row) => Ok((*row).and_then(|row| row.get(&column.column))),
                None => Err(AppError::Internal(format!(
                    "column '{}' references unknown join '{alias}'",
                    column.column
                ))),
            },
        }
    }
}

/// Returns rows of the query table matching every condition, ordered and paginated.
pub(super) fn select_rows(tables: &Tables<'_>, query: &ModelQuery) -> AppResult<Vec<Row>> {
    let mut selected = Vec::new();
    for row in table_rows(tables, query.table()) {
        let scope = join_scope(tables, query, row)?;
        if conditions_match(tables, &scope, query.conditions())? {
            selected.push(scope);
        }
    }

    let mut failure = None;
    selected.sort_by(|left, right| {
        for order in query.orders() {
            let (left, right) = match (left.value(&order.column), right.value(&order.column)) {
                (Ok(left), Ok(right)) => (left, right),
                (Err(error), _) | (_, Err(error)) => {
                    failure.get_or_insert(error);
                    return Ordering::Equal;
                }
            };
            let ordering = order_values(left, right);
            let ordering = match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    if let Some(error) = failure {
        return Err(error);
    }

    Ok(selected
        .into_iter()
        .skip(query.offset())
        .take(query.limit().unwrap_or(usize::MAX))
        .map(|scope| scope.root.clone())
        .collect())
}

/// Returns rows matching the conditions, ignoring ordering and pagination.
pub(super) fn matching_rows<'a>(
    tables: &Tables<'a>,
    query: &ModelQuery,
) -> AppResult<Vec<&'a Row>> {
    let mut matching = Vec::new();
    for row in table_rows(tables, query.table()) {
        if row_matches(tables, query, row)? {
            matching.push(row);
        }
    }
    Ok(matching)
}

/// Returns whether one row of the query table matches every condition.
pub(super) fn row_matches(tables: &Tables<'_>, query: &ModelQuery, row: &Row) -> AppResult<bool> {
    let scope = join_scope(tables, query, row)?;
    conditions_match(tables, &scope, query.conditions())
}

/// Evaluates an aggregate over the matching rows.
pub(super) fn aggregate_rows(
    tables: &Tables<'_>,
    query: &ModelQuery,
    aggregate: &Aggregate,
) -> AppResult<Value> {
    let rows = matching_rows(tables, query)?;
    if aggregate.function == AggregateFunction::Count {
        return Ok(Value::from(rows.len()));
    }

    let column = aggregate.column.as_deref().ok_or_else(|| {
        AppError::Internal(format!("aggregate '{}' requires a column", aggregate.key))
    })?;
    let values = rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_null())
        .collect::<Vec<_>>();
    if values.is_empty() {
        return Ok(Value::Null);
    }

    Ok(match aggregate.function {
        AggregateFunction::Count => Value::from(values.len()),
        AggregateFunction::Min => values
            .iter()
            .copied()
            .min_by(|left, right| order_values(Some(*left), Some(*right)))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunction::Max => values
            .iter()
            .copied()
            .max_by(|left, right| order_values(Some(*left), Some(*right)))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunction::Sum => {
            if values.iter().all(|value| value.as_i64().is_some()) {
                Value::from(values.iter().filter_map(|value| value.as_i64()).sum::<i64>())
            } else {
                float_value(values.iter().filter_map(|value| as_number(value)).sum())
            }
        }
        AggregateFunction::Avg => {
            let numbers = values
                .iter()
                .filter_map(|value| as_number(value))
                .collect::<Vec<_>>();
            if numbers.is_empty() {
                Value::Null
            } else {
                let count = numbers.len() as f64;
                float_value(numbers.iter().sum::<f64>() / count)
            }
        }
    })
}

fn table_rows<'a>(tables: &Tables<'a>, table: &str) -> &'a [Row] {
    tables.get(table).copied().unwrap_or_default()
}

fn join_scope<'a>(tables: &Tables<'a>, query: &ModelQuery, row: &'a Row) -> AppResult<Scope<'a>> {
    let mut scope = Scope::new(row);
    for join in query.joins() {
        let parent = scope.value(&join.parent_column)?;
        let joined = parent.filter(|value| !value.is_null()).and_then(|parent| {
            table_rows(tables, &join.table)
                .iter()
                .find(|candidate| candidate.get(&join.column).is_some_and(|value| same_key(value, parent)))
        });
        scope.joined.insert(join.alias.clone(), joined);
    }
    Ok(scope)
}

fn conditions_match(
    tables: &Tables<'_>,
    scope: &Scope<'_>,
    conditions: &[Condition],
) -> AppResult<bool> {
    for condition in conditions {
        if !condition_matches(tables, scope, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn condition_matches(
    tables: &Tables<'_>,
    scope: &Scope<'_>,
    condition: &Condition,
) -> AppResult<bool> {
    Ok(match condition {
        Condition::Compare {
            column,
            op,
            value,
            field_type,
        } => scope.value(column)?.is_some_and(|actual| {
            compare_typed(actual, value, *field_type).is_some_and(|ordering| match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Neq => ordering != Ordering::Equal,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Gte => ordering != Ordering::Less,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Lte => ordering != Ordering::Greater,
            })
        }),
        Condition::Like {
            column,
            pattern,
            case_insensitive,
        } => scope
            .value(column)?
            .and_then(as_text)
            .is_some_and(|text| {
                if *case_insensitive {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(&text, pattern)
                }
            }),
        Condition::In {
            column,
            values,
            field_type,
            negated,
        } => match scope.value(column)?.filter(|actual| !actual.is_null()) {
            None => false,
            Some(actual) => {
                let found = values.iter().any(|candidate| {
                    compare_typed(actual, candidate, *field_type) == Some(Ordering::Equal)
                });
                found != *negated
            }
        },
        Condition::Null { column, negated } => {
            let is_null = scope.value(column)?.is_none_or(Value::is_null);
            is_null != *negated
        }
        Condition::Between {
            column,
            low,
            high,
            field_type,
            negated,
        } => match scope.value(column)?.filter(|actual| !actual.is_null()) {
            None => false,
            Some(actual) => {
                let above = compare_typed(actual, low, *field_type)
                    .is_some_and(|ordering| ordering != Ordering::Less);
                let below = compare_typed(actual, high, *field_type)
                    .is_some_and(|ordering| ordering != Ordering::Greater);
                (above && below) != *negated
            }
        },
        Condition::Group { mode, conditions } => match mode {
            LogicalMode::And => conditions_match(tables, scope, conditions)?,
            LogicalMode::Or => {
                let mut any = false;
                for condition in conditions {
                    if condition_matches(tables, scope, condition)? {
                        any = true;
                        break;
                    }
                }
                any
            }
        },
        Condition::Not(inner) => !condition_matches(tables, scope, inner)?,
        Condition::RelatedExists { link, condition } => {
            let Some(parent) = scope.value(&link.parent_column)?.filter(|value| !value.is_null())
            else {
                return Ok(false);
            };

            let mut exists = false;
            for related in table_rows(tables, &link.table) {
                if !related
                    .get(&link.related_column)
                    .is_some_and(|value| same_key(value, parent))
                {
                    continue;
                }
                let matches = match condition {
                    Some(condition) => condition_matches(tables, &Scope::new(related), condition)?,
                    None => true,
                };
                if matches {
                    exists = true;
                    break;
                }
            }
            exists
        }
    })
}

/// Compares a stored value with an expected one under the column's storage type.
fn compare_typed(actual: &Value, expected: &Value, field_type: FieldType) -> Option<Ordering> {
    if actual.is_null() || expected.is_null() {
        return None;
    }

    match field_type {
        FieldType::Integer | FieldType::Numeric => {
            as_number(actual)?.partial_cmp(&as_number(expected)?)
        }
        FieldType::Boolean => Some(as_bool(actual)?.cmp(&as_bool(expected)?)),
        FieldType::Date => {
            let actual = as_text(actual)?;
            let expected = as_text(expected)?;
            Some(date_part(&actual).cmp(date_part(&expected)))
        }
        FieldType::Uuid => Some(
            as_text(actual)?
                .to_ascii_lowercase()
                .cmp(&as_text(expected)?.to_ascii_lowercase()),
        ),
        FieldType::Text | FieldType::Timestamp => Some(as_text(actual)?.cmp(&as_text(expected)?)),
        FieldType::Json => Some(if actual == expected {
            Ordering::Equal
        } else {
            Ordering::Less
        }),
    }
}

/// Orders values the way a database orders a column: nulls sort after every value.
fn order_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.filter(|value| !value.is_null());
    let right = right.filter(|value| !value.is_null());
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => match (as_number(left), as_number(right)) {
            (Some(left), Some(right)) if !left.is_nan() && !right.is_nan() => {
                left.partial_cmp(&right).unwrap_or(Ordering::Equal)
            }
            _ => match (left, right) {
                (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
                _ => as_text(left).cmp(&as_text(right)),
            },
        },
    }
}

fn same_key(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => as_number(left) == as_number(right),
        _ => as_text(left) == as_text(right),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|number| number != 0),
        Value::String(text) => parse_bool(text),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn date_part(text: &str) -> &str {
    text.get(..10).unwrap_or(text)
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Matches SQL `LIKE` patterns: `%` is any run of characters, `_` is one character.
fn like(text: &str, pattern: &str) -> bool {
    let text = text.chars().collect::<Vec<_>>();
    let pattern = pattern.chars().collect::<Vec<_>>();

    let (mut text_index, mut pattern_index) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while text_index < text.len() {
        match pattern.get(pattern_index) {
            Some('%') => {
                backtrack = Some((pattern_index, text_index));
                pattern_index += 1;
            }
            Some(expected) if *expected == '_' || *expected == text[text_index] => {
                text_index += 1;
                pattern_index += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    pattern_index = star + 1;
                    text_index = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pattern_index..].iter().all(|character| *character == '%')
}
