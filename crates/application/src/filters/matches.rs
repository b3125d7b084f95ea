use std::sync::Arc;

use chrono::NaiveDate;
use restify_core::{AppError, AppResult};
use restify_domain::{FieldType, MatchType, parse_bool};
use serde_json::Value;

use super::Visibility;
use crate::query::{ColumnRef, CompareOp, Condition, ModelQuery};
use crate::RestifyRequest;

/// Closure applying a match value to the query; the flag is set for `-key` requests.
pub type MatchCallback =
    Arc<dyn Fn(&RestifyRequest, &mut ModelQuery, &str, bool) -> AppResult<()> + Send + Sync>;

/// Custom match implementation declared as its own type.
pub trait Matchable: Send + Sync {
    /// Applies the raw request value to the query.
    fn apply(
        &self,
        request: &RestifyRequest,
        query: &mut ModelQuery,
        value: &str,
        negated: bool,
    ) -> AppResult<()>;
}

/// How a match key turns into a predicate.
#[derive(Clone)]
pub enum MatchDefinition {
    /// Typed predicate on the column named like the key.
    Typed(MatchType),
    /// Typed predicate on an explicit column.
    Column {
        /// Target column.
        column: String,
        /// Predicate type.
        match_type: MatchType,
    },
    /// Closure.
    Callback(MatchCallback),
    /// [`Matchable`] implementation.
    Custom(Arc<dyn Matchable>),
}

/// Match field declared by a repository.
#[derive(Clone)]
pub struct MatchFilter {
    key: String,
    definition: MatchDefinition,
    visibility: Visibility,
}

impl MatchFilter {
    /// Matches the column named like the key.
    #[must_use]
    pub fn new(key: impl Into<String>, match_type: MatchType) -> Self {
        Self::with_definition(key, MatchDefinition::Typed(match_type))
    }

    /// Matches an explicit column under a different request key.
    #[must_use]
    pub fn column(key: impl Into<String>, column: impl Into<String>, match_type: MatchType) -> Self {
        Self::with_definition(
            key,
            MatchDefinition::Column {
                column: column.into(),
                match_type,
            },
        )
    }

    /// Matches through a closure.
    #[must_use]
    pub fn callback<F>(key: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&RestifyRequest, &mut ModelQuery, &str, bool) -> AppResult<()>
            + Send
            + Sync
            + 'static,
    {
        Self::with_definition(key, MatchDefinition::Callback(Arc::new(callback)))
    }

    /// Matches through a [`Matchable`] implementation.
    #[must_use]
    pub fn custom(key: impl Into<String>, matchable: Arc<dyn Matchable>) -> Self {
        Self::with_definition(key, MatchDefinition::Custom(matchable))
    }

    fn with_definition(key: impl Into<String>, definition: MatchDefinition) -> Self {
        Self {
            key: key.into(),
            definition,
            visibility: Visibility::always(),
        }
    }

    /// Restricts who may use the match key.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }

    /// Returns the request key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Returns the declared predicate type, when typed.
    #[must_use]
    pub fn match_type(&self) -> Option<MatchType> {
        match &self.definition {
            MatchDefinition::Typed(match_type) | MatchDefinition::Column { match_type, .. } => {
                Some(*match_type)
            }
            MatchDefinition::Callback(_) | MatchDefinition::Custom(_) => None,
        }
    }

    /// Returns the matched column, when typed.
    #[must_use]
    pub fn target_column(&self) -> Option<&str> {
        match &self.definition {
            MatchDefinition::Typed(_) => Some(self.key.as_str()),
            MatchDefinition::Column { column, .. } => Some(column.as_str()),
            MatchDefinition::Callback(_) | MatchDefinition::Custom(_) => None,
        }
    }

    /// Returns whether the request may use the key.
    #[must_use]
    pub fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    /// Applies a raw request value; `negated` inverts the predicate on the same column.
    pub fn apply(
        &self,
        request: &RestifyRequest,
        query: &mut ModelQuery,
        raw: &str,
        negated: bool,
    ) -> AppResult<()> {
        match &self.definition {
            MatchDefinition::Typed(match_type) => {
                let condition =
                    typed_condition(ColumnRef::root(self.key.clone()), *match_type, raw, negated)?;
                query.filter(condition);
                Ok(())
            }
            MatchDefinition::Column { column, match_type } => {
                let condition =
                    typed_condition(ColumnRef::root(column.clone()), *match_type, raw, negated)?;
                query.filter(condition);
                Ok(())
            }
            MatchDefinition::Callback(callback) => callback(request, query, raw, negated),
            MatchDefinition::Custom(matchable) => matchable.apply(request, query, raw, negated),
        }
    }
}

/// Builds the predicate of a typed match.
///
/// The literal `null` checks for absence of a value regardless of type.
pub fn typed_condition(
    column: ColumnRef,
    match_type: MatchType,
    raw: &str,
    negated: bool,
) -> AppResult<Condition> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("null") {
        return Ok(Condition::Null { column, negated });
    }

    let op = if negated { CompareOp::Neq } else { CompareOp::Eq };

    match match_type {
        MatchType::Text => Ok(Condition::Compare {
            column,
            op,
            value: Value::String(raw.to_owned()),
            field_type: FieldType::Text,
        }),
        MatchType::Integer => {
            let value = raw.parse::<i64>().map_err(|_| {
                AppError::Validation(format!(
                    "match value '{raw}' for '{}' must be an integer",
                    column.column
                ))
            })?;
            Ok(Condition::Compare {
                column,
                op,
                value: Value::from(value),
                field_type: FieldType::Integer,
            })
        }
        MatchType::Boolean => {
            let value = parse_bool(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "match value '{raw}' for '{}' must be a boolean",
                    column.column
                ))
            })?;
            Ok(Condition::Compare {
                column,
                op,
                value: Value::Bool(value),
                field_type: FieldType::Boolean,
            })
        }
        MatchType::Datetime => {
            let date = parse_date(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "match value '{raw}' for '{}' must be a date",
                    column.column
                ))
            })?;
            Ok(Condition::Compare {
                column,
                op,
                value: Value::String(date.to_string()),
                field_type: FieldType::Date,
            })
        }
        MatchType::Between => {
            let bounds = raw.split(',').map(str::trim).collect::<Vec<_>>();
            let [low, high] = bounds.as_slice() else {
                return Err(AppError::Validation(format!(
                    "match value '{raw}' for '{}' must be two comma separated bounds",
                    column.column
                )));
            };
            let (low, high, field_type) = typed_bounds(low, high);
            Ok(Condition::Between {
                column,
                low,
                high,
                field_type,
                negated,
            })
        }
        MatchType::Array => {
            let items = raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>();
            let integers = items
                .iter()
                .map(|item| item.parse::<i64>().ok())
                .collect::<Option<Vec<_>>>();

            let (values, field_type) = match integers {
                Some(integers) if !integers.is_empty() => (
                    integers.into_iter().map(Value::from).collect(),
                    FieldType::Integer,
                ),
                _ => (
                    items
                        .into_iter()
                        .map(|item| Value::String(item.to_owned()))
                        .collect(),
                    FieldType::Text,
                ),
            };

            Ok(Condition::In {
                column,
                values,
                field_type,
                negated,
            })
        }
    }
}

/// Parses a date, accepting full timestamps by their date part.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn typed_bounds(low: &str, high: &str) -> (Value, Value, FieldType) {
    if let (Ok(low), Ok(high)) = (low.parse::<i64>(), high.parse::<i64>()) {
        return (Value::from(low), Value::from(high), FieldType::Integer);
    }

    if let (Ok(low), Ok(high)) = (low.parse::<f64>(), high.parse::<f64>()) {
        return (Value::from(low), Value::from(high), FieldType::Numeric);
    }

    if let (Some(low), Some(high)) = (parse_date(low), parse_date(high)) {
        return (
            Value::String(low.to_string()),
            Value::String(high.to_string()),
            FieldType::Date,
        );
    }

    (
        Value::String(low.to_owned()),
        Value::String(high.to_owned()),
        FieldType::Text,
    )
}
