use std::sync::Arc;

use restify_core::AppResult;
use restify_domain::{FieldType, parse_bool};
use serde::Serialize;
use serde_json::{Value, json};

use super::Visibility;
use super::matches::parse_date;
use crate::query::{ColumnRef, CompareOp, Condition, ModelQuery};
use crate::support::title_from_key;
use crate::RestifyRequest;

/// Kind reported to clients so they can render an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Yes/no toggle.
    Boolean,
    /// Whole number.
    Integer,
    /// One or more of a fixed option list.
    Select,
    /// Date or date range.
    Timestamp,
    /// Free text.
    Text,
}

impl FilterKind {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Select => "select",
            Self::Timestamp => "timestamp",
            Self::Text => "text",
        }
    }
}

/// Selectable option of a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOption {
    /// Display label.
    pub label: String,
    /// Submitted value.
    pub value: Value,
}

impl FilterOption {
    /// Creates an option.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Client-selectable filter activated through the encoded `filters` payload.
///
/// A filter goes through `boot` once per request, `resolve` (raw payload value to a typed value,
/// `None` skips the filter) and then `apply`. Visibility only governs discovery unless the pipeline is configured to
/// enforce it at apply time.
pub trait AdvancedFilter: Send + Sync {
    /// Returns the identity clients submit as `class`/`key`.
    fn key(&self) -> String;

    /// Returns the input kind.
    fn kind(&self) -> FilterKind;

    /// Returns the display title.
    fn title(&self) -> String {
        title_from_key(&self.key())
    }

    /// Returns the filtered column, when the filter targets one.
    fn column(&self) -> Option<String> {
        None
    }

    /// Returns selectable options.
    fn options(&self, _request: &RestifyRequest) -> Vec<FilterOption> {
        Vec::new()
    }

    /// Returns whether the request may discover the filter.
    fn authorized_to_see(&self, _request: &RestifyRequest) -> bool {
        true
    }

    /// Prepares the filter for a request before its value is resolved.
    fn boot(&self, _request: &RestifyRequest) -> AppResult<()> {
        Ok(())
    }

    /// Converts the submitted value; empty or invalid values return `None`.
    fn resolve(&self, request: &RestifyRequest, raw: &Value) -> Option<Value>;

    /// Applies a resolved value.
    fn apply(&self, request: &RestifyRequest, query: &mut ModelQuery, value: &Value)
    -> AppResult<()>;

    /// Describes the filter for the metadata listing.
    fn describe(&self, request: &RestifyRequest) -> Value {
        json!({
            "key": self.key(),
            "class": self.key(),
            "type": self.kind().as_str(),
            "title": self.title(),
            "column": self.column(),
            "options": self.options(request),
        })
    }
}

/// Equality on a boolean column.
#[derive(Debug, Clone)]
pub struct BooleanFilter {
    key: String,
    column: String,
    visibility: Visibility,
}

impl BooleanFilter {
    /// Creates a filter on a boolean column.
    #[must_use]
    pub fn new(key: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
            visibility: Visibility::always(),
        }
    }

    /// Restricts discovery.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }
}

impl AdvancedFilter for BooleanFilter {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Boolean
    }

    fn column(&self) -> Option<String> {
        Some(self.column.clone())
    }

    fn options(&self, _request: &RestifyRequest) -> Vec<FilterOption> {
        vec![FilterOption::new("Yes", true), FilterOption::new("No", false)]
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    fn resolve(&self, _request: &RestifyRequest, raw: &Value) -> Option<Value> {
        match raw {
            Value::Bool(value) => Some(Value::Bool(*value)),
            Value::Number(number) => match number.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            Value::String(text) if !text.trim().is_empty() => parse_bool(text).map(Value::Bool),
            _ => None,
        }
    }

    fn apply(
        &self,
        _request: &RestifyRequest,
        query: &mut ModelQuery,
        value: &Value,
    ) -> AppResult<()> {
        query.filter(Condition::eq(
            self.column.clone(),
            value.clone(),
            FieldType::Boolean,
        ));
        Ok(())
    }
}

/// Equality on an integer column; a list of integers becomes membership.
#[derive(Debug, Clone)]
pub struct IntegerFilter {
    key: String,
    column: String,
    visibility: Visibility,
}

impl IntegerFilter {
    /// Creates a filter on an integer column.
    #[must_use]
    pub fn new(key: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
            visibility: Visibility::always(),
        }
    }

    /// Restricts discovery.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }
}

fn integer_value(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

impl AdvancedFilter for IntegerFilter {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Integer
    }

    fn column(&self) -> Option<String> {
        Some(self.column.clone())
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    fn resolve(&self, _request: &RestifyRequest, raw: &Value) -> Option<Value> {
        match raw {
            Value::Array(items) => {
                let values = items
                    .iter()
                    .map(integer_value)
                    .collect::<Option<Vec<_>>>()?;
                (!values.is_empty())
                    .then(|| Value::Array(values.into_iter().map(Value::from).collect()))
            }
            other => integer_value(other).map(Value::from),
        }
    }

    fn apply(
        &self,
        _request: &RestifyRequest,
        query: &mut ModelQuery,
        value: &Value,
    ) -> AppResult<()> {
        let column = ColumnRef::root(self.column.clone());
        let condition = match value {
            Value::Array(values) => Condition::In {
                column,
                values: values.clone(),
                field_type: FieldType::Integer,
                negated: false,
            },
            other => Condition::Compare {
                column,
                op: CompareOp::Eq,
                value: other.clone(),
                field_type: FieldType::Integer,
            },
        };
        query.filter(condition);
        Ok(())
    }
}

/// Membership in a declared option list.
#[derive(Debug, Clone)]
pub struct SelectFilter {
    key: String,
    column: String,
    options: Vec<FilterOption>,
    visibility: Visibility,
}

impl SelectFilter {
    /// Creates a filter on a column with its allowed options.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        column: impl Into<String>,
        options: Vec<FilterOption>,
    ) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
            options,
            visibility: Visibility::always(),
        }
    }

    /// Restricts discovery.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }

    fn option_value(&self, raw: &Value) -> Option<Value> {
        self.options
            .iter()
            .find(|option| {
                option.value == *raw
                    || match (raw, &option.value) {
                        (Value::String(text), Value::Number(number)) => {
                            text.trim() == number.to_string()
                        }
                        _ => false,
                    }
            })
            .map(|option| option.value.clone())
    }
}

impl AdvancedFilter for SelectFilter {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Select
    }

    fn column(&self) -> Option<String> {
        Some(self.column.clone())
    }

    fn options(&self, _request: &RestifyRequest) -> Vec<FilterOption> {
        self.options.clone()
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    fn resolve(&self, _request: &RestifyRequest, raw: &Value) -> Option<Value> {
        match raw {
            Value::Array(items) => {
                let selected = items
                    .iter()
                    .filter_map(|item| self.option_value(item))
                    .collect::<Vec<_>>();
                (!selected.is_empty()).then_some(Value::Array(selected))
            }
            other => self.option_value(other),
        }
    }

    fn apply(
        &self,
        _request: &RestifyRequest,
        query: &mut ModelQuery,
        value: &Value,
    ) -> AppResult<()> {
        let values = match value {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        let field_type = values
            .first()
            .map(FieldType::infer)
            .unwrap_or(FieldType::Text);

        query.filter(Condition::In {
            column: ColumnRef::root(self.column.clone()),
            values,
            field_type,
            negated: false,
        });
        Ok(())
    }
}

/// Date equality, or an inclusive `[from, to]` date range.
#[derive(Debug, Clone)]
pub struct TimestampFilter {
    key: String,
    column: String,
    visibility: Visibility,
}

impl TimestampFilter {
    /// Creates a filter on a timestamp or date column.
    #[must_use]
    pub fn new(key: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
            visibility: Visibility::always(),
        }
    }

    /// Restricts discovery.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }
}

impl AdvancedFilter for TimestampFilter {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Timestamp
    }

    fn column(&self) -> Option<String> {
        Some(self.column.clone())
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    fn resolve(&self, _request: &RestifyRequest, raw: &Value) -> Option<Value> {
        match raw {
            Value::String(text) => parse_date(text).map(|date| Value::String(date.to_string())),
            Value::Array(items) if items.len() == 2 => {
                let bounds = items
                    .iter()
                    .map(|item| item.as_str().and_then(parse_date))
                    .collect::<Option<Vec<_>>>()?;
                Some(Value::Array(
                    bounds
                        .into_iter()
                        .map(|date| Value::String(date.to_string()))
                        .collect(),
                ))
            }
            _ => None,
        }
    }

    fn apply(
        &self,
        _request: &RestifyRequest,
        query: &mut ModelQuery,
        value: &Value,
    ) -> AppResult<()> {
        let column = ColumnRef::root(self.column.clone());
        let condition = match value {
            Value::Array(bounds) => match bounds.as_slice() {
                [low, high] => Condition::Between {
                    column,
                    low: low.clone(),
                    high: high.clone(),
                    field_type: FieldType::Date,
                    negated: false,
                },
                _ => return Ok(()),
            },
            other => Condition::Compare {
                column,
                op: CompareOp::Eq,
                value: other.clone(),
                field_type: FieldType::Date,
            },
        };
        query.filter(condition);
        Ok(())
    }
}

/// Closure applying a resolved advanced filter value.
pub type FilterApply =
    Arc<dyn Fn(&RestifyRequest, &mut ModelQuery, &Value) -> AppResult<()> + Send + Sync>;

/// Ad-hoc filter built from a closure; empty strings, arrays and nulls are skipped.
#[derive(Clone)]
pub struct CallbackFilter {
    key: String,
    kind: FilterKind,
    options: Vec<FilterOption>,
    visibility: Visibility,
    apply: FilterApply,
}

impl CallbackFilter {
    /// Creates a filter of a kind with its apply closure.
    #[must_use]
    pub fn new<F>(key: impl Into<String>, kind: FilterKind, apply: F) -> Self
    where
        F: Fn(&RestifyRequest, &mut ModelQuery, &Value) -> AppResult<()> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            kind,
            options: Vec::new(),
            visibility: Visibility::always(),
            apply: Arc::new(apply),
        }
    }

    /// Sets selectable options.
    #[must_use]
    pub fn with_options(mut self, options: Vec<FilterOption>) -> Self {
        self.options = options;
        self
    }

    /// Restricts discovery.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }
}

impl AdvancedFilter for CallbackFilter {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn kind(&self) -> FilterKind {
        self.kind
    }

    fn options(&self, _request: &RestifyRequest) -> Vec<FilterOption> {
        self.options.clone()
    }

    fn authorized_to_see(&self, request: &RestifyRequest) -> bool {
        self.visibility.allows(request)
    }

    fn resolve(&self, _request: &RestifyRequest, raw: &Value) -> Option<Value> {
        match raw {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::Array(items) if items.is_empty() => None,
            other => Some(other.clone()),
        }
    }

    fn apply(
        &self,
        request: &RestifyRequest,
        query: &mut ModelQuery,
        value: &Value,
    ) -> AppResult<()> {
        (self.apply)(request, query, value)
    }
}
