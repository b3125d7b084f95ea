use std::str::FromStr;

use restify_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage type of a repository column.
///
/// Every predicate carries one so storage adapters bind values with the column's SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 string column.
    Text,
    /// 64-bit integer column.
    Integer,
    /// Floating point or decimal column.
    Numeric,
    /// Boolean column.
    Boolean,
    /// Timestamp column, RFC3339 on the wire.
    Timestamp,
    /// Date-only column, `YYYY-MM-DD` on the wire.
    Date,
    /// UUID column.
    Uuid,
    /// Arbitrary JSON column.
    Json,
}

impl FieldType {
    /// Returns a stable storage value for the field type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::Json => "json",
        }
    }

    /// Infers a field type from a JSON value when the column type is unknown.
    #[must_use]
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::Boolean,
            Value::Number(number) if number.is_i64() || number.is_u64() => Self::Integer,
            Value::Number(_) => Self::Numeric,
            Value::String(_) | Value::Null => Self::Text,
            Value::Array(_) | Value::Object(_) => Self::Json,
        }
    }
}

impl FromStr for FieldType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "integer" => Ok(Self::Integer),
            "numeric" => Ok(Self::Numeric),
            "boolean" => Ok(Self::Boolean),
            "timestamp" => Ok(Self::Timestamp),
            "date" => Ok(Self::Date),
            "uuid" => Ok(Self::Uuid),
            "json" => Ok(Self::Json),
            _ => Err(AppError::Validation(format!(
                "unknown field type '{value}'"
            ))),
        }
    }
}

/// Predicate family applied by a match field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Exact string equality.
    Text,
    /// Integer equality.
    Integer,
    /// Boolean equality.
    Boolean,
    /// Calendar date equality on a timestamp column.
    Datetime,
    /// Inclusive `low,high` range.
    Between,
    /// Comma separated membership.
    Array,
}

impl MatchType {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Between => "between",
            Self::Array => "array",
        }
    }

    /// Returns the storage type used when binding matched values.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Text | Self::Between | Self::Array => FieldType::Text,
            Self::Integer => FieldType::Integer,
            Self::Boolean => FieldType::Boolean,
            Self::Datetime => FieldType::Date,
        }
    }
}

impl FromStr for MatchType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" | "string" => Ok(Self::Text),
            "integer" | "int" => Ok(Self::Integer),
            "boolean" | "bool" => Ok(Self::Boolean),
            "datetime" | "date" | "timestamp" => Ok(Self::Datetime),
            "between" => Ok(Self::Between),
            "array" => Ok(Self::Array),
            _ => Err(AppError::Validation(format!(
                "unknown match type '{value}'"
            ))),
        }
    }
}

/// Sort direction for ordering directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(AppError::Validation(format!(
                "unknown sort direction '{value}'"
            ))),
        }
    }
}

/// Parses loose boolean transport values (`true`, `1`, `yes`, `on` and their negatives).
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::{FieldType, MatchType, SortDirection, parse_bool};

    #[test]
    fn match_type_accepts_short_aliases() {
        assert_eq!(MatchType::from_str("int").ok(), Some(MatchType::Integer));
        assert_eq!(MatchType::from_str("bool").ok(), Some(MatchType::Boolean));
        assert!(MatchType::from_str("regex").is_err());
    }

    #[test]
    fn field_type_inference_distinguishes_numbers() {
        assert_eq!(FieldType::infer(&json!(3)), FieldType::Integer);
        assert_eq!(FieldType::infer(&json!(3.5)), FieldType::Numeric);
        assert_eq!(FieldType::infer(&json!("x")), FieldType::Text);
    }

    #[test]
    fn sort_direction_is_case_insensitive() {
        assert_eq!(SortDirection::from_str("DESC").ok(), Some(SortDirection::Desc));
    }

    #[test]
    fn loose_booleans_parse() {
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
