use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use restify_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::FieldType;

/// Attribute map of one stored row.
pub type Row = Map<String, Value>;

/// Primary key type declared by a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Auto-incrementing integer key.
    Integer,
    /// UUID key.
    Uuid,
    /// Free-form string key.
    String,
}

impl KeyType {
    /// Returns the column storage type for this key.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Integer => FieldType::Integer,
            Self::Uuid => FieldType::Uuid,
            Self::String => FieldType::Text,
        }
    }

    /// Parses a route or payload identifier into the key's JSON representation.
    ///
    /// Returns `None` when the identifier cannot be a key of this type.
    #[must_use]
    pub fn parse_identifier(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            Self::Integer => raw.parse::<i64>().ok().map(Value::from),
            Self::Uuid => uuid::Uuid::parse_str(raw)
                .ok()
                .map(|value| Value::String(value.to_string())),
            Self::String => (!raw.is_empty()).then(|| Value::String(raw.to_owned())),
        }
    }

    /// Normalizes a JSON identifier (number or string) into the key representation.
    #[must_use]
    pub fn normalize_identifier(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Number(number) => match self {
                Self::Integer => number.as_i64().map(Value::from),
                Self::Uuid => None,
                Self::String => Some(Value::String(number.to_string())),
            },
            Value::String(text) => self.parse_identifier(text),
            _ => None,
        }
    }
}

/// Primary key of a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelKey {
    /// Integer key.
    Int(i64),
    /// UUID or string key.
    Text(String),
}

impl ModelKey {
    /// Reads a key from its JSON representation.
    pub fn from_value(value: &Value) -> AppResult<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(Self::Int).ok_or_else(|| {
                AppError::Internal(format!("model key '{number}' is not an integer"))
            }),
            Value::String(text) if !text.is_empty() => Ok(Self::Text(text.clone())),
            other => Err(AppError::Internal(format!(
                "unsupported model key value '{other}'"
            ))),
        }
    }

    /// Returns the JSON representation of the key.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
        }
    }
}

impl Display for ModelKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(formatter, "{value}"),
            Self::Text(value) => formatter.write_str(value),
        }
    }
}

/// Eager-loaded relation payload attached to a model.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    /// To-one relation; `None` when the foreign key is dangling or null.
    One(Option<Box<Model>>),
    /// To-many relation.
    Many(Vec<Model>),
}

/// One row of a repository table with its resolved key.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    table: String,
    key: ModelKey,
    attributes: Row,
    relations: BTreeMap<String, RelationValue>,
}

impl Model {
    /// Builds a model from a stored row, resolving the key column.
    pub fn from_row(table: impl Into<String>, key_column: &str, attributes: Row) -> AppResult<Self> {
        let table = table.into();
        let key_value = attributes.get(key_column).ok_or_else(|| {
            AppError::Internal(format!(
                "row of table '{table}' is missing key column '{key_column}'"
            ))
        })?;
        let key = ModelKey::from_value(key_value)?;

        Ok(Self {
            table,
            key,
            attributes,
            relations: BTreeMap::new(),
        })
    }

    /// Returns the table the model was loaded from.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the primary key.
    #[must_use]
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    /// Returns all stored attributes.
    #[must_use]
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Returns one attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Consumes the model and returns its attributes.
    #[must_use]
    pub fn into_attributes(self) -> Row {
        self.attributes
    }

    /// Attaches an eager-loaded relation.
    pub fn set_relation(&mut self, name: impl Into<String>, value: RelationValue) {
        self.relations.insert(name.into(), value);
    }

    /// Returns eager-loaded relations.
    #[must_use]
    pub fn relations(&self) -> &BTreeMap<String, RelationValue> {
        &self.relations
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{KeyType, Model, ModelKey};

    fn row(value: Value) -> super::Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn model_resolves_integer_key() {
        let model = Model::from_row("posts", "id", row(json!({"id": 7, "title": "Post 1"})));
        assert_eq!(model.map(|model| model.key().clone()).ok(), Some(ModelKey::Int(7)));
    }

    #[test]
    fn model_without_key_column_is_rejected() {
        let model = Model::from_row("posts", "id", row(json!({"title": "Post 1"})));
        assert!(model.is_err());
    }

    #[test]
    fn integer_keys_reject_non_numeric_identifiers() {
        assert_eq!(KeyType::Integer.parse_identifier("12"), Some(json!(12)));
        assert_eq!(KeyType::Integer.parse_identifier("abc"), None);
        assert_eq!(
            KeyType::Uuid.parse_identifier("not-a-uuid"),
            None
        );
    }

    #[test]
    fn string_keys_accept_numbers_from_payloads() {
        assert_eq!(
            KeyType::String.normalize_identifier(&json!(5)),
            Some(json!("5"))
        );
        assert_eq!(KeyType::Integer.normalize_identifier(&json!("5")), Some(json!(5)));
    }
}
