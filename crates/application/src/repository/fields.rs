use restify_core::ValidationErrors;
use restify_domain::{FieldType, Row, parse_bool};
use serde_json::Value;

use crate::filters::Visibility;
use crate::support::attribute_label;
use crate::RestifyRequest;

/// Validation rule of a payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Value must be present and not empty.
    Required,
    /// Null skips the remaining rules.
    Nullable,
    /// Value must be a string.
    String,
    /// Value must be an integer.
    Integer,
    /// Value must be numeric.
    Numeric,
    /// Value must be a boolean.
    Boolean,
    /// String value must not exceed the character count.
    MaxLength(usize),
    /// Value must be one of the listed values.
    In(Vec<String>),
}

/// Which rule set applies to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Creating a model: every field is checked.
    Store,
    /// Updating a model: only submitted fields are checked.
    Update,
}

/// Attribute exposed and accepted by a repository.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    field_type: Option<FieldType>,
    store_rules: Vec<Rule>,
    update_rules: Vec<Rule>,
    readonly: bool,
    hidden: bool,
    visibility: Visibility,
}

impl Field {
    /// Declares a field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            store_rules: Vec::new(),
            update_rules: Vec::new(),
            readonly: false,
            hidden: false,
            visibility: Visibility::always(),
        }
    }

    /// Sets the storage type used to cast submitted values.
    #[must_use]
    pub fn of_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Sets the rules for both store and update.
    #[must_use]
    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        let rules = rules.into_iter().collect::<Vec<_>>();
        self.store_rules = rules.clone();
        self.update_rules = rules;
        self
    }

    /// Sets the rules applied when storing.
    #[must_use]
    pub fn store_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.store_rules = rules.into_iter().collect();
        self
    }

    /// Sets the rules applied when updating.
    #[must_use]
    pub fn update_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.update_rules = rules.into_iter().collect();
        self
    }

    /// Serializes the field but never fills it from payloads.
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Accepts the field from payloads but never serializes it.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Restricts who may read the field.
    #[must_use]
    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        self.visibility = Visibility::when(predicate);
        self
    }

    /// Returns the attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns whether payload values are written to the attribute.
    #[must_use]
    pub fn is_fillable(&self) -> bool {
        !self.readonly
    }

    /// Returns whether the attribute is serialized for the request.
    #[must_use]
    pub fn is_visible(&self, request: &RestifyRequest) -> bool {
        !self.hidden && self.visibility.allows(request)
    }

    /// Returns the rules applied in a mode.
    #[must_use]
    pub fn rules_for(&self, mode: ValidationMode) -> &[Rule] {
        match mode {
            ValidationMode::Store => &self.store_rules,
            ValidationMode::Update => &self.update_rules,
        }
    }

    /// Casts a submitted value to the declared storage type; unknown shapes pass through.
    #[must_use]
    pub fn cast(&self, value: &Value) -> Value {
        match (self.field_type, value) {
            (Some(FieldType::Integer), Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| value.clone()),
            (Some(FieldType::Numeric), Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or_else(|_| value.clone()),
            (Some(FieldType::Boolean), Value::String(text)) => {
                parse_bool(text).map(Value::Bool).unwrap_or_else(|| value.clone())
            }
            (Some(FieldType::Boolean), Value::Number(number)) => match number.as_i64() {
                Some(0) => Value::Bool(false),
                Some(1) => Value::Bool(true),
                _ => value.clone(),
            },
            _ => value.clone(),
        }
    }
}

/// Validates a payload against declared field rules.
#[must_use]
pub fn validate_payload(fields: &[Field], payload: &Row, mode: ValidationMode) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for field in fields.iter().filter(|field| field.is_fillable()) {
        let rules = field.rules_for(mode);
        if rules.is_empty() {
            continue;
        }

        let label = attribute_label(field.name());
        let value = payload.get(field.name());

        if mode == ValidationMode::Update && value.is_none() {
            continue;
        }

        if rules.contains(&Rule::Required) && value.is_none_or(is_empty) {
            errors.add(field.name(), format!("The {label} field is required."));
            continue;
        }

        let Some(value) = value else {
            continue;
        };

        if value.is_null() && rules.contains(&Rule::Nullable) {
            continue;
        }

        for rule in rules {
            if let Some(message) = check_rule(rule, &label, value) {
                errors.add(field.name(), message);
            }
        }
    }

    errors
}

/// Returns the payload attributes that fillable fields accept, cast to their types.
#[must_use]
pub fn fillable_attributes(fields: &[Field], payload: &Row) -> Row {
    fields
        .iter()
        .filter(|field| field.is_fillable())
        .filter_map(|field| {
            payload
                .get(field.name())
                .map(|value| (field.name().to_owned(), field.cast(value)))
        })
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn check_rule(rule: &Rule, label: &str, value: &Value) -> Option<String> {
    match rule {
        Rule::Required | Rule::Nullable => None,
        Rule::String => (!value.is_string()).then(|| format!("The {label} must be a string.")),
        Rule::Integer => {
            let valid = value.is_i64()
                || value.is_u64()
                || value
                    .as_str()
                    .is_some_and(|text| text.trim().parse::<i64>().is_ok());
            (!valid).then(|| format!("The {label} must be an integer."))
        }
        Rule::Numeric => {
            let valid = value.is_number()
                || value
                    .as_str()
                    .is_some_and(|text| text.trim().parse::<f64>().is_ok());
            (!valid).then(|| format!("The {label} must be a number."))
        }
        Rule::Boolean => {
            let valid = value.is_boolean()
                || matches!(value.as_i64(), Some(0 | 1))
                || value
                    .as_str()
                    .is_some_and(|text| matches!(text, "0" | "1" | "true" | "false"));
            (!valid).then(|| format!("The {label} field must be true or false."))
        }
        Rule::MaxLength(max) => value
            .as_str()
            .filter(|text| text.chars().count() > *max)
            .map(|_| format!("The {label} may not be greater than {max} characters.")),
        Rule::In(allowed) => {
            let candidate = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (!allowed.contains(&candidate)).then(|| format!("The selected {label} is invalid."))
        }
    }
}
