//! Shared primitives for all Rust crates in Restify.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::UserIdentity;

/// Result type used across Restify crates.
pub type AppResult<T> = Result<T, AppError>;

/// Field-keyed validation messages.
///
/// Keys are field paths: `title` for single payloads, `0.title` for bulk payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// Creates an empty error bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one message for a field path.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Merges another bag, prefixing each field path.
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0
                .entry(format!("{prefix}.{field}"))
                .or_default()
                .extend(messages);
        }
    }

    /// Returns whether no messages were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns messages recorded for a field path.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// Converts the bag into a result, failing when any message exists.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidFields(self))
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let fields = self.0.keys().cloned().collect::<Vec<_>>().join(", ");
        write!(formatter, "invalid fields: {fields}")
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// One or more payload fields failed their rules.
    #[error("{0}")]
    InvalidFields(ValidationErrors),

    /// Transport payload could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// User is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// User is blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, ValidationErrors};

    #[test]
    fn validation_errors_prefix_bulk_paths() {
        let mut item = ValidationErrors::new();
        item.add("title", "The title field is required.");

        let mut bag = ValidationErrors::new();
        bag.merge_prefixed("1", item);

        assert_eq!(
            bag.get("1.title"),
            Some(["The title field is required.".to_owned()].as_slice())
        );
    }

    #[test]
    fn empty_validation_errors_convert_to_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut bag = ValidationErrors::new();
        bag.add("email", "invalid");
        assert!(matches!(bag.into_result(), Err(AppError::InvalidFields(_))));
    }
}
