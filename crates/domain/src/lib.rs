//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod action_log;
mod field;
mod model;
mod security;

pub use action_log::{
    ACTION_LOG_STATUS_FINISHED, ACTION_LOGS_TABLE, ActionLog, ActionLogName, dirty_attributes,
};
pub use field::{FieldType, MatchType, SortDirection, parse_bool};
pub use model::{KeyType, Model, ModelKey, RelationValue, Row};
pub use security::Ability;
