use chrono::{DateTime, SecondsFormat, Utc};
use restify_core::UserIdentity;
use serde_json::Value;
use uuid::Uuid;

use crate::{Model, ModelKey, Row};

/// Table that stores action log rows.
pub const ACTION_LOGS_TABLE: &str = "action_logs";

/// Status recorded on completed log entries.
pub const ACTION_LOG_STATUS_FINISHED: &str = "finished";

/// Event recorded by an action log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionLogName {
    /// A model was created.
    Stored,
    /// A model was updated.
    Updated,
    /// A model was deleted.
    Deleted,
    /// A named repository action ran against the model.
    Action(String),
}

impl ActionLogName {
    /// Returns the persisted name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stored => "Stored",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
            Self::Action(name) => name.as_str(),
        }
    }
}

/// Immutable audit record of a mutation or action execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionLog {
    batch_id: Uuid,
    user_id: Option<String>,
    name: ActionLogName,
    actionable_type: String,
    actionable_id: Option<ModelKey>,
    original: Row,
    changes: Row,
    created_at: DateTime<Utc>,
}

impl ActionLog {
    /// Records the creation of a model.
    #[must_use]
    pub fn for_stored(
        batch_id: Uuid,
        actor: Option<&UserIdentity>,
        actionable_type: &str,
        model: &Model,
    ) -> Self {
        Self::new(
            batch_id,
            actor,
            ActionLogName::Stored,
            actionable_type,
            Some(model.key().clone()),
            Row::new(),
            model.attributes().clone(),
        )
    }

    /// Records an update, keeping only the attributes that actually changed.
    ///
    /// `original` is the pre-change value of every dirty key present before the update and
    /// `changes` is the new value of every dirty key.
    #[must_use]
    pub fn for_updated(
        batch_id: Uuid,
        actor: Option<&UserIdentity>,
        actionable_type: &str,
        before: &Model,
        after: &Model,
    ) -> Self {
        let changes = dirty_attributes(before.attributes(), after.attributes());
        let original = before
            .attributes()
            .iter()
            .filter(|(key, _)| changes.contains_key(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self::new(
            batch_id,
            actor,
            ActionLogName::Updated,
            actionable_type,
            Some(after.key().clone()),
            original,
            changes,
        )
    }

    /// Records the deletion of a model.
    #[must_use]
    pub fn for_deleted(
        batch_id: Uuid,
        actor: Option<&UserIdentity>,
        actionable_type: &str,
        model: &Model,
    ) -> Self {
        Self::new(
            batch_id,
            actor,
            ActionLogName::Deleted,
            actionable_type,
            Some(model.key().clone()),
            model.attributes().clone(),
            Row::new(),
        )
    }

    /// Records a repository action run; standalone actions pass no model.
    #[must_use]
    pub fn for_action(
        batch_id: Uuid,
        actor: Option<&UserIdentity>,
        action_name: &str,
        actionable_type: &str,
        model: Option<&Model>,
    ) -> Self {
        Self::new(
            batch_id,
            actor,
            ActionLogName::Action(action_name.to_owned()),
            actionable_type,
            model.map(|model| model.key().clone()),
            Row::new(),
            Row::new(),
        )
    }

    fn new(
        batch_id: Uuid,
        actor: Option<&UserIdentity>,
        name: ActionLogName,
        actionable_type: &str,
        actionable_id: Option<ModelKey>,
        original: Row,
        changes: Row,
    ) -> Self {
        Self {
            batch_id,
            user_id: actor.map(|actor| actor.subject().to_owned()),
            name,
            actionable_type: actionable_type.to_owned(),
            actionable_id,
            original,
            changes,
            created_at: Utc::now(),
        }
    }

    /// Returns the batch correlating entries written by one request.
    #[must_use]
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Returns the recorded event name.
    #[must_use]
    pub fn name(&self) -> &ActionLogName {
        &self.name
    }

    /// Returns the pre-change attributes.
    #[must_use]
    pub fn original(&self) -> &Row {
        &self.original
    }

    /// Returns the post-change attributes.
    #[must_use]
    pub fn changes(&self) -> &Row {
        &self.changes
    }

    /// Returns the polymorphic target type.
    #[must_use]
    pub fn actionable_type(&self) -> &str {
        self.actionable_type.as_str()
    }

    /// Returns the polymorphic target key.
    #[must_use]
    pub fn actionable_id(&self) -> Option<&ModelKey> {
        self.actionable_id.as_ref()
    }

    /// Returns the acting subject.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Converts the entry into the row persisted in [`ACTION_LOGS_TABLE`].
    #[must_use]
    pub fn to_row(&self) -> Row {
        let actionable_id = self
            .actionable_id
            .as_ref()
            .map(|key| Value::String(key.to_string()))
            .unwrap_or(Value::Null);

        let mut row = Row::new();
        row.insert("batch_id".to_owned(), Value::String(self.batch_id.to_string()));
        row.insert(
            "user_id".to_owned(),
            self.user_id.clone().map(Value::String).unwrap_or(Value::Null),
        );
        row.insert("name".to_owned(), Value::String(self.name.as_str().to_owned()));
        row.insert(
            "actionable_type".to_owned(),
            Value::String(self.actionable_type.clone()),
        );
        row.insert("actionable_id".to_owned(), actionable_id.clone());
        row.insert(
            "target_type".to_owned(),
            Value::String(self.actionable_type.clone()),
        );
        row.insert("target_id".to_owned(), actionable_id);
        row.insert(
            "status".to_owned(),
            Value::String(ACTION_LOG_STATUS_FINISHED.to_owned()),
        );
        row.insert("original".to_owned(), Value::Object(self.original.clone()));
        row.insert("changes".to_owned(), Value::Object(self.changes.clone()));
        row.insert("exception".to_owned(), Value::String(String::new()));
        row.insert(
            "created_at".to_owned(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        row
    }
}

/// Returns the attributes of `after` whose values differ from `before`.
#[must_use]
pub fn dirty_attributes(before: &Row, after: &Row) -> Row {
    after
        .iter()
        .filter(|(key, value)| before.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
