use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::format::format_distance;
use crate::types::{parse_timestamp, Record};

/// A row of the messages table.
///
/// Kept as an open record so columns added on the store side pass through
/// without a relay release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Record);

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message {id} has no created_at")]
    MissingCreatedAt { id: String },

    #[error("message {id} has unreadable created_at '{value}'")]
    InvalidCreatedAt { id: String, value: String },
}

impl Message {
    pub const ID: &'static str = "id";
    pub const FIRST_NAME: &'static str = "first_name";
    pub const LAST_NAME: &'static str = "last_name";
    pub const CREATED_AT: &'static str = "created_at";
    pub const IS_COMPLETED: &'static str = "is_completed";

    pub fn id(&self) -> Option<&Value> {
        self.0.get(Self::ID)
    }

    pub fn is_completed(&self) -> bool {
        self.0.get(Self::IS_COMPLETED).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Replace `created_at` with its distance from `now` ("3 hours ago")
    pub fn humanize_created_at(mut self, now: DateTime<Utc>) -> Result<Self, MessageError> {
        let id = self.id().map(Value::to_string).unwrap_or_else(|| "<no id>".to_string());
        let raw = match self.0.get(Self::CREATED_AT) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => return Err(MessageError::MissingCreatedAt { id }),
            Some(other) => {
                return Err(MessageError::InvalidCreatedAt { id, value: other.to_string() });
            }
        };

        let created_at = parse_timestamp(&raw).ok_or(MessageError::InvalidCreatedAt { id, value: raw })?;
        self.0.insert(
            Self::CREATED_AT.to_string(),
            Value::String(format_distance(created_at, now)),
        );
        Ok(self)
    }
}

impl From<Record> for Message {
    fn from(record: Record) -> Self {
        Self(record)
    }
}
