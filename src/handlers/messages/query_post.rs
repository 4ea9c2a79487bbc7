use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::truthy;
use crate::error::ApiError;
use crate::filter::{Filter, FilterError, SortDirection};
use crate::middleware::AuthSession;
use crate::models::Message;
use crate::server::AppState;
use crate::types::parse_timestamp;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    pub start_date: String,
    pub end_date: String,
    #[serde(default, deserialize_with = "truthy")]
    pub show_completed: bool,
    #[serde(default)]
    pub name_filter: Option<Value>,
}

impl MessageQuery {
    pub fn validate(&self) -> Result<(), ApiError> {
        if parse_timestamp(&self.start_date).is_none() {
            return Err(ApiError::bad_request(format!("startDate '{}' is not a valid timestamp", self.start_date)));
        }
        if parse_timestamp(&self.end_date).is_none() {
            return Err(ApiError::bad_request(format!("endDate '{}' is not a valid timestamp", self.end_date)));
        }
        Ok(())
    }

    /// Only a non-empty string narrows by name
    pub fn name_filter(&self) -> Option<&str> {
        self.name_filter
            .as_ref()
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn to_filter(&self, table: &str) -> Result<Filter, FilterError> {
        let mut filter = Filter::new(table)?;
        filter
            .select(vec!["*".to_string()])?
            .gte(Message::CREATED_AT, self.start_date.as_str())?
            .lte(Message::CREATED_AT, self.end_date.as_str())?
            .order(Message::CREATED_AT, SortDirection::Desc)?;

        if !self.show_completed {
            filter.eq(Message::IS_COMPLETED, false)?;
        }

        if let Some(name) = self.name_filter() {
            filter.contains_any(&[Message::FIRST_NAME, Message::LAST_NAME], name)?;
        }

        Ok(filter)
    }
}

/// POST /messages - messages created in [startDate, endDate], newest first,
/// with `created_at` rendered relative to now
pub async fn query_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    payload: Result<Json<MessageQuery>, JsonRejection>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let Json(query) = payload?;
    query.validate()?;

    let filter = query
        .to_filter(&state.config.store.messages_table)
        .map_err(|e| ApiError::internal("Error building message query", e))?;
    tracing::debug!(
        "Fetching messages for {} {}..{} (show_completed={}, name_filter={:?})",
        auth.caller(),
        query.start_date,
        query.end_date,
        query.show_completed,
        query.name_filter()
    );

    let rows = auth
        .store
        .select(&filter)
        .await
        .map_err(|e| ApiError::internal("Error fetching messages", e))?;

    let now = Utc::now();
    let messages = rows
        .into_iter()
        .map(|row| Message::from(row).humanize_created_at(now))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::internal("Error fetching messages", e))?;

    Ok(Json(messages))
}
