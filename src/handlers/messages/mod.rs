// handlers/messages - Message endpoints behind the bearer-token guards
//
// POST /messages                filtered, humanized listing
// POST /messages/delete         delete by id
// POST /messages/mark-complete  set is_completed by id

pub mod delete_post;
pub mod mark_complete_post;
pub mod query_post;

pub use delete_post::delete_post;
pub use mark_complete_post::mark_complete_post;
pub use query_post::query_post;

use axum::Json;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::filter::Filter;
use crate::models::Message;

/// Body shared by the batch endpoints
#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<Value>,
}

impl IdsRequest {
    /// `id IN ids` over `table`; `None` when there is nothing to touch
    pub fn to_filter(&self, table: &str) -> Result<Option<Filter>, ApiError> {
        if let Some(bad) = self.ids.iter().find(|id| !(id.is_string() || id.is_number())) {
            return Err(ApiError::bad_request(format!("ids must be strings or numbers, got {}", bad)));
        }
        if self.ids.is_empty() {
            return Ok(None);
        }

        let mut filter = Filter::new(table).map_err(|e| ApiError::internal("Error building message filter", e))?;
        filter
            .is_in(Message::ID, self.ids.clone())
            .map_err(|e| ApiError::internal("Error building message filter", e))?;
        Ok(Some(filter))
    }
}

pub(crate) fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Loose boolean: false, null, 0, "" and absent are false, anything else true
pub(crate) fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}
