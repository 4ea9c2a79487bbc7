use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::{json, Value};

use super::{success, IdsRequest};
use crate::error::ApiError;
use crate::middleware::AuthSession;
use crate::models::Message;
use crate::server::AppState;

/// POST /messages/mark-complete - set is_completed on messages by id.
/// Repeating the call is harmless; there is no route back to pending.
pub async fn mark_complete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    payload: Result<Json<IdsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let Some(filter) = body.to_filter(&state.config.store.messages_table)? else {
        tracing::debug!("Mark-complete requested with no ids");
        return Ok(success());
    };

    let mut patch = serde_json::Map::new();
    patch.insert(Message::IS_COMPLETED.to_string(), json!(true));

    tracing::info!("Marking {} message(s) complete for {}", body.ids.len(), auth.caller());
    auth.store
        .update(&filter, patch)
        .await
        .map_err(|e| ApiError::internal("Error marking messages as complete", e))?;

    Ok(success())
}
