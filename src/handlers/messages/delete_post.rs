use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::Value;

use super::{success, IdsRequest};
use crate::error::ApiError;
use crate::middleware::AuthSession;
use crate::server::AppState;

/// POST /messages/delete - remove messages by id; unknown ids are ignored
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    payload: Result<Json<IdsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let Some(filter) = body.to_filter(&state.config.store.messages_table)? else {
        tracing::debug!("Delete requested with no ids");
        return Ok(success());
    };

    tracing::info!("Deleting {} message(s) for {}", body.ids.len(), auth.caller());
    auth.store
        .delete(&filter)
        .await
        .map_err(|e| ApiError::internal("Error deleting messages", e))?;

    Ok(success())
}
