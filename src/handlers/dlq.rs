use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::{queries, StoreError};
use crate::error::AppError;
use crate::AppState;

pub async fn list_dlq(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let entries = queries::list_dlq(&state.db, 100).await?;

    Ok(Json(json!({
        "dlq_entries": entries,
        "count": entries.len()
    })))
}

pub async fn requeue_dlq(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = queries::get_dlq(&state.db, id).await.map_err(|e| match e {
        StoreError::NotFound(id) => AppError::NotFound(format!("dlq entry {} not found", id)),
        other => AppError::Store(other),
    })?;

    state
        .ingestor
        .requeue(&entry)
        .await
        .map_err(|e| AppError::RequeueFailed(e.to_string()))?;

    Ok(Json(json!({
        "message": "DLQ entry requeued successfully",
        "dlq_id": id
    })))
}
