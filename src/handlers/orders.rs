use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

use crate::db::{queries, StoreError};
use crate::domain::Order;
use crate::error::AppError;
use crate::AppState;

/// Cache-aside point lookup: the cache answers hits, the store answers
/// misses, and a successful store read repopulates the cache before the
/// response goes out.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, AppError> {
    if let Some(order) = state.cache.get(&order_uid).await {
        debug!(%order_uid, "cache hit");
        return Ok(Json(order.as_ref().clone()));
    }

    debug!(%order_uid, "cache miss, reading store");

    let order = timeout(state.store_timeout, queries::get_order(&state.db, &order_uid))
        .await
        .map_err(|_| AppError::Store(StoreError::Timeout))?
        .map_err(|e| match e {
            StoreError::NotFound(id) => AppError::NotFound(format!("order {} not found", id)),
            other => AppError::Store(other),
        })?;

    let order = Arc::new(order);
    state.cache.insert(order.clone()).await;

    Ok(Json(order.as_ref().clone()))
}
