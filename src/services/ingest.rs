use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::OrderCache;
use crate::db::models::DlqEntry;
use crate::db::{queries, StoreError};
use crate::domain::{Order, ValidationError};
use crate::utils::retry::{retry, RetryError, RetryPolicy};

/// Terminal state of one ingested message.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Decoded, cache warmed, committed.
    Ingested,
    /// The aggregate already exists durably; re-delivery absorbed as a
    /// clean no-op with the original rows untouched.
    Duplicate,
    /// The durable write kept failing; the payload was parked in the
    /// dead letter queue for later requeue.
    DeadLettered(Uuid),
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Malformed payload: logged and dropped, no retry, no dead-letter.
    #[error("failed to decode order payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Decodable but structurally invalid: handled like a decode failure.
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    /// The write failed and the dead-letter fallback failed too; the
    /// message is lost and the error is surfaced to the caller.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives a message from raw bytes to a committed aggregate:
/// decode, validate, warm the cache, then write durably with bounded
/// retries and a dead-letter fallback.
#[derive(Clone)]
pub struct OrderIngestor {
    pool: PgPool,
    cache: OrderCache,
    retry_policy: RetryPolicy,
    store_timeout: Duration,
}

impl OrderIngestor {
    pub fn new(
        pool: PgPool,
        cache: OrderCache,
        retry_policy: RetryPolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            cache,
            retry_policy,
            store_timeout,
        }
    }

    pub async fn ingest(&self, payload: &[u8]) -> Result<IngestOutcome, IngestError> {
        let order: Order = serde_json::from_slice(payload)?;
        order.validate()?;

        let order = Arc::new(order);

        // Write-through before durability is confirmed. If the insert
        // later fails for good, the stale entry ages out with the TTL
        // while the store stays authoritative for the miss path.
        self.cache.insert(order.clone()).await;

        match retry(&self.retry_policy, || self.insert_with_deadline(&order)).await {
            Ok(()) => {
                info!(order_uid = %order.order_uid, "order committed");
                Ok(IngestOutcome::Ingested)
            }
            Err(RetryError::Permanent(StoreError::Duplicate(order_uid))) => {
                info!(order_uid = %order_uid, "re-delivered order skipped");
                Ok(IngestOutcome::Duplicate)
            }
            Err(failure) => {
                let error = failure.into_inner();
                warn!(
                    order_uid = %order.order_uid,
                    error = %error,
                    "durable write failed, moving order to dead letter queue"
                );
                self.dead_letter(&order, &error).await
            }
        }
    }

    /// Re-runs a parked payload through the durable write, single
    /// attempt. `Duplicate` counts as drained: the order made it into
    /// the store through some earlier delivery.
    pub async fn requeue(&self, entry: &DlqEntry) -> Result<(), IngestError> {
        let order: Order = serde_json::from_value(entry.payload.clone())?;
        order.validate()?;

        let order = Arc::new(order);

        match self.insert_with_deadline(&order).await {
            Ok(()) | Err(StoreError::Duplicate(_)) => {
                self.cache.insert(order.clone()).await;
                queries::delete_dlq(&self.pool, entry.id).await?;
                info!(order_uid = %order.order_uid, dlq_id = %entry.id, "dead letter requeued");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn insert_with_deadline(&self, order: &Order) -> Result<(), StoreError> {
        timeout(self.store_timeout, queries::insert_order(&self.pool, order))
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    async fn dead_letter(
        &self,
        order: &Order,
        error: &StoreError,
    ) -> Result<IngestOutcome, IngestError> {
        let payload = serde_json::to_value(order)?;
        let id = queries::record_dlq(
            &self.pool,
            &order.order_uid,
            &payload,
            &error.to_string(),
            self.retry_policy.max_attempts as i32,
        )
        .await?;

        Ok(IngestOutcome::DeadLettered(id))
    }
}
