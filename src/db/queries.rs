use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{
    assemble_order, DeliveryRow, DlqEntry, ItemRow, OrderRow, PaymentRow,
};
use crate::db::StoreError;
use crate::domain::Order;

// --- Order writes ---

/// Persists the whole aggregate in one transaction: header, payment,
/// items, delivery. Any failure rolls everything back; readers never see
/// a partial aggregate. A pre-existing header means a re-delivered
/// message: the transaction is abandoned and `Duplicate` returned, with
/// the original rows untouched.
pub async fn insert_order(pool: &PgPool, order: &Order) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature,
            customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_uid) DO NOTHING
        "#,
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        return Err(StoreError::Duplicate(order.order_uid.clone()));
    }

    sqlx::query(
        r#"
        INSERT INTO payments (
            transaction, request_id, currency, provider, amount,
            payment_dt, bank, delivery_cost, goods_total, custom_fee
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&order.payment.transaction)
    .bind(&order.payment.request_id)
    .bind(&order.payment.currency)
    .bind(&order.payment.provider)
    .bind(order.payment.amount)
    .bind(order.payment.payment_dt)
    .bind(&order.payment.bank)
    .bind(order.payment.delivery_cost)
    .bind(order.payment.goods_total)
    .bind(order.payment.custom_fee)
    .execute(&mut *tx)
    .await?;

    // The persisted ordinal keeps the collection ordered on read-back.
    for (pos, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_uid, item_pos, chrt_id, track_number, price, rid,
                name, sale, size, total_price, nm_id, brand, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&order.order_uid)
        .bind(pos as i32)
        .bind(item.chrt_id)
        .bind(&item.track_number)
        .bind(item.price)
        .bind(&item.rid)
        .bind(&item.name)
        .bind(item.sale)
        .bind(&item.size)
        .bind(item.total_price)
        .bind(item.nm_id)
        .bind(&item.brand)
        .bind(item.status)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO deliveries (
            order_uid, name, phone, zip, city, address, region, email
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&order.order_uid)
    .bind(&order.delivery.name)
    .bind(&order.delivery.phone)
    .bind(&order.delivery.zip)
    .bind(&order.delivery.city)
    .bind(&order.delivery.address)
    .bind(&order.delivery.region)
    .bind(&order.delivery.email)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

// --- Order reads ---

/// Reads the four tables inside one repeatable-read, read-only
/// transaction so a concurrent write can never yield a torn aggregate.
/// A missing row in any of the four tables is `NotFound`.
pub async fn get_order(pool: &PgPool, order_uid: &str) -> Result<Order, StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let header = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT order_uid, track_number, entry, locale, internal_signature,
               customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
        FROM orders WHERE order_uid = $1
        "#,
    )
    .bind(order_uid)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;

    let items = sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT chrt_id, track_number, price, rid, name, sale, size,
               total_price, nm_id, brand, status
        FROM order_items WHERE order_uid = $1
        ORDER BY item_pos
        "#,
    )
    .bind(order_uid)
    .fetch_all(&mut *tx)
    .await?;

    let payment = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT transaction, request_id, currency, provider, amount,
               payment_dt, bank, delivery_cost, goods_total, custom_fee
        FROM payments WHERE transaction = $1
        "#,
    )
    .bind(order_uid)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;

    let delivery = sqlx::query_as::<_, DeliveryRow>(
        r#"
        SELECT name, phone, zip, city, address, region, email
        FROM deliveries WHERE order_uid = $1
        "#,
    )
    .bind(order_uid)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;

    tx.commit().await?;

    Ok(assemble_order(header, delivery, payment, items))
}

// --- Dead letter queue ---

pub async fn record_dlq(
    pool: &PgPool,
    order_uid: &str,
    payload: &serde_json::Value,
    error_reason: &str,
    retry_count: i32,
) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO order_dlq (
            id, order_uid, payload, error_reason, retry_count,
            first_failed_at, moved_to_dlq_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(order_uid)
    .bind(payload)
    .bind(error_reason)
    .bind(retry_count)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn list_dlq(pool: &PgPool, limit: i64) -> Result<Vec<DlqEntry>, StoreError> {
    let entries = sqlx::query_as::<_, DlqEntry>(
        "SELECT * FROM order_dlq ORDER BY moved_to_dlq_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

pub async fn get_dlq(pool: &PgPool, id: Uuid) -> Result<DlqEntry, StoreError> {
    sqlx::query_as::<_, DlqEntry>("SELECT * FROM order_dlq WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

pub async fn delete_dlq(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM order_dlq WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
