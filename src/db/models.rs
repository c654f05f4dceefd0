use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Delivery, Order, OrderItem, Payment};

/// Internal row types for SQLx. Not exposed outside the db module;
/// `queries` assembles them back into the domain aggregate.

#[derive(Debug, sqlx::FromRow)]
pub struct OrderRow {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PaymentRow {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ItemRow {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DeliveryRow {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// A message whose durable write exhausted its retries.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DlqEntry {
    pub id: Uuid,
    pub order_uid: String,
    pub payload: serde_json::Value,
    pub error_reason: String,
    pub retry_count: i32,
    pub first_failed_at: DateTime<Utc>,
    pub moved_to_dlq_at: DateTime<Utc>,
}

pub fn assemble_order(
    header: OrderRow,
    delivery: DeliveryRow,
    payment: PaymentRow,
    items: Vec<ItemRow>,
) -> Order {
    Order {
        order_uid: header.order_uid,
        track_number: header.track_number,
        entry: header.entry,
        locale: header.locale,
        internal_signature: header.internal_signature,
        customer_id: header.customer_id,
        delivery_service: header.delivery_service,
        shardkey: header.shardkey,
        sm_id: header.sm_id,
        date_created: header.date_created,
        oof_shard: header.oof_shard,
        delivery: Delivery {
            name: delivery.name,
            phone: delivery.phone,
            zip: delivery.zip,
            city: delivery.city,
            address: delivery.address,
            region: delivery.region,
            email: delivery.email,
        },
        payment: Payment {
            transaction: payment.transaction,
            request_id: payment.request_id,
            currency: payment.currency,
            provider: payment.provider,
            amount: payment.amount,
            payment_dt: payment.payment_dt,
            bank: payment.bank,
            delivery_cost: payment.delivery_cost,
            goods_total: payment.goods_total,
            custom_fee: payment.custom_fee,
        },
        items: items
            .into_iter()
            .map(|item| OrderItem {
                chrt_id: item.chrt_id,
                track_number: item.track_number,
                price: item.price,
                rid: item.rid,
                name: item.name,
                sale: item.sale,
                size: item.size,
                total_price: item.total_price,
                nm_id: item.nm_id,
                brand: item.brand,
                status: item.status,
            })
            .collect(),
    }
}
