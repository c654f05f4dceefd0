use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The order aggregate as it arrives on the bus and leaves over HTTP.
/// `order_uid` is the join key for every owned record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
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
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<OrderItem>,
}

/// Recipient contact and address. One per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Transaction financials. One per order; `transaction` mirrors the
/// owning order's uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
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

/// A single line item. Orders carry an ordered collection of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
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

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("order_uid is empty")]
    EmptyOrderUid,

    #[error("payment transaction '{transaction}' does not match order_uid '{order_uid}'")]
    PaymentMismatch {
        order_uid: String,
        transaction: String,
    },
}

impl Order {
    /// Structural checks beyond JSON decodability. A violating message is
    /// dropped by the ingest path the same way a malformed one is.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_uid.is_empty() {
            return Err(ValidationError::EmptyOrderUid);
        }
        if self.payment.transaction != self.order_uid {
            return Err(ValidationError::PaymentMismatch {
                order_uid: self.order_uid.clone(),
                transaction: self.payment.transaction.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            order_uid: "b563feb7b2b84b6test".to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: "2021-11-26T06:22:19Z".parse().unwrap(),
            oof_shard: "1".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: "b563feb7b2b84b6test".to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![OrderItem {
                chrt_id: 9934930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
        }
    }

    #[test]
    fn test_valid_order_passes() {
        assert!(sample_order().validate().is_ok());
    }

    #[test]
    fn test_empty_order_uid_rejected() {
        let mut order = sample_order();
        order.order_uid = String::new();
        order.payment.transaction = String::new();
        assert!(matches!(
            order.validate(),
            Err(ValidationError::EmptyOrderUid)
        ));
    }

    #[test]
    fn test_payment_mismatch_rejected() {
        let mut order = sample_order();
        order.payment.transaction = "someone-elses-transaction".to_string();
        assert!(matches!(
            order.validate(),
            Err(ValidationError::PaymentMismatch { .. })
        ));
    }

    #[test]
    fn test_wire_format_round_trips() {
        let order = sample_order();
        let encoded = serde_json::to_string(&order).unwrap();
        let decoded: Order = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, order);
    }
}
