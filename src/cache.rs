use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Order;

/// Process-local, bounded, time-expiring order lookup. Purely an
/// optimization in front of the store: a miss is normal control flow and
/// entries expire independently of the durable copy.
#[derive(Clone)]
pub struct OrderCache {
    inner: Cache<String, Arc<Order>>,
}

impl OrderCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_capacity)
            .build();
        Self { inner }
    }

    pub async fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.inner.get(order_uid).await
    }

    /// Stores or overwrites the entry, resetting its expiry.
    pub async fn insert(&self, order: Arc<Order>) {
        self.inner.insert(order.order_uid.clone(), order).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Delivery, Payment};

    fn order_with_uid(uid: &str) -> Arc<Order> {
        Arc::new(Order {
            order_uid: uid.to_string(),
            track_number: "TRACK".to_string(),
            entry: "WBIL".to_string(),
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "cust".to_string(),
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
                transaction: uid.to_string(),
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
            items: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_hit_returns_stored_order() {
        let cache = OrderCache::new(Duration::from_secs(60), 100);
        let order = order_with_uid("A1");

        cache.insert(order.clone()).await;

        let hit = cache.get("A1").await.expect("entry should be present");
        assert_eq!(*hit, *order);
    }

    #[tokio::test]
    async fn test_miss_is_none() {
        let cache = OrderCache::new(Duration::from_secs(60), 100);
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = OrderCache::new(Duration::from_millis(50), 100);
        cache.insert(order_with_uid("A1")).await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("A1").await.is_none());
    }

    #[tokio::test]
    async fn test_insert_overwrites_existing_entry() {
        let cache = OrderCache::new(Duration::from_secs(60), 100);
        cache.insert(order_with_uid("A1")).await;

        let mut replacement = (*order_with_uid("A1")).clone();
        replacement.track_number = "OTHER".to_string();
        cache.insert(Arc::new(replacement)).await;

        let hit = cache.get("A1").await.unwrap();
        assert_eq!(hit.track_number, "OTHER");
    }
}
