use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::metrics;
use domain::{DomainError, Order};
use messaging::{Disposition, MessageHandler};
use order_cache::OrderCache;
use order_store::{InsertOutcome, OrderStore, StoreError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed order payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Order payload has no order_uid")]
    MissingUid,

    #[error("Order {order_uid} rejected: {source}")]
    Invalid {
        order_uid: String,
        #[source]
        source: DomainError,
    },

    #[error("Failed to persist order: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Poison messages can never succeed, so they are acknowledged and
    /// dropped instead of being redelivered. Only transient store failures
    /// are worth another attempt.
    pub fn is_poison(&self) -> bool {
        match self {
            IngestError::Store(e) => !e.is_transient(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First delivery; persisted and cached
    Stored(String),
    /// Already persisted by an earlier delivery; nothing changed
    Duplicate(String),
}

/// Turns stream payloads into stored and cached orders.
///
/// The store is written first and the cache only after the store has
/// accepted a new order, so a cached order is always a durable one.
pub struct IngestionPipeline {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>) -> Self {
        Self { store, cache }
    }

    /// Decode a JSON order. A payload without a uid is as unusable as one
    /// that fails to parse.
    pub fn decode(payload: &[u8]) -> Result<Order, IngestError> {
        let order: Order = serde_json::from_slice(payload)?;
        if !order.has_uid() {
            return Err(IngestError::MissingUid);
        }
        Ok(order)
    }

    pub async fn process(&self, payload: &[u8]) -> Result<IngestOutcome, IngestError> {
        let order = Self::decode(payload)?;
        order
            .check_invariants()
            .map_err(|source| IngestError::Invalid {
                order_uid: order.order_uid.clone(),
                source,
            })?;

        match self.store.insert_if_absent(&order).await? {
            InsertOutcome::Created => {
                self.cache.set(&order);
                info!(order_uid = %order.order_uid, "Order ingested");
                Ok(IngestOutcome::Stored(order.order_uid))
            }
            InsertOutcome::AlreadyExists => {
                debug!(order_uid = %order.order_uid, "Order already stored, skipping");
                Ok(IngestOutcome::Duplicate(order.order_uid))
            }
        }
    }
}

#[async_trait]
impl MessageHandler for IngestionPipeline {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        let start = Instant::now();
        let result = self.process(payload).await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(IngestOutcome::Stored(_)) => {
                metrics::record_ingestion("stored", elapsed);
                Disposition::Ack
            }
            Ok(IngestOutcome::Duplicate(_)) => {
                metrics::record_ingestion("duplicate", elapsed);
                Disposition::Ack
            }
            Err(e) if e.is_poison() => {
                warn!(error = %e, payload_len = payload.len(), "Dropping undeliverable message");
                metrics::record_ingestion("poison", elapsed);
                Disposition::Ack
            }
            Err(e) => {
                error!(error = %e, "Order ingestion failed, message will be retried");
                metrics::record_ingestion("retry", elapsed);
                Disposition::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use order_store::InMemoryOrderStore;
    use std::time::Duration;

    mock! {
        pub Store {}

        #[async_trait]
        impl OrderStore for Store {
            async fn create(&self, order: &Order) -> Result<String, StoreError>;
            async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;
            async fn list_all(&self) -> Result<Vec<Order>, StoreError>;
            async fn update(&self, order: &Order) -> Result<String, StoreError>;
            async fn delete(&self, order_uid: &str) -> Result<String, StoreError>;
            async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, StoreError>;
        }
    }

    fn payload(uid: &str) -> Vec<u8> {
        serde_json::json!({
            "order_uid": uid,
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "delivery": {
                "name": "Test Testov",
                "phone": "+9720000000",
                "zip": "2639809",
                "city": "Kiryat Mozkin",
                "address": "Ploshad Mira 15",
                "region": "Kraiot",
                "email": "test@gmail.com"
            },
            "payment": {
                "transaction": uid,
                "currency": "USD",
                "provider": "wbpay",
                "amount": 1817,
                "payment_dt": 1637907727,
                "bank": "alpha",
                "delivery_cost": 1500,
                "goods_total": 317,
                "custom_fee": 0
            },
            "items": [{
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }],
            "locale": "en",
            "customer_id": "test",
            "delivery_service": "meest",
            "shardkey": "9",
            "sm_id": 99,
            "date_created": "2021-11-26T06:22:19Z",
            "oof_shard": "1"
        })
        .to_string()
        .into_bytes()
    }

    fn pipeline_with(store: Arc<dyn OrderStore>) -> (IngestionPipeline, Arc<OrderCache>) {
        let cache = Arc::new(OrderCache::new(Duration::from_secs(60)));
        (IngestionPipeline::new(store, cache.clone()), cache)
    }

    #[test]
    fn test_decode_reads_wire_format() {
        let order = IngestionPipeline::decode(&payload("b563feb7b2b84b6test")).unwrap();
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.shard_key, "9");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.payment.amount, 1817);
    }

    #[test]
    fn test_decode_rejects_missing_uid() {
        assert!(matches!(
            IngestionPipeline::decode(br#"{"track_number": "X"}"#),
            Err(IngestError::MissingUid)
        ));
        assert!(matches!(
            IngestionPipeline::decode(br#"{"order_uid": "   "}"#),
            Err(IngestError::MissingUid)
        ));
    }

    #[tokio::test]
    async fn test_new_order_is_stored_and_cached() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (pipeline, cache) = pipeline_with(store.clone());

        assert_eq!(pipeline.handle(&payload("a")).await, Disposition::Ack);

        assert!(store.find_by_uid("a").await.unwrap().is_some());
        assert_eq!(cache.get("a").unwrap().order_uid, "a");
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (pipeline, cache) = pipeline_with(store.clone());

        assert_eq!(
            pipeline.process(&payload("a")).await.unwrap(),
            IngestOutcome::Stored("a".to_string())
        );
        cache.delete("a");

        assert_eq!(
            pipeline.process(&payload("a")).await.unwrap(),
            IngestOutcome::Duplicate("a".to_string())
        );
        assert_eq!(store.len().await, 1);
        // A duplicate never writes to the cache.
        assert!(cache.get("a").is_none());
    }

    #[tokio::test]
    async fn test_malformed_then_valid() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (pipeline, cache) = pipeline_with(store.clone());

        assert_eq!(pipeline.handle(b"{not json").await, Disposition::Ack);
        assert_eq!(store.len().await, 0);
        assert!(cache.is_empty());

        assert_eq!(pipeline.handle(&payload("b")).await, Disposition::Ack);
        assert!(cache.get("b").is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_order_without_items_is_poison() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (pipeline, cache) = pipeline_with(store.clone());
        let body = br#"{"order_uid": "empty", "items": []}"#;

        let err = pipeline.process(body).await.unwrap_err();
        assert!(matches!(err, IngestError::Invalid { .. }));
        assert!(err.is_poison());

        assert_eq!(pipeline.handle(body).await, Disposition::Ack);
        assert!(store.is_empty().await);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_retried_without_caching() {
        let mut store = MockStore::new();
        store
            .expect_insert_if_absent()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection reset".to_string())));
        let (pipeline, cache) = pipeline_with(Arc::new(store));

        assert_eq!(pipeline.handle(&payload("a")).await, Disposition::Retry);
        assert!(cache.get("a").is_none());
    }

    #[tokio::test]
    async fn test_permanent_store_rejection_is_not_retried() {
        let mut store = MockStore::new();
        store
            .expect_insert_if_absent()
            .times(2)
            .returning(|order| Err(StoreError::Duplicate(order.order_uid.clone())));
        let (pipeline, cache) = pipeline_with(Arc::new(store));

        let err = pipeline.process(&payload("a")).await.unwrap_err();
        assert!(err.is_poison());
        assert_eq!(pipeline.handle(&payload("a")).await, Disposition::Ack);
        assert!(cache.get("a").is_none());
    }

    #[tokio::test]
    async fn test_store_recovers_after_outage() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (pipeline, cache) = pipeline_with(store.clone());

        store.set_unavailable(true);
        assert_eq!(pipeline.handle(&payload("a")).await, Disposition::Retry);
        assert!(cache.is_empty());

        store.set_unavailable(false);
        assert_eq!(pipeline.handle(&payload("a")).await, Disposition::Ack);
        assert!(cache.get("a").is_some());
    }
}
