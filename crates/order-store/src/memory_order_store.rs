use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::Order;
use tokio::sync::RwLock;

use crate::{InsertOutcome, OrderStore, StoreError};

/// In-memory order store for tests and local runs without Postgres.
///
/// `set_unavailable(true)` makes every call fail with
/// `StoreError::Unavailable`, which is how tests simulate an outage.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
    unavailable: AtomicBool,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given orders
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let map = orders
            .into_iter()
            .map(|o| (o.order_uid.clone(), o))
            .collect();
        Self {
            orders: RwLock::new(map),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<String, StoreError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_uid) {
            return Err(StoreError::Duplicate(order.order_uid.clone()));
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(order.order_uid.clone())
    }

    async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        self.check_available()?;
        Ok(self.orders.read().await.get(order_uid).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        self.check_available()?;
        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn update(&self, order: &Order) -> Result<String, StoreError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.order_uid) {
            Some(existing) => {
                *existing = order.clone();
                Ok(order.order_uid.clone())
            }
            None => Err(StoreError::NotFound(order.order_uid.clone())),
        }
    }

    async fn delete(&self, order_uid: &str) -> Result<String, StoreError> {
        self.check_available()?;
        self.orders.write().await.remove(order_uid);
        Ok(order_uid.to_string())
    }

    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        self.check_available()?;
        // Lookup and insert under one write guard, so concurrent callers
        // racing on the same uid serialize here.
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_uid) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(InsertOutcome::Created)
    }
}
