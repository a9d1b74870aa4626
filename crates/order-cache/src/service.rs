use std::sync::Arc;
use std::time::Instant;

use domain::{DomainError, Order};
use order_store::{OrderStore, StoreError};
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::OrderCache;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid order: {0}")]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(uid) => ServiceError::NotFound(uid),
            other => ServiceError::Store(other),
        }
    }
}

/// Order reads and writes for request handlers.
///
/// Reads go to the cache first and fall back to the store, filling the
/// cache on the way back. Writes go to the store first; the cache is only
/// touched once the store call has succeeded.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    pub async fn get_by_id(&self, order_uid: &str) -> Result<Order, ServiceError> {
        let start = Instant::now();

        if let Some(order) = self.cache.get(order_uid) {
            debug!(
                order_uid = %order_uid,
                elapsed_us = start.elapsed().as_micros() as u64,
                "Order served from cache"
            );
            return Ok(order);
        }

        match self.store.find_by_uid(order_uid).await? {
            Some(order) => {
                self.cache.set(&order);
                debug!(
                    order_uid = %order_uid,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "Order loaded from store"
                );
                Ok(order)
            }
            None => Err(ServiceError::NotFound(order_uid.to_string())),
        }
    }

    pub async fn get_all(&self) -> Result<Vec<Order>, ServiceError> {
        if !self.cache.is_empty() {
            let orders = self.cache.get_all();
            // Everything may have expired between the two calls.
            if !orders.is_empty() {
                return Ok(orders);
            }
        }

        let orders = self.store.list_all().await?;
        for order in &orders {
            self.cache.set(order);
        }
        debug!(count = orders.len(), "Order list loaded from store");
        Ok(self.cache.get_all())
    }

    pub async fn create(&self, order: Order) -> Result<Order, ServiceError> {
        order.check_invariants()?;

        let order_uid = self.store.create(&order).await?;
        self.cache.set(&order);

        info!(order_uid = %order_uid, "Order created");
        Ok(order)
    }

    /// Load the current order, let `patch` modify it, then store and cache
    /// the result. The uid itself cannot be changed by the patch.
    pub async fn update<F>(&self, order_uid: &str, patch: F) -> Result<Order, ServiceError>
    where
        F: FnOnce(&mut Order),
    {
        let mut order = self.get_by_id(order_uid).await?;
        patch(&mut order);
        order.order_uid = order_uid.to_string();

        self.store.update(&order).await?;
        self.cache.set(&order);

        info!(order_uid = %order_uid, "Order updated");
        Ok(order)
    }

    pub async fn delete(&self, order_uid: &str) -> Result<String, ServiceError> {
        let deleted = self.store.delete(order_uid).await?;
        self.cache.delete(order_uid);

        info!(order_uid = %order_uid, "Order deleted");
        Ok(deleted)
    }
}
