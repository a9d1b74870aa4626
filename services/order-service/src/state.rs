use order_cache::{OrderCache, OrderService};
use order_store::OrderStore;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>) -> Self {
        Self {
            orders: OrderService::new(store, cache),
        }
    }
}
