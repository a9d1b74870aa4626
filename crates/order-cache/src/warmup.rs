use std::time::Instant;

use order_store::OrderStore;
use tracing::{info, warn};

use crate::cache::OrderCache;

/// What a startup warm-up achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmUpReport {
    pub loaded: usize,
    pub error: Option<String>,
}

impl WarmUpReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Fill the cache from the durable store once, before traffic starts.
///
/// A store failure is logged and reported but never fatal: the service
/// starts with an empty cache and fills it on demand.
pub async fn warm_up(store: &dyn OrderStore, cache: &OrderCache) -> WarmUpReport {
    let start = Instant::now();

    match store.list_all().await {
        Ok(orders) => {
            let loaded = cache.load(&orders);
            info!(
                loaded,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Order cache warmed up"
            );
            WarmUpReport {
                loaded,
                error: None,
            }
        }
        Err(e) => {
            warn!(error = %e, "Cache warm-up failed, starting with an empty cache");
            WarmUpReport {
                loaded: 0,
                error: Some(e.to_string()),
            }
        }
    }
}
