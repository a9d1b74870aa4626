use std::collections::HashMap;
use std::time::Duration;

use domain::Order;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use common::metrics;

struct CacheEntry {
    order: Order,
    /// `None` when the cache was built without a TTL
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// Process-wide in-memory cache of order snapshots keyed by `order_uid`.
///
/// Entries are copied in on `set`/`load` and copied out on reads, so callers
/// never share a value with the cache. Every entry expires `ttl` after its
/// last `set`; a zero TTL keeps entries until they are deleted.
///
/// No method holds the lock across an `.await`, and none of them fail.
pub struct OrderCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl OrderCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn expiry_from(&self, now: Instant) -> Option<Instant> {
        if self.ttl.is_zero() {
            None
        } else {
            Some(now + self.ttl)
        }
    }

    /// Insert or replace the snapshot for `order.order_uid`.
    ///
    /// Orders without a uid are ignored.
    pub fn set(&self, order: &Order) {
        if order.order_uid.is_empty() {
            return;
        }

        let entry = CacheEntry {
            order: order.clone(),
            expires_at: self.expiry_from(Instant::now()),
        };

        let mut entries = self.entries.write();
        entries.insert(order.order_uid.clone(), entry);
        metrics::set_cache_size(entries.len());
    }

    /// `set` for callers holding an optional order; `None` is a no-op
    pub fn set_opt(&self, order: Option<&Order>) {
        if let Some(order) = order {
            self.set(order);
        }
    }

    /// Look up a live snapshot. An expired entry counts as a miss and is
    /// evicted on the way out.
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        let now = Instant::now();

        {
            let entries = self.entries.read();
            match entries.get(order_uid) {
                None => {
                    metrics::record_cache_request(false);
                    return None;
                }
                Some(entry) if !entry.is_expired(now) => {
                    metrics::record_cache_request(true);
                    return Some(entry.order.clone());
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a `set` that landed after the read
        // lock was released carries a later expiry and must survive.
        let mut entries = self.entries.write();
        if matches!(entries.get(order_uid), Some(entry) if entry.is_expired(now)) {
            entries.remove(order_uid);
            metrics::set_cache_size(entries.len());
            debug!(order_uid = %order_uid, "Evicted expired cache entry on read");
        }
        metrics::record_cache_request(false);
        None
    }

    /// Remove an entry; unknown ids are ignored
    pub fn delete(&self, order_uid: &str) {
        let mut entries = self.entries.write();
        if entries.remove(order_uid).is_some() {
            metrics::set_cache_size(entries.len());
        }
    }

    /// Snapshot of every live entry, in no particular order.
    pub fn get_all(&self) -> Vec<Order> {
        let now = Instant::now();
        let mut expired = Vec::new();

        let orders = {
            let entries = self.entries.read();
            let mut orders = Vec::with_capacity(entries.len());
            for (uid, entry) in entries.iter() {
                if entry.is_expired(now) {
                    expired.push(uid.clone());
                } else {
                    orders.push(entry.order.clone());
                }
            }
            orders
        };

        if !expired.is_empty() {
            let mut entries = self.entries.write();
            for uid in &expired {
                if matches!(entries.get(uid), Some(entry) if entry.is_expired(now)) {
                    entries.remove(uid);
                }
            }
            metrics::set_cache_size(entries.len());
        }

        orders
    }

    /// Bulk `set` under a single write lock. Existing ids are overwritten
    /// and orders without a uid are skipped. Returns how many were stored.
    pub fn load(&self, orders: &[Order]) -> usize {
        let expires_at = self.expiry_from(Instant::now());
        let mut entries = self.entries.write();
        let mut loaded = 0;

        for order in orders.iter().filter(|o| !o.order_uid.is_empty()) {
            entries.insert(
                order.order_uid.clone(),
                CacheEntry {
                    order: order.clone(),
                    expires_at,
                },
            );
            loaded += 1;
        }

        metrics::set_cache_size(entries.len());
        loaded
    }

    /// Remove every expired entry and return how many were dropped
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_zero() {
            return 0;
        }

        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();

        if removed > 0 {
            metrics::set_cache_size(entries.len());
        }
        removed
    }
}
