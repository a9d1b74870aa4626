pub mod janitor;
pub mod order_cache;

pub use janitor::{CacheJanitor, JanitorHandle};
pub use order_cache::OrderCache;
