pub mod cache;
pub mod service;
pub mod warmup;

pub use cache::{CacheJanitor, JanitorHandle, OrderCache};
pub use service::{OrderService, ServiceError};
pub use warmup::{warm_up, WarmUpReport};
