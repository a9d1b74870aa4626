pub mod memory_order_store;
pub mod postgres_order_store;

pub use memory_order_store::InMemoryOrderStore;
pub use postgres_order_store::PostgresOrderStore;

use async_trait::async_trait;
use domain::Order;
use thiserror::Error;

/// Result of the atomic find-or-create unit used by ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    AlreadyExists,
}

/// Durable storage for the order aggregate.
///
/// Implementations must be safe for concurrent callers. Every method that
/// writes commits the whole aggregate (header, delivery, payment, items) as
/// one unit or not at all.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order, returning its order_uid
    async fn create(&self, order: &Order) -> Result<String, StoreError>;

    /// Load a single order with delivery, payment and items
    async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Load every stored order
    async fn list_all(&self) -> Result<Vec<Order>, StoreError>;

    /// Replace a stored order's fields and items
    async fn update(&self, order: &Order) -> Result<String, StoreError>;

    /// Delete an order; deleting an unknown uid is not an error
    async fn delete(&self, order_uid: &str) -> Result<String, StoreError>;

    /// Look the order up by uid and create it only if absent, atomically
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Order already exists: {0}")]
    Duplicate(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl StoreError {
    /// Failures a caller may retry later (I/O, timeouts, outages)
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::DatabaseError(_))
    }
}
