use std::time::Instant;

use axum::{extract::State, Json};
use tracing::info;

use super::responses::{service_error, ApiError, OrderListResponse};
use crate::state::AppState;

/// List every order, served from the cache when it is populated
pub async fn list_orders_handler(
    State(state): State<AppState>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let start = Instant::now();

    let orders = state
        .orders
        .get_all()
        .await
        .map_err(|e| service_error(e, "list"))?;

    info!(
        total = orders.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Listed orders"
    );

    Ok(Json(OrderListResponse {
        total: orders.len(),
        orders,
    }))
}
