use axum::{
    extract::{Path, State},
    Json,
};
use domain::Order;
use tracing::info;

use super::responses::{service_error, ApiError};
use crate::state::AppState;

/// Get a single order by order_uid
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, ApiError> {
    info!(order_uid = %order_uid, "Fetching order");

    state
        .orders
        .get_by_id(&order_uid)
        .await
        .map(Json)
        .map_err(|e| service_error(e, "get"))
}
