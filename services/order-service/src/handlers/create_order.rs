use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use domain::{CreateOrderCommand, Order};
use tracing::{info, warn};
use validator::Validate;

use super::responses::{api_error, service_error, ApiError, SuccessResponse};
use crate::state::AppState;

/// Handle create order request
pub async fn handle(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderCommand>, JsonRejection>,
) -> Result<(StatusCode, Json<SuccessResponse<Order>>), ApiError> {
    let Json(cmd) =
        payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, "bind_error", e.body_text()))?;

    if let Err(e) = cmd.validate() {
        warn!(error = %e, "Create order validation failed");
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            e.to_string(),
        ));
    }

    let order = state
        .orders
        .create(cmd.into_order())
        .await
        .map_err(|e| service_error(e, "create"))?;

    info!(order_uid = %order.order_uid, "Order created via API");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            success: true,
            message: "order created".to_string(),
            data: Some(order),
        }),
    ))
}
