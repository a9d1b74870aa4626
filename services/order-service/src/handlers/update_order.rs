use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use domain::{Order, UpdateOrderCommand};
use validator::Validate;

use super::responses::{api_error, service_error, ApiError, SuccessResponse};
use crate::state::AppState;

/// Handle partial order update
pub async fn handle(
    State(state): State<AppState>,
    payload: Result<Json<UpdateOrderCommand>, JsonRejection>,
) -> Result<Json<SuccessResponse<Order>>, ApiError> {
    let Json(cmd) =
        payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, "bind_error", e.body_text()))?;

    cmd.validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))?;

    let order = state
        .orders
        .update(&cmd.order_uid, |order| cmd.apply_to(order))
        .await
        .map_err(|e| service_error(e, "update"))?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "order updated".to_string(),
        data: Some(order),
    }))
}
