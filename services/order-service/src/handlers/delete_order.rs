use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use domain::DeleteOrderCommand;
use validator::Validate;

use super::responses::{api_error, service_error, ApiError, SuccessResponse};
use crate::state::AppState;

/// Delete an order named in the JSON body. Unknown ids succeed.
pub async fn handle(
    State(state): State<AppState>,
    payload: Result<Json<DeleteOrderCommand>, JsonRejection>,
) -> Result<Json<SuccessResponse<()>>, ApiError> {
    let Json(cmd) =
        payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, "bind_error", e.body_text()))?;

    cmd.validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))?;

    let uid = state
        .orders
        .delete(&cmd.order_uid)
        .await
        .map_err(|e| service_error(e, "delete"))?;

    Ok(Json(SuccessResponse {
        success: true,
        message: format!("order: {} deleted", uid),
        data: None,
    }))
}
