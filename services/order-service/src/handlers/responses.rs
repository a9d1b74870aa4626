use axum::{http::StatusCode, Json};
use domain::Order;
use order_cache::ServiceError;
use order_store::StoreError;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub total: usize,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
            code: status.as_u16(),
        }),
    )
}

/// Map a service failure onto a status code. `operation` names the
/// 500-class error, e.g. `create` becomes `create_error`.
pub fn service_error(err: ServiceError, operation: &str) -> ApiError {
    match err {
        ServiceError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        ServiceError::Invalid(e) => {
            api_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        ServiceError::Store(StoreError::Duplicate(uid)) => api_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("order {} already exists", uid),
        ),
        ServiceError::Store(e) => {
            error!(operation, error = %e, "Order store failure");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("{}_error", operation),
                e.to_string(),
            )
        }
    }
}
