use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use common::metrics;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::handlers::{create_order, delete_order, get_order, health, list_orders, update_order};
use crate::state::AppState;

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Failed to gather metrics"),
            )
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
}

/// Build the application router with all routes
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics_handler))
        .route(
            "/order",
            get(list_orders::list_orders_handler)
                .post(create_order::handle)
                .put(update_order::handle)
                .delete(delete_order::handle),
        )
        .route("/order/:id", get(get_order::get_order_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors_layer())
        .with_state(state)
}
