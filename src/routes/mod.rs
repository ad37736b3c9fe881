//! HTTP route handlers.
//!
//! The service exposes a single liveness route. Unknown paths get a JSON
//! 404 and handler panics become a JSON 500 instead of dropping the
//! connection.
//!
//! Request tracing is enabled via middleware that resolves a request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod health;

use std::any::Any;

use axum::{
    http::Uri,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{CACHE_CONTROL_HEALTH, HEALTH_PATH};
use crate::error::AppError;
use crate::middleware::request_id_layer;

/// Creates the Axum router with all routes and middleware.
pub fn create_router() -> Router {
    // Health check - no caching, always fresh for liveness probes
    let health_routes = Router::new()
        .route(HEALTH_PATH, get(health::health))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_HEALTH),
        ));

    Router::new()
        .merge(health_routes)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "handler panicked".to_string());
    AppError::Internal(detail).into_response()
}
