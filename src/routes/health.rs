//! Health check endpoint.
//!
//! Liveness only: answers whenever the process can serve HTTP. Used by the
//! API Gateway proxy, load balancers and container orchestrators.

use axum::Json;
use serde::Serialize;

use crate::config::HEALTH_OK;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub health: &'static str,
}

/// Returns `{"health": "OK"}` with 200, on every call.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { health: HEALTH_OK })
}
