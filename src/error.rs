use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::http::ServerError;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No route for {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Errors that stop a CLI command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Deployment graph rejected: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Apply did not complete: {0} declaration(s) failed")]
    ApplyFailed(usize),
}
