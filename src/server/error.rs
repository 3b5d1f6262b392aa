//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cache::ModelCacheError;

/// Public message for every model build failure. The cause stays in the logs.
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "failed to load housing variables";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] ModelCacheError),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// The response body could not be produced or written
    #[error("Transport fault: {0}")]
    Transport(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::ModelUnavailable(e) => {
                tracing::error!(detail = %e, "Model build failed, answering 500");
                (StatusCode::INTERNAL_SERVER_ERROR, MODEL_UNAVAILABLE_MESSAGE.to_string())
            }
            ServerError::NotImplemented(what) => {
                tracing::debug!(endpoint = *what, "Unimplemented endpoint called");
                (StatusCode::NOT_IMPLEMENTED, "not implemented".to_string())
            }
            ServerError::Transport(msg) => {
                tracing::error!(detail = %msg, "Failed to write response");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
