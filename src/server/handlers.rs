//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Model Handlers
// ============================================================================

/// Serve the fitted model, building it on first use.
pub async fn get_house_price_model(State(state): State<Arc<AppState>>) -> Result<Response> {
    let model = state.model.get_or_build().await?;

    let body = serde_json::to_vec(model.as_ref())
        .map_err(|e| ServerError::Transport(e.to_string()))?;
    debug!(bytes = body.len(), "Serving house price model");

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Prediction by input is declared but has no behaviour yet.
pub async fn predict_house_price() -> Result<Response> {
    Err(ServerError::NotImplemented("house-price-prediction"))
}

/// Cache state, counters and tuning. Never triggers a build.
pub async fn get_model_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "state": state.model.state(),
        "stats": state.model.stats(),
        "config": {
            "buildTimeoutSecs": state.config.build_timeout.map(|d| d.as_secs_f64()),
            "failureCooldownSecs": state.config.failure_cooldown.map(|d| d.as_secs_f64()),
        },
    }))
}

// ============================================================================
// System Handlers
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
