//! Housing Model Server Module
//!
//! Serves the fitted housing price model over a REST API, plus the static
//! front end that renders it.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::{ServerError, MODEL_UNAVAILABLE_MESSAGE};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::CacheConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<String>,
    /// CSV the model is fitted on
    pub dataset_path: String,
    /// Column of `dataset_path` used as the dependent variable
    pub target_column: String,
    /// Upper bound on one model build (`MODEL_BUILD_TIMEOUT_SECS`)
    pub build_timeout: Option<Duration>,
    /// Refuse rebuilds for this long after a failure (`MODEL_FAILURE_COOLDOWN_SECS`)
    pub failure_cooldown: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            static_dir: Self::resolve_static_dir(),
            dataset_path: std::env::var("DATASET_PATH")
                .unwrap_or_else(|_| "./data/california_housing.csv".to_string()),
            target_column: std::env::var("TARGET_COLUMN")
                .unwrap_or_else(|_| "MedHouseVal".to_string()),
            build_timeout: secs_from_env("MODEL_BUILD_TIMEOUT_SECS"),
            failure_cooldown: secs_from_env("MODEL_FAILURE_COOLDOWN_SECS"),
        }
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}

impl ServerConfig {
    /// Resolve the static directory by checking multiple candidate paths.
    fn resolve_static_dir() -> Option<String> {
        if let Ok(dir) = std::env::var("STATIC_DIR") {
            return Some(dir);
        }

        let candidates = [
            "static".to_string(),
            format!("{}/static", env!("CARGO_MANIFEST_DIR")),
        ];

        candidates
            .into_iter()
            .find(|candidate| std::path::Path::new(candidate).exists())
    }

    /// Cache tuning derived from this config
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            build_timeout: self.build_timeout,
            failure_cooldown: self.failure_cooldown,
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        dataset = %config.dataset_path,
        target = %config.target_column,
        build_timeout = ?config.build_timeout,
        failure_cooldown = ?config.failure_cooldown,
        "Model will be fitted on first request"
    );

    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        started_at = %start_time.to_rfc3339(),
        "Server is up and running"
    );
    info!(url = %format!("http://{}/api/house-price-model", addr), "Model endpoint available");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl+c, shutting down");
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
