//! Integration test: Server API endpoints

use housing_model_server::cache::{BoxError, FnBuilder, ModelBuilder};
use housing_model_server::server::{create_router, AppState, ServerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        static_dir: None,
        dataset_path: "/nonexistent/housing.csv".to_string(),
        target_column: "MedHouseVal".to_string(),
        build_timeout: None,
        failure_cooldown: None,
    }
}

fn test_app<B>(builder: B) -> (axum::Router, Arc<AppState>)
where
    B: ModelBuilder<Artifact = serde_json::Value>,
{
    test_app_with(test_config(), builder)
}

fn test_app_with<B>(config: ServerConfig, builder: B) -> (axum::Router, Arc<AppState>)
where
    B: ModelBuilder<Artifact = serde_json::Value>,
{
    let state = Arc::new(AppState::with_builder(config.clone(), builder));
    (create_router(state.clone(), &config), state)
}

/// Builder that fails until `fail_first` calls have been made, then returns
/// `{"price": 250000}`.
fn counting_builder(
    fail_first: usize,
    delay: Duration,
) -> (impl ModelBuilder<Artifact = serde_json::Value>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let builder = FnBuilder(move || -> Result<serde_json::Value, BoxError> {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(delay);
        if n < fail_first {
            return Err("data unavailable".into());
        }
        Ok(json!({ "price": 250000 }))
    });
    (builder, calls)
}

/// Slow, always-successful builder that also records how many of its runs
/// were ever in progress at once.
fn slow_builder(
    delay: Duration,
) -> (impl ModelBuilder<Artifact = serde_json::Value>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let running = Arc::new(AtomicUsize::new(0));
    let (counter, peak_seen) = (Arc::clone(&calls), Arc::clone(&peak));
    let builder = FnBuilder(move || -> Result<serde_json::Value, BoxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        peak_seen.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(delay);
        running.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({ "price": 250000 }))
    });
    (builder, calls, peak)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 64).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ============================================================================
// Model Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_model_endpoint_builds_once_and_caches() {
    let (builder, calls) = counting_builder(0, Duration::ZERO);
    let (app, _) = test_app(builder);

    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "price": 250000 }));

    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "price": 250000 }));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_model_endpoint_failure_returns_500() {
    let (builder, calls) = counting_builder(usize::MAX, Duration::ZERO);
    let (app, state) = test_app(builder);

    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "failed to load housing variables" }));
    assert!(state.model.get().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_model_endpoint_recovers_after_failure() {
    let (builder, calls) = counting_builder(1, Duration::ZERO);
    let (app, state) = test_app(builder);

    let (status, _) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 250000);
    assert!(state.model.get().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_trigger_single_build() {
    let (builder, calls) = counting_builder(0, Duration::from_millis(150));
    let (app, state) = test_app(builder);

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { get(&app, "/api/house-price-model").await })
        })
        .collect();

    let mut responses = Vec::new();
    for request in requests {
        responses.push(request.await.unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for (status, body) in &responses {
        assert_eq!(*status, StatusCode::OK);
        assert_eq!(body, &responses[0].1);
    }
    assert_eq!(state.model.stats().builds_started, 1);
}

#[tokio::test]
async fn test_model_endpoint_with_csv_builder() {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "MedInc,AveRooms,MedHouseVal").unwrap();
    for (inc, rooms) in [(1.0, 3.0), (2.0, 5.0), (3.0, 4.0), (4.0, 6.0), (5.0, 8.0), (6.0, 5.0)] {
        writeln!(file, "{},{},{}", inc, rooms, 2.0 * inc - 0.25 * rooms + 0.5).unwrap();
    }

    let config = ServerConfig {
        dataset_path: file.path().to_string_lossy().to_string(),
        ..test_config()
    };
    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router(state, &config);

    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intercept"], 0.5);
    assert_eq!(body["indepVariables"]["MedInc"]["coef"], 2.0);
    assert_eq!(body["indepVariables"]["AveRooms"]["coef"], -0.25);
    assert_eq!(body["indepVariables"]["MedInc"]["value"], 0);
    assert_eq!(body["depVariable"]["name"], "ActualValues");
}

#[tokio::test]
async fn test_model_endpoint_missing_dataset_returns_500() {
    let config = test_config();
    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router(state, &config);

    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "failed to load housing variables");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_build_returns_500_without_second_build() {
    let (builder, calls, peak) = slow_builder(Duration::from_millis(400));
    let config = ServerConfig {
        build_timeout: Some(Duration::from_millis(50)),
        ..test_config()
    };
    let (app, state) = test_app_with(config, builder);

    for _ in 0..3 {
        let (status, body) = get(&app, "/api/house-price-model").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "failed to load housing variables" }));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(700)).await;
    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 250000);

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.model.stats().builds_timed_out, 1);
}

#[tokio::test]
async fn test_cooldown_returns_500_without_rebuilding() {
    let (builder, calls) = counting_builder(usize::MAX, Duration::ZERO);
    let config = ServerConfig {
        failure_cooldown: Some(Duration::from_secs(60)),
        ..test_config()
    };
    let (app, state) = test_app_with(config, builder);

    let (status, _) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = get(&app, "/api/house-price-model").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "failed to load housing variables" }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(state.model.get().is_none());
}

// ============================================================================
// Other Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_model_status_does_not_build() {
    let (builder, calls) = counting_builder(0, Duration::ZERO);
    let (app, _) = test_app(builder);

    let (status, body) = get(&app, "/api/model/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "unset");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    get(&app, "/api/house-price-model").await;
    let (_, body) = get(&app, "/api/model/status").await;
    assert_eq!(body["state"], "ready");
    assert_eq!(body["stats"]["builds_succeeded"], 1);
}

#[tokio::test]
async fn test_model_status_reports_cache_tuning() {
    let (builder, _) = counting_builder(0, Duration::ZERO);
    let config = ServerConfig {
        build_timeout: Some(Duration::from_secs(30)),
        ..test_config()
    };
    let (app, _) = test_app_with(config, builder);

    let (_, body) = get(&app, "/api/model/status").await;
    assert_eq!(body["config"]["buildTimeoutSecs"], 30.0);
    assert!(body["config"]["failureCooldownSecs"].is_null());
}

#[tokio::test]
async fn test_prediction_endpoint_not_implemented() {
    let (builder, _) = counting_builder(0, Duration::ZERO);
    let (app, _) = test_app(builder);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/house-price-prediction")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"MedInc": 3.2}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (builder, _) = counting_builder(0, Duration::ZERO);
    let (app, _) = test_app(builder);

    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_api_route_returns_404() {
    let (builder, _) = counting_builder(0, Duration::ZERO);
    let (app, _) = test_app(builder);

    let (status, body) = get(&app, "/api/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}

#[tokio::test]
async fn test_wrong_method_returns_405() {
    let (builder, _) = counting_builder(0, Duration::ZERO);
    let (app, _) = test_app(builder);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/house-price-model")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_static_files_served_from_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>housing</h1>").unwrap();

    let config = ServerConfig {
        static_dir: Some(dir.path().to_string_lossy().to_string()),
        ..test_config()
    };
    let (builder, _) = counting_builder(0, Duration::ZERO);
    let state = Arc::new(AppState::with_builder(config.clone(), builder));
    let app = create_router(state, &config);

    let response = app
        .oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>housing</h1>");
}
