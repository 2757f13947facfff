//! REST API
//!
//! Read-only access to sensor states plus a manual refresh trigger.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cellar_coordinator::{FailureKind, SharedCellarData, Snapshot};
use cellar_core::DOMAIN;
use cellar_sensor::{SensorPlatform, SensorState, SharedStateStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub data: SharedCellarData,
    pub states: SharedStateStore,
    /// Synced right after a manual refresh so the response and states agree
    pub platform: Arc<SensorPlatform>,
}

/// API status response
#[derive(Serialize)]
struct ApiStatus {
    message: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
}

/// Totals of the latest snapshot
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub total_bottles: usize,
    pub total_value: f64,
    pub wines: usize,
    /// `0` before the first successful refresh
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Why the most recent refresh failed, if it did
    pub last_error: Option<String>,
}

impl SummaryResponse {
    fn new(snapshot: Option<&Snapshot>, last_error: Option<String>) -> Self {
        match snapshot {
            Some(s) => Self {
                total_bottles: s.aggregation.totals.total_bottles,
                total_value: s.aggregation.totals.total_value,
                wines: s.aggregation.groups.len(),
                generation: s.generation,
                refreshed_at: Some(s.refreshed_at),
                last_error,
            },
            None => Self {
                total_bottles: 0,
                total_value: 0.0,
                wines: 0,
                generation: 0,
                refreshed_at: None,
                last_error,
            },
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/", get(api_status))
        .route("/api/health", get(health_check))
        .route("/api/states", get(get_states))
        .route("/api/states/:entity_id", get(get_state))
        .route(&format!("/api/{DOMAIN}/summary"), get(get_summary))
        .route(&format!("/api/{DOMAIN}/refresh"), post(refresh))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, addr: &str) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, router).await
}

// ==================== Handlers ====================

/// GET /api/ - Returns API status
async fn api_status() -> Json<ApiStatus> {
    Json(ApiStatus {
        message: "API running.",
    })
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/states - Returns all sensor states
async fn get_states(State(state): State<AppState>) -> Json<Vec<SensorState>> {
    Json(state.states.all())
}

/// GET /api/states/{entity_id} - Returns a single sensor state
async fn get_state(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<SensorState>, ApiError> {
    state
        .states
        .get(&entity_id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Entity not found: {entity_id}")))
}

/// GET /api/cellar_tracker/summary - Totals of the latest refresh
async fn get_summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let snapshot = state.data.snapshot();
    Json(SummaryResponse::new(snapshot.as_deref(), state.data.last_error()))
}

/// POST /api/cellar_tracker/refresh - Refresh now and return the new totals
async fn refresh(State(state): State<AppState>) -> Result<Json<SummaryResponse>, ApiError> {
    match state.data.refresh().await {
        Ok(snapshot) => {
            state.platform.sync(&snapshot);
            Ok(Json(SummaryResponse::new(Some(&snapshot), None)))
        }
        Err(err) => {
            warn!(error = %err, "Manual refresh failed");
            let status = match err.kind() {
                FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FailureKind::Authentication | FailureKind::Fetch => StatusCode::BAD_GATEWAY,
            };
            Err(api_error(status, err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use cellar_client::testing::StaticInventory;
    use cellar_coordinator::CellarData;
    use cellar_core::{BottleRecord, InventoryAggregator};
    use cellar_sensor::StateStore;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn bottle(iwine: i64, wine: &str, valuation: &str) -> BottleRecord {
        BottleRecord::new()
            .with("iWine", iwine)
            .with("Vintage", 2015)
            .with("Wine", wine)
            .with("Valuation", valuation)
    }

    fn create_test_state(source: Arc<StaticInventory>) -> AppState {
        let data = Arc::new(
            CellarData::new(source, InventoryAggregator::default())
                .with_fetch_timeout(Duration::from_secs(10)),
        );
        let states = Arc::new(StateStore::new());
        let platform = Arc::new(SensorPlatform::new(Arc::clone(&states), "EUR"));
        AppState {
            data,
            states,
            platform,
        }
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_api_status() {
        let app = create_router(create_test_state(Arc::new(StaticInventory::new(vec![]))));
        let (status, body) = send(app, Method::GET, "/api/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "API running.");
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state(Arc::new(StaticInventory::new(vec![]))));
        let (status, _) = send(app, Method::GET, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_summary_before_first_refresh() {
        let app = create_router(create_test_state(Arc::new(StaticInventory::new(vec![]))));
        let (status, body) = send(app, Method::GET, "/api/cellar_tracker/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generation"], 0);
        assert_eq!(body["total_bottles"], 0);
        assert_eq!(body["refreshed_at"], Value::Null);
    }

    #[tokio::test]
    async fn test_refresh_then_read_states() {
        let source = Arc::new(StaticInventory::new(vec![
            bottle(1, "Margaux", "10,50"),
            bottle(1, "Margaux", "20"),
        ]));
        let state = create_test_state(source);

        let (status, body) = send(
            create_router(state.clone()),
            Method::POST,
            "/api/cellar_tracker/refresh",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_bottles"], 2);
        assert_eq!(body["total_value"], 30.5);
        assert_eq!(body["wines"], 1);
        assert_eq!(body["generation"], 1);

        let (status, body) = send(create_router(state.clone()), Method::GET, "/api/states").await;
        assert_eq!(status, StatusCode::OK);
        // two totals, one wine, two bottles
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (status, body) = send(
            create_router(state.clone()),
            Method::GET,
            "/api/states/sensor.cellar_tracker_wine_2015_margaux",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "Margaux");
        assert_eq!(body["attributes"]["count"], 2);
        assert_eq!(body["icon"], "mdi:bottle-wine");

        let (status, body) = send(
            create_router(state),
            Method::GET,
            "/api/cellar_tracker/summary",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_bottles"], 2);
        assert_eq!(body["last_error"], Value::Null);
    }

    #[tokio::test]
    async fn test_get_state_not_found() {
        let app = create_router(create_test_state(Arc::new(StaticInventory::new(vec![]))));
        let (status, body) = send(app, Method::GET, "/api/states/sensor.nothing_here").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Entity not found: sensor.nothing_here");
    }

    #[tokio::test]
    async fn test_refresh_fetch_failure() {
        let source = Arc::new(StaticInventory::new(vec![]));
        source.set_failing(true);
        let state = create_test_state(source);

        let (status, body) = send(
            create_router(state.clone()),
            Method::POST,
            "/api/cellar_tracker/refresh",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap().contains("failed"));

        let (_, body) = send(create_router(state), Method::GET, "/api/cellar_tracker/summary").await;
        assert!(body["last_error"].is_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_timeout() {
        let source = Arc::new(
            StaticInventory::new(vec![bottle(1, "Margaux", "10")])
                .with_delay(Duration::from_secs(60)),
        );
        let app = create_router(create_test_state(source));

        let (status, _) = send(app, Method::POST, "/api/cellar_tracker/refresh").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }
}
