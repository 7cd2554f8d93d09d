use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/metrics", get(metrics))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "activeSessions": state.sessions().len().await,
        "alarm": {
            "enabled": state.alarm().is_some(),
            "inFlight": state.alarm().is_some_and(|a| a.is_in_flight()),
        }
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.sessions().len().await < state.config().limits.max_sessions {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "activeSessions": state.sessions().len().await,
        "counters": state.sessions().metrics().snapshot(),
    }))
}
