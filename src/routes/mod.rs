pub mod health;
pub mod replays;
pub mod sessions;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::{Json, Router};

use crate::middleware::request_id::request_id_middleware;
use crate::response::ErrorBody;
use crate::state::AppState;

/// A single refined face mesh frame is ~20 KiB of JSON.
const MAX_FRAME_BODY_SIZE: usize = 1024 * 1024;

/// Whole recorded streams are uploaded in one replay request.
const MAX_REPLAY_BODY_SIZE: usize = 256 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest(
            "/sessions",
            sessions::router().layer(DefaultBodyLimit::max(MAX_FRAME_BODY_SIZE)),
        )
        .nest(
            "/replays",
            replays::router().layer(DefaultBodyLimit::max(MAX_REPLAY_BODY_SIZE)),
        );

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .fallback(fallback_404)
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
}

async fn fallback_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            success: false,
            code: "NOT_FOUND".to_string(),
            message: "Not found".to_string(),
            trace_id: None,
        }),
    )
}
