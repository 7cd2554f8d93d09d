use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use futures::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::detection::EyeLayout;
use crate::extractors::{JsonBody, SessionId};
use crate::pipeline::LandmarkFrame;
use crate::response::{created, ok, AppError};
use crate::sessions::SessionEvent;
use crate::state::AppState;

static SSE_CONNECTION_COUNT: AtomicUsize = AtomicUsize::new(0);

struct SseGuard;
impl Drop for SseGuard {
    fn drop(&mut self) {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session).get(list_sessions))
        .route("/:id", get(get_session).delete(stop_session))
        .route("/:id/frames", post(push_frame))
        .route("/:id/events", get(session_events))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    #[serde(default)]
    ear_threshold: Option<f64>,
    #[serde(default)]
    consec_frames: Option<u32>,
    #[serde(default)]
    layout: Option<EyeLayout>,
}

async fn create_session(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let config = state.estimator_config(req.ear_threshold, req.consec_frames)?;
    let info = state
        .sessions()
        .create(config, req.layout.unwrap_or_default())
        .await?;
    Ok(created(info))
}

async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.sessions().list().await)
}

async fn get_session(
    State(state): State<AppState>,
    SessionId(id): SessionId,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.sessions().snapshot(id).await?))
}

async fn stop_session(
    State(state): State<AppState>,
    SessionId(id): SessionId,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.sessions().stop(id).await?))
}

async fn push_frame(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    JsonBody(frame): JsonBody<LandmarkFrame>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.sessions().push_frame(id, frame).await?))
}

fn to_sse_event(event: &SessionEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.name()).data(json)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize session event");
            None
        }
    }
}

async fn session_events(
    State(state): State<AppState>,
    SessionId(id): SessionId,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let max_sse = state.config().limits.max_sse_connections;
    let current = SSE_CONNECTION_COUNT.fetch_add(1, Ordering::SeqCst);
    if current >= max_sse {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
        return Err(AppError::too_many_requests("Too many event streams"));
    }
    let guard = SseGuard;

    let mut events = state.sessions().subscribe(id).await?;
    let mut shutdown_rx = state.shutdown_rx();

    let stream = async_stream::stream! {
        let _guard = guard;
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        let ended = matches!(event, SessionEvent::Ended { .. });
                        if let Some(sse) = to_sse_event(&event) {
                            yield Ok(sse);
                        }
                        if ended {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(session_id = %id, skipped, "Event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
