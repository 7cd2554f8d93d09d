use std::io::Cursor;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;

use crate::detection::{EstimatorConfig, EyeLayout};
use crate::extractors::JsonBody;
use crate::pipeline::{FrameSource, IterSource, JsonlSource, LandmarkFrame, StopSignal};
use crate::replay::{Replay, ReplaySummary};
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(replay_frames))
        .route("/jsonl", post(replay_jsonl))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayRequest {
    frames: Vec<LandmarkFrame>,
    #[serde(default)]
    ear_threshold: Option<f64>,
    #[serde(default)]
    consec_frames: Option<u32>,
    #[serde(default)]
    layout: Option<EyeLayout>,
    #[serde(default)]
    include_frames: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayQuery {
    ear_threshold: Option<f64>,
    consec_frames: Option<u32>,
    #[serde(default)]
    include_frames: bool,
}

async fn replay_frames(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ReplayRequest>,
) -> Result<impl IntoResponse, AppError> {
    check_frame_count(&state, req.frames.len())?;
    let config = state.estimator_config(req.ear_threshold, req.consec_frames)?;
    let replay = build_replay(&state, config, req.layout, req.include_frames);
    let summary = run_blocking(&state, replay, IterSource::new(req.frames)).await?;
    Ok(ok(summary))
}

async fn replay_jsonl(
    State(state): State<AppState>,
    Query(query): Query<ReplayQuery>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let frames = body.lines().filter(|l| !l.trim().is_empty()).count();
    check_frame_count(&state, frames)?;
    let config = state.estimator_config(query.ear_threshold, query.consec_frames)?;
    let replay = build_replay(&state, config, None, query.include_frames);
    let summary = run_blocking(&state, replay, JsonlSource::new(Cursor::new(body))).await?;
    Ok(ok(summary))
}

fn check_frame_count(state: &AppState, frames: usize) -> Result<(), AppError> {
    let max = state.config().limits.max_replay_frames;
    if frames > max {
        return Err(AppError::payload_too_large(&format!(
            "Replay has {frames} frames, limit is {max}"
        )));
    }
    Ok(())
}

fn build_replay(
    state: &AppState,
    config: EstimatorConfig,
    layout: Option<EyeLayout>,
    include_frames: bool,
) -> Replay {
    Replay {
        config,
        layout: layout.unwrap_or_default(),
        alarm: state.alarm().cloned(),
        include_frames,
        metrics: Some(state.sessions().metrics().clone()),
    }
}

/// Run the replay loop on the blocking pool; shutdown stops it between frames.
async fn run_blocking<S>(state: &AppState, replay: Replay, source: S) -> Result<ReplaySummary, AppError>
where
    S: FrameSource<Frame = LandmarkFrame> + Send + 'static,
{
    let stop = StopSignal::new();
    let watcher = {
        let stop = stop.clone();
        let mut shutdown_rx = state.shutdown_rx();
        tokio::spawn(async move {
            if shutdown_rx.recv().await.is_ok() {
                stop.stop();
            }
        })
    };

    let result = tokio::task::spawn_blocking(move || replay.run(source, &stop)).await;
    watcher.abort();
    Ok(result?)
}
