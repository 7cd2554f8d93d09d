//! Offline playback of recorded landmark streams (uploaded videos whose
//! landmarks were extracted upstream). Each replay is its own session.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::alarm::AlarmDispatcher;
use crate::detection::{AlertState, EstimatorConfig, EyeLayout};
use crate::pipeline::{
    run_session, DetectionSession, FrameObserver, FrameReport, FrameSource, LandmarkFrame,
    PrecomputedLandmarks, RunOutcome, SessionStats, StopSignal,
};
use crate::sessions::RegistryMetrics;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub session_id: Uuid,
    pub config: EstimatorConfig,
    pub outcome: RunOutcome,
    pub final_state: AlertState,
    pub stats: SessionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<FrameReport>>,
}

struct ReplayObserver {
    reports: Option<Vec<FrameReport>>,
    metrics: Option<Arc<RegistryMetrics>>,
}

impl FrameObserver<LandmarkFrame> for ReplayObserver {
    fn on_frame(&mut self, _frame: LandmarkFrame, report: &FrameReport, _session: &DetectionSession) {
        if let Some(metrics) = &self.metrics {
            metrics.record_frame(report);
        }
        if let Some(reports) = self.reports.as_mut() {
            reports.push(report.clone());
        }
    }
}

pub struct Replay {
    pub config: EstimatorConfig,
    pub layout: EyeLayout,
    pub alarm: Option<AlarmDispatcher>,
    pub include_frames: bool,
    pub metrics: Option<Arc<RegistryMetrics>>,
}

impl Replay {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            layout: EyeLayout::default(),
            alarm: None,
            include_frames: false,
            metrics: None,
        }
    }

    /// Run `source` to completion on the current thread.
    pub fn run<S>(self, mut source: S, stop: &StopSignal) -> ReplaySummary
    where
        S: FrameSource<Frame = LandmarkFrame>,
    {
        let mut session = DetectionSession::new(self.config, self.layout, self.alarm);
        let mut observer = ReplayObserver {
            reports: self.include_frames.then(Vec::new),
            metrics: self.metrics.clone(),
        };

        let span = tracing::info_span!("replay", session_id = %session.id());
        let outcome = span.in_scope(|| {
            run_session(
                &mut source,
                &mut PrecomputedLandmarks,
                &mut session,
                &mut observer,
                stop,
            )
        });

        if let Some(metrics) = &self.metrics {
            metrics.replays_run.fetch_add(1, Ordering::Relaxed);
        }

        ReplaySummary {
            session_id: session.id(),
            config: self.config,
            outcome,
            final_state: session.estimator().state(),
            stats: session.stats().clone(),
            frames: observer.reports,
        }
    }
}
