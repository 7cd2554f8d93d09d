//! One detection session: an estimator plus the eye layout, alarm hook and
//! running statistics for a single input stream.
//!
//! Sessions are independent; two uploads processed at once never share
//! counters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::alarm::{AlarmDispatcher, DispatchOutcome};
use crate::detection::{
    binocular_ear, AlertState, DrowsinessEstimator, EarReading, EstimatorConfig, EyeLayout,
    LandmarkSet, Point,
};

/// Everything a presentation layer needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    /// 1-based position in the session, counting no-face frames
    pub frame_index: u64,
    pub timestamp_ms: Option<u64>,
    pub face_detected: bool,
    pub ear: Option<EarReading>,
    pub counter: u32,
    pub alert: bool,
    pub state: AlertState,
    pub rising_edge: bool,
    pub alarm: Option<DispatchOutcome>,
    pub left_eye: Option<[Point; 6]>,
    pub right_eye: Option<[Point; 6]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub frames: u64,
    pub face_missing_frames: u64,
    /// Faces whose landmark set is too short to cover both eyes
    pub incomplete_face_frames: u64,
    pub closed_eye_frames: u64,
    /// Rising edges, i.e. distinct alerts
    pub alerts: u64,
    pub alarms_dispatched: u64,
    pub alarms_dropped: u64,
    pub longest_closed_run: u32,
    pub min_ear: Option<f64>,
    pub mean_ear: Option<f64>,
}

impl SessionStats {
    fn record_ear(&mut self, ear: f64) {
        let measured = self.frames - self.face_missing_frames;
        self.min_ear = Some(self.min_ear.map_or(ear, |m| m.min(ear)));
        let mean = self.mean_ear.unwrap_or(0.0);
        self.mean_ear = Some(mean + (ear - mean) / measured as f64);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: EstimatorConfig,
    pub layout: EyeLayout,
    pub state: AlertState,
    pub counter: u32,
    pub alert: bool,
    pub stats: SessionStats,
    pub last_report: Option<FrameReport>,
}

#[derive(Debug)]
pub struct DetectionSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    layout: EyeLayout,
    estimator: DrowsinessEstimator,
    alarm: Option<AlarmDispatcher>,
    stats: SessionStats,
    last_report: Option<FrameReport>,
}

impl DetectionSession {
    pub fn new(config: EstimatorConfig, layout: EyeLayout, alarm: Option<AlarmDispatcher>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            layout,
            estimator: DrowsinessEstimator::new(config),
            alarm,
            stats: SessionStats::default(),
            last_report: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn estimator(&self) -> &DrowsinessEstimator {
        &self.estimator
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    /// Process one frame's detector output.
    ///
    /// `None` (no face) leaves the estimator untouched: the counter is
    /// frozen, neither advanced nor reset.
    pub fn observe(&mut self, landmarks: Option<&LandmarkSet>, timestamp_ms: Option<u64>) -> FrameReport {
        self.stats.frames += 1;

        let report = match landmarks {
            None => {
                self.stats.face_missing_frames += 1;
                FrameReport {
                    frame_index: self.stats.frames,
                    timestamp_ms,
                    face_detected: false,
                    ear: None,
                    counter: self.estimator.counter(),
                    alert: self.estimator.is_alerting(),
                    state: self.estimator.state(),
                    rising_edge: false,
                    alarm: None,
                    left_eye: None,
                    right_eye: None,
                }
            }
            Some(landmarks) => self.observe_face(landmarks, timestamp_ms),
        };

        self.last_report = Some(report.clone());
        report
    }

    fn observe_face(&mut self, landmarks: &LandmarkSet, timestamp_ms: Option<u64>) -> FrameReport {
        let required = self.layout.required_points();
        if landmarks.len() < required {
            self.stats.incomplete_face_frames += 1;
            tracing::debug!(
                session_id = %self.id,
                points = landmarks.len(),
                required,
                "Landmark set does not cover the eye layout"
            );
        }

        let reading = binocular_ear(landmarks, &self.layout);
        let update = self.estimator.update(reading.combined);

        self.stats.record_ear(reading.combined);
        if update.counter > 0 {
            self.stats.closed_eye_frames += 1;
            self.stats.longest_closed_run = self.stats.longest_closed_run.max(update.counter);
        }

        let alarm = if update.rising_edge {
            self.stats.alerts += 1;
            tracing::warn!(
                session_id = %self.id,
                frame = self.stats.frames,
                ear = reading.combined,
                counter = update.counter,
                "Drowsiness alert raised"
            );
            self.alarm.as_ref().map(|alarm| {
                let outcome = alarm.trigger();
                match outcome {
                    DispatchOutcome::Dispatched => self.stats.alarms_dispatched += 1,
                    DispatchOutcome::Dropped => self.stats.alarms_dropped += 1,
                }
                outcome
            })
        } else {
            None
        };

        FrameReport {
            frame_index: self.stats.frames,
            timestamp_ms,
            face_detected: true,
            ear: Some(reading),
            counter: update.counter,
            alert: update.alert,
            state: update.state,
            rising_edge: update.rising_edge,
            alarm,
            left_eye: landmarks.eye_contour(&self.layout.left),
            right_eye: landmarks.eye_contour(&self.layout.right),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            started_at: self.started_at,
            config: *self.estimator.config(),
            layout: self.layout,
            state: self.estimator.state(),
            counter: self.estimator.counter(),
            alert: self.estimator.is_alerting(),
            stats: self.stats.clone(),
            last_report: self.last_report.clone(),
        }
    }
}
