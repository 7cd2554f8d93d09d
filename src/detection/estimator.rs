//! Drowsiness debounce state machine.
//!
//! Three states driven by the per-frame combined EAR:
//! Awake (counter 0) → Accumulating (1..consec_frames-1) → Alerting (>= consec_frames).
//! Any frame at or above the threshold returns to Awake on that frame.
//!
//! Frames without a face never reach [`DrowsinessEstimator::update`]; the
//! caller holds the state as-is.

use serde::Serialize;
use thiserror::Error;

use crate::constants::{DEFAULT_CONSEC_FRAMES, DEFAULT_EAR_THRESHOLD};

#[derive(Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("ear threshold must be finite and positive, got {0}")]
    InvalidThreshold(f64),
    #[error("consecutive frame threshold must be at least 1")]
    InvalidConsecFrames,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatorConfig {
    ear_threshold: f64,
    consec_frames: u32,
}

impl EstimatorConfig {
    pub fn new(ear_threshold: f64, consec_frames: u32) -> Result<Self, DetectionError> {
        if !ear_threshold.is_finite() || ear_threshold <= 0.0 {
            return Err(DetectionError::InvalidThreshold(ear_threshold));
        }
        if consec_frames == 0 {
            return Err(DetectionError::InvalidConsecFrames);
        }
        Ok(Self {
            ear_threshold,
            consec_frames,
        })
    }

    pub fn ear_threshold(&self) -> f64 {
        self.ear_threshold
    }

    pub fn consec_frames(&self) -> u32 {
        self.consec_frames
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            consec_frames: DEFAULT_CONSEC_FRAMES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Awake,
    Accumulating,
    Alerting,
}

/// Result of feeding one frame's EAR into the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatorUpdate {
    pub ear: f64,
    pub counter: u32,
    pub alert: bool,
    pub state: AlertState,
    /// True only on the frame where `alert` went from false to true
    pub rising_edge: bool,
}

#[derive(Debug, Clone)]
pub struct DrowsinessEstimator {
    config: EstimatorConfig,
    counter: u32,
    alert: bool,
}

impl DrowsinessEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            counter: 0,
            alert: false,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn is_alerting(&self) -> bool {
        self.alert
    }

    pub fn state(&self) -> AlertState {
        if self.alert {
            AlertState::Alerting
        } else if self.counter > 0 {
            AlertState::Accumulating
        } else {
            AlertState::Awake
        }
    }

    pub fn update(&mut self, ear: f64) -> EstimatorUpdate {
        let was_alerting = self.alert;

        if ear < self.config.ear_threshold {
            self.counter = self.counter.saturating_add(1);
            self.alert = self.counter >= self.config.consec_frames;
        } else {
            self.counter = 0;
            self.alert = false;
        }

        EstimatorUpdate {
            ear,
            counter: self.counter,
            alert: self.alert,
            state: self.state(),
            rising_edge: self.alert && !was_alerting,
        }
    }
}

impl Default for DrowsinessEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}
