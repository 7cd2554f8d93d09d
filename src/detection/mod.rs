//! Eye-closure detection core: landmark types, EAR and the debounce estimator.

pub mod ear;
pub mod estimator;
pub mod landmarks;

pub use ear::{binocular_ear, eye_aspect_ratio, EarReading};
pub use estimator::{
    AlertState, DetectionError, DrowsinessEstimator, EstimatorConfig, EstimatorUpdate,
};
pub use landmarks::{EyeIndices, EyeLayout, LandmarkSet, Point};
