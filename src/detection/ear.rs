//! EAR (Eye Aspect Ratio) calculation
//!
//! Standard six-point formula:
//! `EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)`
//! where p0/p3 are the eye corners and (p1, p5), (p2, p4) the eyelid pairs.
//!
//! Never fails: an out-of-range index, a non-finite coordinate or a
//! degenerate (zero-width) eye yields 0.0, the closed-eye value.

use serde::Serialize;

use super::landmarks::{EyeIndices, EyeLayout, LandmarkSet, Point};

/// Per-eye and combined EAR for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarReading {
    pub left: f64,
    pub right: f64,
    /// Mean of `left` and `right`; the value fed to the debounce machine
    pub combined: f64,
}

/// EAR of a single eye. Returns 0.0 for malformed input.
pub fn eye_aspect_ratio(landmarks: &LandmarkSet, eye: &EyeIndices) -> f64 {
    match landmarks.eye_contour(eye) {
        Some(points) => ratio_of(&points),
        None => 0.0,
    }
}

/// EAR of both eyes and their mean.
pub fn binocular_ear(landmarks: &LandmarkSet, layout: &EyeLayout) -> EarReading {
    let left = eye_aspect_ratio(landmarks, &layout.left);
    let right = eye_aspect_ratio(landmarks, &layout.right);
    EarReading {
        left,
        right,
        combined: (left + right) / 2.0,
    }
}

fn ratio_of(p: &[Point; 6]) -> f64 {
    if !p.iter().all(Point::is_finite) {
        return 0.0;
    }

    let horizontal = p[0].distance(&p[3]);
    if horizontal == 0.0 {
        return 0.0;
    }

    let vertical1 = p[1].distance(&p[5]);
    let vertical2 = p[2].distance(&p[4]);
    let ear = (vertical1 + vertical2) / (2.0 * horizontal);

    // subnormal widths can still overflow
    if ear.is_finite() {
        ear
    } else {
        0.0
    }
}
