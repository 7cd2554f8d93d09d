//! Landmark types shared by the EAR calculator and the frame pipeline.
//!
//! Coordinates are normalized to the frame (x by width, y by height), as
//! produced by face-mesh style detectors. A landmark set is read-only for the
//! estimator and is dropped after its frame is processed.

use serde::{Deserialize, Serialize};

use crate::constants::{LEFT_EYE, RIGHT_EYE};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One frame's worth of anatomically indexed face landmarks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The six points selected by `eye`, in index order.
    ///
    /// Returns `None` if any index falls outside the set.
    pub fn eye_contour(&self, eye: &EyeIndices) -> Option<[Point; 6]> {
        let idx = eye.as_array();
        Some([
            *self.get(idx[0])?,
            *self.get(idx[1])?,
            *self.get(idx[2])?,
            *self.get(idx[3])?,
            *self.get(idx[4])?,
            *self.get(idx[5])?,
        ])
    }
}

impl From<Vec<Point>> for LandmarkSet {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Six ordered indices into a [`LandmarkSet`] describing one eye.
///
/// Positions 0 and 3 are the eye corners; (1, 5) and (2, 4) are the two
/// vertical eyelid pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeIndices([usize; 6]);

impl EyeIndices {
    pub const fn new(indices: [usize; 6]) -> Self {
        Self(indices)
    }

    pub fn as_array(&self) -> &[usize; 6] {
        &self.0
    }

    pub fn max_index(&self) -> usize {
        self.0.iter().copied().max().unwrap_or(0)
    }
}

/// Index sets for both eyes, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeLayout {
    pub left: EyeIndices,
    pub right: EyeIndices,
}

impl EyeLayout {
    pub const FACE_MESH: EyeLayout = EyeLayout {
        left: EyeIndices::new(LEFT_EYE),
        right: EyeIndices::new(RIGHT_EYE),
    };

    /// Smallest landmark set that covers both eyes.
    pub fn required_points(&self) -> usize {
        self.left.max_index().max(self.right.max_index()).saturating_add(1)
    }
}

impl Default for EyeLayout {
    fn default() -> Self {
        Self::FACE_MESH
    }
}
