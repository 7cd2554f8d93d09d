use serde_json::{json, Value};

use drowsiness_guard::constants::{LEFT_EYE, RIGHT_EYE};

/// Refined face mesh output: 468 face points plus 10 iris points.
const FACE_MESH_POINTS: usize = 478;

/// A full face-mesh landmark array whose eyes have the given aspect ratio.
///
/// Non-eye points sit at the frame centre; each eye is 0.06 wide.
pub fn face_with_ear(ear: f64) -> Value {
    let mut points = vec![(0.5_f64, 0.5_f64); FACE_MESH_POINTS];
    let width = 0.06;
    let gap = ear * width;

    for (eye, cx) in [(LEFT_EYE, 0.62), (RIGHT_EYE, 0.38)] {
        let (l, r) = (cx - width / 2.0, cx + width / 2.0);
        let (up, down) = (0.45 - gap / 2.0, 0.45 + gap / 2.0);
        let coords = [
            (l, 0.45),
            (l + width / 3.0, up),
            (r - width / 3.0, up),
            (r, 0.45),
            (r - width / 3.0, down),
            (l + width / 3.0, down),
        ];
        for (index, coord) in eye.iter().zip(coords) {
            points[*index] = coord;
        }
    }

    Value::Array(
        points
            .into_iter()
            .map(|(x, y)| json!({ "x": x, "y": y }))
            .collect(),
    )
}

pub fn frame_with_ear(ear: f64) -> Value {
    json!({ "landmarks": face_with_ear(ear) })
}

pub fn no_face_frame() -> Value {
    json!({ "landmarks": null })
}
