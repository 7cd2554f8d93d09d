use proptest::prelude::*;

use drowsiness_guard::detection::{
    eye_aspect_ratio, DrowsinessEstimator, EstimatorConfig, EyeIndices, EyeLayout, LandmarkSet,
    Point,
};
use drowsiness_guard::pipeline::DetectionSession;

const EYE: EyeIndices = EyeIndices::new([0, 1, 2, 3, 4, 5]);

fn eye_points() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.0_f64..1.0, 0.0_f64..1.0), 6)
}

fn width(points: &[(f64, f64)]) -> f64 {
    let (dx, dy) = (points[0].0 - points[3].0, points[0].1 - points[3].1);
    (dx * dx + dy * dy).sqrt()
}

fn landmarks(points: &[(f64, f64)]) -> LandmarkSet {
    LandmarkSet::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
}

fn two_eyes(ear: f64) -> LandmarkSet {
    let width = 0.1;
    let gap = ear * width;
    let mut points = Vec::with_capacity(12);
    for cx in [0.3, 0.7] {
        let (l, r) = (cx - width / 2.0, cx + width / 2.0);
        points.extend([
            Point::new(l, 0.5),
            Point::new(l + width / 3.0, 0.5 - gap / 2.0),
            Point::new(r - width / 3.0, 0.5 - gap / 2.0),
            Point::new(r, 0.5),
            Point::new(r - width / 3.0, 0.5 + gap / 2.0),
            Point::new(l + width / 3.0, 0.5 + gap / 2.0),
        ]);
    }
    LandmarkSet::new(points)
}

fn split_layout() -> EyeLayout {
    EyeLayout {
        left: EyeIndices::new([0, 1, 2, 3, 4, 5]),
        right: EyeIndices::new([6, 7, 8, 9, 10, 11]),
    }
}

proptest! {
    #[test]
    fn pt_ear_is_non_negative_and_finite(points in eye_points()) {
        let ear = eye_aspect_ratio(&landmarks(&points), &EYE);
        prop_assert!(ear.is_finite());
        prop_assert!(ear >= 0.0);
    }

    #[test]
    fn pt_ear_translation_invariant(
        points in eye_points(),
        dx in -0.5_f64..0.5,
        dy in -0.5_f64..0.5,
    ) {
        prop_assume!(width(&points) > 1e-3);
        let base = eye_aspect_ratio(&landmarks(&points), &EYE);
        let shifted: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x + dx, y + dy)).collect();
        let moved = eye_aspect_ratio(&landmarks(&shifted), &EYE);
        prop_assert!((base - moved).abs() <= 1e-6 * base.max(1.0));
    }

    #[test]
    fn pt_ear_scale_invariant(points in eye_points(), k in 0.1_f64..10.0) {
        prop_assume!(width(&points) > 1e-3);
        let base = eye_aspect_ratio(&landmarks(&points), &EYE);
        let scaled: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x * k, y * k)).collect();
        let zoomed = eye_aspect_ratio(&landmarks(&scaled), &EYE);
        prop_assert!((base - zoomed).abs() <= 1e-6 * base.max(1.0));
    }

    #[test]
    fn pt_zero_width_eye_reads_closed(mut points in eye_points()) {
        points[3] = points[0];
        prop_assert_eq!(eye_aspect_ratio(&landmarks(&points), &EYE), 0.0);
    }

    #[test]
    fn pt_alert_iff_counter_reaches_threshold(
        consec in 1_u32..30,
        ears in prop::collection::vec(0.0_f64..0.5, 0..200),
    ) {
        let config = EstimatorConfig::new(0.25, consec).unwrap();
        let mut estimator = DrowsinessEstimator::new(config);
        let mut run = 0_u32;

        for ear in ears {
            let update = estimator.update(ear);
            run = if ear < 0.25 { run + 1 } else { 0 };
            prop_assert_eq!(update.counter, run);
            prop_assert_eq!(update.alert, run >= consec);
        }
    }

    #[test]
    fn pt_rising_edges_match_alert_transitions(
        consec in 1_u32..10,
        ears in prop::collection::vec(0.0_f64..0.5, 0..300),
    ) {
        let config = EstimatorConfig::new(0.25, consec).unwrap();
        let mut estimator = DrowsinessEstimator::new(config);
        let mut previous = false;
        let mut transitions = 0_u32;
        let mut edges = 0_u32;

        for ear in ears {
            let update = estimator.update(ear);
            if update.alert && !previous {
                transitions += 1;
            }
            if update.rising_edge {
                edges += 1;
            }
            previous = update.alert;
        }
        prop_assert_eq!(edges, transitions);
    }

    #[test]
    fn pt_missing_face_freezes_state(
        closed in 0_usize..40,
        gaps in 1_usize..10,
    ) {
        let config = EstimatorConfig::new(0.25, 20).unwrap();
        let mut session = DetectionSession::new(config, split_layout(), None);
        let face = two_eyes(0.1);

        for _ in 0..closed {
            session.observe(Some(&face), None);
        }
        let before = (session.estimator().counter(), session.estimator().state());

        for _ in 0..gaps {
            let report = session.observe(None, None);
            prop_assert!(!report.face_detected);
            prop_assert!(!report.rising_edge);
            prop_assert_eq!((report.counter, report.state), before);
        }
        prop_assert_eq!(session.stats().face_missing_frames, gaps as u64);
    }
}
