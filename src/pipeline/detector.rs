use std::borrow::Cow;

use crate::detection::LandmarkSet;

use super::source::{Frame, LandmarkFrame};

/// Face landmark model: zero or one landmark set per frame.
pub trait LandmarkDetector<F> {
    fn detect<'f>(&mut self, frame: &'f F) -> Option<Cow<'f, LandmarkSet>>;
}

/// Frames that already carry detector output.
pub trait CarriesLandmarks: Frame {
    fn landmarks(&self) -> Option<&LandmarkSet>;
}

impl CarriesLandmarks for LandmarkFrame {
    fn landmarks(&self) -> Option<&LandmarkSet> {
        self.landmarks.as_ref()
    }
}

/// Detector for frames whose landmarks were extracted upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecomputedLandmarks;

impl<F: CarriesLandmarks> LandmarkDetector<F> for PrecomputedLandmarks {
    fn detect<'f>(&mut self, frame: &'f F) -> Option<Cow<'f, LandmarkSet>> {
        frame.landmarks().map(Cow::Borrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point;

    #[test]
    fn passes_through_without_copying() {
        let frame = LandmarkFrame::with_face(LandmarkSet::new(vec![Point::new(0.5, 0.5)]));
        let detected = PrecomputedLandmarks.detect(&frame).expect("face present");
        assert!(matches!(detected, Cow::Borrowed(_)));
        assert_eq!(detected.len(), 1);
    }

    #[test]
    fn no_face_stays_none() {
        assert!(PrecomputedLandmarks.detect(&LandmarkFrame::no_face()).is_none());
    }
}
