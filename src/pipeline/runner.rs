use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::detector::LandmarkDetector;
use super::session::{DetectionSession, FrameReport};
use super::source::{Frame, FrameSource, SourceError};

/// User-initiated stop, checked before every frame.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives every processed frame, in order, on the loop thread.
pub trait FrameObserver<F> {
    fn on_frame(&mut self, frame: F, report: &FrameReport, session: &DetectionSession);

    fn on_source_error(&mut self, _error: &SourceError, _session: &DetectionSession) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl<F> FrameObserver<F> for NullObserver {
    fn on_frame(&mut self, _frame: F, _report: &FrameReport, _session: &DetectionSession) {}
}

impl<F> FrameObserver<F> for Vec<FrameReport> {
    fn on_frame(&mut self, _frame: F, report: &FrameReport, _session: &DetectionSession) {
        self.push(report.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunEnd {
    /// The source reached end of stream
    Exhausted,
    Stopped,
    SourceFailed { message: String },
    /// The loop thread terminated abnormally
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub frames: u64,
    pub end: RunEnd,
}

/// Drive `source` through `detector` into `session` until the stream ends,
/// fails, or `stop` is raised.
///
/// Frames are handled strictly one at a time on the calling thread; a
/// failed read ends this session only.
pub fn run_session<S, D, O>(
    source: &mut S,
    detector: &mut D,
    session: &mut DetectionSession,
    observer: &mut O,
    stop: &StopSignal,
) -> RunOutcome
where
    S: FrameSource,
    S::Frame: Frame,
    D: LandmarkDetector<S::Frame>,
    O: FrameObserver<S::Frame>,
{
    let mut frames = 0_u64;

    let end = loop {
        if stop.is_stopped() {
            break RunEnd::Stopped;
        }

        let frame = match source.next_frame() {
            None if stop.is_stopped() => break RunEnd::Stopped,
            None => break RunEnd::Exhausted,
            Some(Err(e)) => {
                tracing::warn!(session_id = %session.id(), error = %e, "Frame source failed");
                observer.on_source_error(&e, session);
                break RunEnd::SourceFailed {
                    message: e.to_string(),
                };
            }
            Some(Ok(frame)) => frame,
        };

        let report = {
            let landmarks = detector.detect(&frame);
            session.observe(landmarks.as_deref(), frame.timestamp_ms())
        };
        frames += 1;
        observer.on_frame(frame, &report, session);
    };

    tracing::info!(
        session_id = %session.id(),
        frames,
        alerts = session.stats().alerts,
        end = ?end,
        live = source.is_live(),
        "Session loop finished"
    );

    RunOutcome { frames, end }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::detection::{EstimatorConfig, LandmarkSet};
    use crate::pipeline::detector::PrecomputedLandmarks;
    use crate::pipeline::session::fixtures::{eyes, layout};
    use crate::pipeline::source::{IterSource, JsonlSource, LandmarkFrame};

    fn session(consec: u32) -> DetectionSession {
        DetectionSession::new(EstimatorConfig::new(0.25, consec).unwrap(), layout(), None)
    }

    fn closed() -> LandmarkFrame {
        LandmarkFrame::with_face(eyes(0.1, 0.01))
    }

    fn open() -> LandmarkFrame {
        LandmarkFrame::with_face(eyes(0.1, 0.04))
    }

    #[test]
    fn runs_finite_source_to_exhaustion() {
        let mut frames: Vec<LandmarkFrame> = std::iter::repeat_with(closed).take(20).collect();
        frames.push(open());

        let mut s = session(20);
        let mut reports: Vec<FrameReport> = Vec::new();
        let outcome = run_session(
            &mut IterSource::new(frames),
            &mut PrecomputedLandmarks,
            &mut s,
            &mut reports,
            &StopSignal::new(),
        );

        assert_eq!(outcome, RunOutcome { frames: 21, end: RunEnd::Exhausted });
        assert!(reports[..19].iter().all(|r| !r.alert));
        assert_eq!(reports[18].counter, 19);
        assert!(reports[19].alert && reports[19].rising_edge);
        assert_eq!(reports[19].counter, 20);
        assert!(!reports[20].alert);
        assert_eq!(reports[20].counter, 0);
    }

    #[test]
    fn stop_signal_ends_before_next_frame() {
        struct StopAfter(usize, StopSignal);
        impl FrameObserver<LandmarkFrame> for StopAfter {
            fn on_frame(&mut self, _f: LandmarkFrame, r: &FrameReport, _s: &DetectionSession) {
                if r.frame_index as usize == self.0 {
                    self.1.stop();
                }
            }
        }

        let stop = StopSignal::new();
        let mut observer = StopAfter(3, stop.clone());
        let outcome = run_session(
            &mut IterSource::new(std::iter::repeat_with(open)),
            &mut PrecomputedLandmarks,
            &mut session(20),
            &mut observer,
            &stop,
        );
        assert_eq!(outcome, RunOutcome { frames: 3, end: RunEnd::Stopped });
    }

    #[test]
    fn source_failure_ends_session_and_notifies() {
        #[derive(Default)]
        struct Errors(Vec<String>);
        impl FrameObserver<LandmarkFrame> for Errors {
            fn on_frame(&mut self, _f: LandmarkFrame, _r: &FrameReport, _s: &DetectionSession) {}
            fn on_source_error(&mut self, e: &SourceError, _s: &DetectionSession) {
                self.0.push(e.to_string());
            }
        }

        let input = "{\"landmarks\":null}\n{broken\n{\"landmarks\":null}\n";
        let mut observer = Errors::default();
        let outcome = run_session(
            &mut JsonlSource::new(Cursor::new(input)),
            &mut PrecomputedLandmarks,
            &mut session(20),
            &mut observer,
            &StopSignal::new(),
        );
        assert_eq!(outcome.frames, 1);
        assert!(matches!(outcome.end, RunEnd::SourceFailed { .. }));
        assert_eq!(observer.0.len(), 1);
        assert!(observer.0[0].contains("line 2"));
    }

    #[test]
    fn no_face_frames_do_not_break_closed_run() {
        let frames = vec![
            closed(),
            closed(),
            LandmarkFrame::no_face(),
            LandmarkFrame::no_face(),
            closed(),
        ];
        let mut s = session(3);
        let mut reports: Vec<FrameReport> = Vec::new();
        run_session(
            &mut IterSource::new(frames),
            &mut PrecomputedLandmarks,
            &mut s,
            &mut reports,
            &StopSignal::new(),
        );
        let counters: Vec<u32> = reports.iter().map(|r| r.counter).collect();
        assert_eq!(counters, vec![1, 2, 2, 2, 3]);
        assert!(reports[4].rising_edge);
    }

    #[test]
    fn empty_landmark_set_is_a_face_with_closed_eyes() {
        let frames = vec![LandmarkFrame::with_face(LandmarkSet::default())];
        let mut reports: Vec<FrameReport> = Vec::new();
        run_session(
            &mut IterSource::new(frames),
            &mut PrecomputedLandmarks,
            &mut session(1),
            &mut reports,
            &StopSignal::new(),
        );
        assert!(reports[0].face_detected);
        assert!(reports[0].alert);
    }
}
