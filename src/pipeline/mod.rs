//! Frame loop: source → landmark detector → detection session → observer.

pub mod detector;
pub mod runner;
pub mod session;
pub mod source;

pub use detector::{CarriesLandmarks, LandmarkDetector, PrecomputedLandmarks};
pub use runner::{run_session, FrameObserver, NullObserver, RunEnd, RunOutcome, StopSignal};
pub use session::{DetectionSession, FrameReport, SessionSnapshot, SessionStats};
pub use source::{
    ChannelSource, Frame, FrameSource, IterSource, JsonlSource, LandmarkFrame, SourceError,
};
