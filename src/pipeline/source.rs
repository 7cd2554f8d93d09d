//! Frame sources.
//!
//! File playback and live capture differ only in how frames arrive, so both
//! are a [`FrameSource`]: a pull-based sequence that is either finite
//! (`None` at end of stream) or unbounded until its producer goes away.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::detection::LandmarkSet;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read frame source: {0}")]
    Io(#[from] io::Error),
    #[error("malformed frame on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-frame metadata every source item exposes.
pub trait Frame {
    fn timestamp_ms(&self) -> Option<u64> {
        None
    }
}

pub trait FrameSource {
    type Frame;

    /// `None` ends the stream; `Some(Err(_))` ends it with a failure.
    fn next_frame(&mut self) -> Option<Result<Self::Frame, SourceError>>;

    /// Live sources block until the next frame arrives.
    fn is_live(&self) -> bool {
        false
    }
}

/// A frame whose landmarks were already extracted upstream (for example by
/// a face mesh running in the browser). `landmarks: null` means no face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkFrame {
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    #[serde(default)]
    pub landmarks: Option<LandmarkSet>,
}

impl LandmarkFrame {
    pub fn with_face(landmarks: LandmarkSet) -> Self {
        Self {
            timestamp_ms: None,
            landmarks: Some(landmarks),
        }
    }

    pub fn no_face() -> Self {
        Self::default()
    }
}

impl Frame for LandmarkFrame {
    fn timestamp_ms(&self) -> Option<u64> {
        self.timestamp_ms
    }
}

/// Newline-delimited JSON landmark frames. Blank lines are skipped.
pub struct JsonlSource<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl JsonlSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> FrameSource for JsonlSource<R> {
    type Frame = LandmarkFrame;

    fn next_frame(&mut self) -> Option<Result<LandmarkFrame, SourceError>> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(trimmed).map_err(|source| {
                        SourceError::Malformed {
                            line: self.line,
                            source,
                        }
                    }));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Finite in-memory source.
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    pub fn new<T: IntoIterator<IntoIter = I>>(iter: T) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I: Iterator> FrameSource for IterSource<I> {
    type Frame = I::Item;

    fn next_frame(&mut self) -> Option<Result<I::Item, SourceError>> {
        self.iter.next().map(Ok)
    }
}

/// Live frames pushed from async producers, consumed by a loop running on
/// the blocking pool. Ends once every sender is dropped.
pub struct ChannelSource<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> ChannelSource<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self { rx }
    }
}

impl<T> FrameSource for ChannelSource<T> {
    type Frame = T;

    fn next_frame(&mut self) -> Option<Result<T, SourceError>> {
        self.rx.blocking_recv().map(Ok)
    }

    fn is_live(&self) -> bool {
        true
    }
}
