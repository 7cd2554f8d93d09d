//! Alarm playback.
//!
//! The frame loop decides *whether* to sound the alarm (rising edge only);
//! [`AlarmDispatcher`] decides whether a play request actually goes out. It
//! owns a single playback slot: a request that arrives while a clip is still
//! playing is dropped, never queued.

pub mod command;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::config::AlarmConfig;

pub use command::CommandSink;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm sound unavailable at {path}: {source}")]
    SoundUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("alarm sound at {0} is not a regular file")]
    NotAFile(PathBuf),
    #[error("alarm player command is empty")]
    EmptyPlayerCommand,
    #[error("failed to run alarm player: {0}")]
    Player(#[from] std::io::Error),
    #[error("alarm dispatch requires a tokio runtime")]
    NoRuntime,
}

/// A loaded alarm clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundHandle {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Output device for the alarm clip.
///
/// `play` while already playing must be a no-op; sinks may be called from
/// several threads at once.
pub trait AudioSink: Send + Sync {
    fn load(&self, resource: &Path) -> Result<SoundHandle, AlarmError>;
    fn is_busy(&self) -> bool;
    fn play(&self, sound: &SoundHandle) -> Result<(), AlarmError>;
}

/// Stat the clip on disk; shared by sinks that play from a file path.
pub(crate) fn load_sound_file(resource: &Path) -> Result<SoundHandle, AlarmError> {
    let meta = std::fs::metadata(resource).map_err(|source| AlarmError::SoundUnavailable {
        path: resource.to_path_buf(),
        source,
    })?;
    if !meta.is_file() {
        return Err(AlarmError::NotAFile(resource.to_path_buf()));
    }
    Ok(SoundHandle {
        path: resource.to_path_buf(),
        size_bytes: meta.len(),
    })
}

/// Sink used when no audio device or clip is available: the alert is logged only.
#[derive(Debug, Default)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn load(&self, resource: &Path) -> Result<SoundHandle, AlarmError> {
        Ok(SoundHandle {
            path: resource.to_path_buf(),
            size_bytes: 0,
        })
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn play(&self, _sound: &SoundHandle) -> Result<(), AlarmError> {
        tracing::warn!("Drowsiness alert raised (audio disabled)");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Dispatched,
    /// A previous play request still holds the slot
    Dropped,
}

#[derive(Clone)]
pub struct AlarmDispatcher {
    sink: Arc<dyn AudioSink>,
    sound: Arc<SoundHandle>,
    slot: Arc<Semaphore>,
    runtime: Handle,
}

impl std::fmt::Debug for AlarmDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmDispatcher")
            .field("sound", &self.sound)
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

impl AlarmDispatcher {
    /// Must be called from within a tokio runtime; the handle is kept so
    /// that synchronous frame loops on the blocking pool can dispatch.
    pub fn new(sink: Arc<dyn AudioSink>, sound: SoundHandle) -> Result<Self, AlarmError> {
        let runtime = Handle::try_current().map_err(|_| AlarmError::NoRuntime)?;
        Ok(Self {
            sink,
            sound: Arc::new(sound),
            slot: Arc::new(Semaphore::new(1)),
            runtime,
        })
    }

    /// Load the configured clip through an external player, falling back to
    /// a [`SilentSink`] when no clip is configured or it cannot be loaded.
    pub fn from_config(config: &AlarmConfig) -> Result<Self, AlarmError> {
        let Some(path) = config.sound_path.as_deref() else {
            tracing::info!("No alarm sound configured, alerts will be logged only");
            return Self::silent();
        };

        let loaded = CommandSink::from_command_line(&config.player_command)
            .and_then(|sink| sink.load(Path::new(path)).map(|sound| (sink, sound)));

        match loaded {
            Ok((sink, sound)) => {
                tracing::info!(
                    path = %sound.path.display(),
                    size_bytes = sound.size_bytes,
                    player = %config.player_command,
                    "Alarm sound loaded"
                );
                Self::new(Arc::new(sink), sound)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize alarm sound, alerts will be logged only");
                Self::silent()
            }
        }
    }

    pub fn silent() -> Result<Self, AlarmError> {
        let sink = SilentSink;
        let sound = sink.load(Path::new("silent"))?;
        Self::new(Arc::new(sink), sound)
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Fire-and-forget play request. The frame loop never waits on playback.
    pub fn trigger(&self) -> DispatchOutcome {
        let permit = match self.slot.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("Alarm already in flight, request dropped");
                return DispatchOutcome::Dropped;
            }
        };

        let sink = self.sink.clone();
        let sound = self.sound.clone();
        self.runtime.spawn_blocking(move || {
            let _permit = permit;
            if sink.is_busy() {
                tracing::debug!("Audio sink busy, skipping alarm");
                return;
            }
            if let Err(e) = sink.play(&sound) {
                tracing::error!(error = %e, "Failed to play alarm sound");
            }
        });

        DispatchOutcome::Dispatched
    }
}
