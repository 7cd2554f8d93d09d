//! Live detection sessions.
//!
//! Each session runs its own frame loop on the blocking pool, fed through a
//! bounded channel. HTTP handlers only enqueue frames and wait for the
//! loop's report, so a session's estimator is only ever touched by its loop
//! thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use uuid::Uuid;

use crate::alarm::AlarmDispatcher;
use crate::constants::SESSION_EVENT_CAPACITY;
use crate::detection::{EstimatorConfig, EyeLayout, LandmarkSet};
use crate::pipeline::{
    run_session, CarriesLandmarks, ChannelSource, DetectionSession, Frame, FrameObserver,
    FrameReport, LandmarkFrame, PrecomputedLandmarks, RunEnd, RunOutcome, SessionSnapshot,
    StopSignal,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("live session limit of {0} reached")]
    LimitReached(usize),
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("session {0} is closed")]
    Closed(Uuid),
}

/// Frame queued to a live session together with the pusher's reply slot.
pub struct LiveFrame {
    pub frame: LandmarkFrame,
    reply: Option<oneshot::Sender<FrameReport>>,
}

impl Frame for LiveFrame {
    fn timestamp_ms(&self) -> Option<u64> {
        self.frame.timestamp_ms
    }
}

impl CarriesLandmarks for LiveFrame {
    fn landmarks(&self) -> Option<&LandmarkSet> {
        self.frame.landmarks.as_ref()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Frame { report: FrameReport },
    Alert { report: FrameReport },
    Ended { outcome: RunOutcome },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Frame { .. } => "frame",
            Self::Alert { .. } => "alert",
            Self::Ended { .. } => "ended",
        }
    }
}

/// Process-wide counters for the health endpoint.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    pub sessions_started: AtomicU64,
    pub replays_run: AtomicU64,
    pub frames_processed: AtomicU64,
    pub alerts_raised: AtomicU64,
}

impl RegistryMetrics {
    pub fn record_frame(&self, report: &FrameReport) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        if report.rising_edge {
            self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "sessionsStarted": self.sessions_started.load(Ordering::Relaxed),
            "replaysRun": self.replays_run.load(Ordering::Relaxed),
            "framesProcessed": self.frames_processed.load(Ordering::Relaxed),
            "alertsRaised": self.alerts_raised.load(Ordering::Relaxed),
        })
    }
}

struct LiveObserver {
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    metrics: Arc<RegistryMetrics>,
}

impl FrameObserver<LiveFrame> for LiveObserver {
    fn on_frame(&mut self, frame: LiveFrame, report: &FrameReport, session: &DetectionSession) {
        self.metrics.record_frame(report);
        self.snapshot_tx.send_replace(session.snapshot());

        // no subscribers is fine
        let _ = self.events_tx.send(SessionEvent::Frame {
            report: report.clone(),
        });
        if report.rising_edge {
            let _ = self.events_tx.send(SessionEvent::Alert {
                report: report.clone(),
            });
        }

        if let Some(reply) = frame.reply {
            let _ = reply.send(report.clone());
        }
    }
}

struct LiveSession {
    created_at: DateTime<Utc>,
    frames_tx: mpsc::Sender<LiveFrame>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    stop: StopSignal,
    last_active: Mutex<Instant>,
}

impl LiveSession {
    fn touch(&self) {
        if let Ok(mut last) = self.last_active.lock() {
            *last = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub config: EstimatorConfig,
    pub layout: EyeLayout,
}

type SessionMap = Arc<RwLock<HashMap<Uuid, Arc<LiveSession>>>>;

pub struct SessionRegistry {
    sessions: SessionMap,
    alarm: Option<AlarmDispatcher>,
    max_sessions: usize,
    queue_depth: usize,
    metrics: Arc<RegistryMetrics>,
}

impl SessionRegistry {
    pub fn new(alarm: Option<AlarmDispatcher>, max_sessions: usize, queue_depth: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            alarm,
            max_sessions,
            queue_depth: queue_depth.max(1),
            metrics: Arc::new(RegistryMetrics::default()),
        }
    }

    pub fn alarm(&self) -> Option<&AlarmDispatcher> {
        self.alarm.as_ref()
    }

    pub fn metrics(&self) -> &Arc<RegistryMetrics> {
        &self.metrics
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Start a live session and its frame loop.
    pub async fn create(
        &self,
        config: EstimatorConfig,
        layout: EyeLayout,
    ) -> Result<SessionInfo, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::LimitReached(self.max_sessions));
        }

        let mut session = DetectionSession::new(config, layout, self.alarm.clone());
        let id = session.id();
        let created_at = Utc::now();

        let (frames_tx, frames_rx) = mpsc::channel(self.queue_depth);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (events_tx, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        let stop = StopSignal::new();

        let mut observer = LiveObserver {
            snapshot_tx,
            events_tx: events_tx.clone(),
            metrics: self.metrics.clone(),
        };
        let loop_stop = stop.clone();
        let span = tracing::info_span!("session", session_id = %id);
        let task = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                run_session(
                    &mut ChannelSource::new(frames_rx),
                    &mut PrecomputedLandmarks,
                    &mut session,
                    &mut observer,
                    &loop_stop,
                )
            })
        });

        sessions.insert(
            id,
            Arc::new(LiveSession {
                created_at,
                frames_tx,
                snapshot_rx,
                events_tx: events_tx.clone(),
                stop,
                last_active: Mutex::new(Instant::now()),
            }),
        );
        drop(sessions);

        let registry = self.sessions.clone();
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(session_id = %id, error = %e, "Session loop panicked");
                    RunOutcome {
                        frames: 0,
                        end: RunEnd::Aborted,
                    }
                }
            };
            registry.write().await.remove(&id);
            let _ = events_tx.send(SessionEvent::Ended { outcome });
        });

        self.metrics.sessions_started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            session_id = %id,
            ear_threshold = config.ear_threshold(),
            consec_frames = config.consec_frames(),
            "Live session started"
        );

        Ok(SessionInfo {
            id,
            created_at,
            config,
            layout,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Arc<LiveSession>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    /// Queue a frame and wait until the loop has processed it.
    pub async fn push_frame(&self, id: Uuid, frame: LandmarkFrame) -> Result<FrameReport, SessionError> {
        let session = self.get(id).await?;
        session.touch();
        let (reply_tx, reply_rx) = oneshot::channel();
        session
            .frames_tx
            .send(LiveFrame {
                frame,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| SessionError::Closed(id))?;
        drop(session);

        reply_rx.await.map_err(|_| SessionError::Closed(id))
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let session = self.get(id).await?;
        let snapshot = session.snapshot_rx.borrow().clone();
        Ok(snapshot)
    }

    pub async fn list(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        let mut live: Vec<(DateTime<Utc>, SessionSnapshot)> = sessions
            .values()
            .map(|s| (s.created_at, s.snapshot_rx.borrow().clone()))
            .collect();
        live.sort_by_key(|(created_at, _)| *created_at);
        live.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    pub async fn subscribe(&self, id: Uuid) -> Result<broadcast::Receiver<SessionEvent>, SessionError> {
        Ok(self.get(id).await?.events_tx.subscribe())
    }

    /// Stop a session and return its state as of the last processed frame.
    pub async fn stop(&self, id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::NotFound(id))?;
        session.stop.stop();
        let snapshot = session.snapshot_rx.borrow().clone();
        tracing::info!(session_id = %id, frames = snapshot.stats.frames, "Live session stopped");
        Ok(snapshot)
    }

    /// Stop every session that has not received a frame for `max_idle`.
    /// Returns the ids that were stopped.
    pub async fn sweep_idle(&self, max_idle: Duration) -> Vec<Uuid> {
        let stale: Vec<Uuid> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, session)| session.idle_for() >= max_idle)
            .map(|(id, _)| *id)
            .collect();

        let mut stopped = Vec::with_capacity(stale.len());
        for id in stale {
            // a client may have stopped it in between
            if let Ok(snapshot) = self.stop(id).await {
                tracing::info!(
                    session_id = %id,
                    frames = snapshot.stats.frames,
                    idle_secs = max_idle.as_secs(),
                    "Idle live session reclaimed"
                );
                stopped.push(id);
            }
        }
        stopped
    }

    pub async fn stop_all(&self) {
        let drained: Vec<(Uuid, Arc<LiveSession>)> = self.sessions.write().await.drain().collect();
        for (id, session) in drained {
            session.stop.stop();
            tracing::info!(session_id = %id, "Live session stopped on shutdown");
        }
    }
}
