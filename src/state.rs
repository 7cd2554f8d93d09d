use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::alarm::AlarmDispatcher;
use crate::config::Config;
use crate::detection::EstimatorConfig;
use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionRegistry>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    /// `alarm` is `None` when alarms are disabled; rising edges are then
    /// only reported, never played.
    pub fn new(
        config: &Config,
        alarm: Option<AlarmDispatcher>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            alarm,
            config.limits.max_sessions,
            config.limits.frame_queue_depth,
        ));

        Self {
            sessions,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn sessions_handle(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub fn alarm(&self) -> Option<&AlarmDispatcher> {
        self.sessions.alarm()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Estimator parameters for a new session, with per-request overrides.
    pub fn estimator_config(
        &self,
        ear_threshold: Option<f64>,
        consec_frames: Option<u32>,
    ) -> Result<EstimatorConfig, crate::detection::DetectionError> {
        let defaults = self.config.detection.estimator_config();
        EstimatorConfig::new(
            ear_threshold.unwrap_or(defaults.ear_threshold()),
            consec_frames.unwrap_or(defaults.consec_frames()),
        )
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let (tx, _) = broadcast::channel(4);
        AppState::new(&Config::from_env(), None, tx)
    }

    #[tokio::test]
    async fn overrides_apply_on_top_of_defaults() {
        let state = state();
        let cfg = state.estimator_config(Some(0.3), None).unwrap();
        assert_eq!(cfg.ear_threshold(), 0.3);
        assert_eq!(
            cfg.consec_frames(),
            state.config().detection.estimator_config().consec_frames()
        );
        assert!(state.estimator_config(None, Some(0)).is_err());
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let state = state();
        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        state.shutdown_tx().send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }
}
