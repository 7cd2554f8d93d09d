//! Background maintenance tasks. Each runs on a fixed tick until shutdown.

pub mod session_cleanup;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::LimitsConfig;
use crate::constants::SESSION_SWEEP_INTERVAL_SECS;
use crate::sessions::SessionRegistry;

/// Idle limit and sweep period for live sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSchedule {
    pub max_idle: Duration,
    pub every: Duration,
}

impl CleanupSchedule {
    /// `None` when idle reclaiming is disabled (`SESSION_IDLE_TIMEOUT_SECS=0`).
    /// The sweep runs at least twice per idle period.
    pub fn from_limits(limits: &LimitsConfig) -> Option<Self> {
        if limits.session_idle_timeout_secs == 0 {
            return None;
        }
        let max_idle = Duration::from_secs(limits.session_idle_timeout_secs);
        let every = (max_idle / 2)
            .min(Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS))
            .max(Duration::from_secs(1));
        Some(Self { max_idle, every })
    }
}

pub fn spawn_session_cleanup(
    registry: Arc<SessionRegistry>,
    schedule: CleanupSchedule,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(schedule.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            max_idle_secs = schedule.max_idle.as_secs(),
            every_secs = schedule.every.as_secs(),
            "Session cleanup worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => session_cleanup::run(&registry, schedule.max_idle).await,
                _ = shutdown_rx.recv() => break,
            }
        }
        tracing::info!("Session cleanup worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{EstimatorConfig, EyeLayout};

    #[test]
    fn schedule_follows_limits() {
        let limits = |secs| LimitsConfig {
            session_idle_timeout_secs: secs,
            ..LimitsConfig::default()
        };
        assert!(CleanupSchedule::from_limits(&limits(0)).is_none());

        let schedule = CleanupSchedule::from_limits(&limits(300)).unwrap();
        assert_eq!(schedule.max_idle, Duration::from_secs(300));
        assert_eq!(schedule.every, Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS));

        let schedule = CleanupSchedule::from_limits(&limits(1)).unwrap();
        assert_eq!(schedule.every, Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn worker_reclaims_abandoned_sessions_and_stops_on_shutdown() {
        let registry = Arc::new(SessionRegistry::new(None, 1, 4));
        registry
            .create(EstimatorConfig::default(), EyeLayout::default())
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_session_cleanup(
            registry.clone(),
            CleanupSchedule {
                max_idle: Duration::from_millis(50),
                every: Duration::from_millis(20),
            },
            shutdown_rx,
        );

        let mut reclaimed = false;
        for _ in 0..100 {
            if registry.is_empty().await {
                reclaimed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reclaimed, "idle session was never reclaimed");

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker exits on shutdown")
            .unwrap();
    }
}
