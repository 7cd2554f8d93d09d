use std::time::Duration;

use crate::sessions::SessionRegistry;

pub async fn run(registry: &SessionRegistry, max_idle: Duration) {
    tracing::debug!("session_cleanup: start");
    let reclaimed = registry.sweep_idle(max_idle).await;
    if reclaimed.is_empty() {
        tracing::debug!("session_cleanup: nothing idle");
    } else {
        tracing::info!(reclaimed = reclaimed.len(), "session_cleanup: done");
    }
}
