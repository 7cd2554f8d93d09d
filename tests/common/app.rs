use axum::Router;
use tokio::sync::broadcast;

use drowsiness_guard::config::{AlarmConfig, Config, DetectionConfig, LimitsConfig};
use drowsiness_guard::routes::build_router;
use drowsiness_guard::state::AppState;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
}

fn test_config(limits: LimitsConfig) -> Config {
    // built directly so parallel tests never race on env vars
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        detection: DetectionConfig::default(),
        alarm: AlarmConfig {
            enabled: false,
            ..AlarmConfig::default()
        },
        limits,
    }
}

pub async fn spawn_with_limits(limits: LimitsConfig) -> TestApp {
    let config = test_config(limits);
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(&config, None, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_limits(LimitsConfig::default()).await
}
