use std::net::SocketAddr;

use axum::http::{header, HeaderValue};
use drowsiness_guard::alarm::AlarmDispatcher;
use drowsiness_guard::config::Config;
use drowsiness_guard::logging::{init_tracing, LogConfig};
use drowsiness_guard::routes::build_router;
use drowsiness_guard::state::AppState;
use drowsiness_guard::workers::{spawn_session_cleanup, CleanupSchedule};
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!(
        ear_threshold = config.detection.ear_threshold,
        consec_frames = config.detection.consec_frames,
        "Starting drowsiness-guard"
    );

    // audio problems degrade to log-only alerts, never abort startup
    let alarm = if config.alarm.enabled {
        match AlarmDispatcher::from_config(&config.alarm) {
            Ok(dispatcher) => Some(dispatcher),
            Err(e) => {
                tracing::error!(error = %e, "Alarm unavailable, alerts will not be played");
                None
            }
        }
    } else {
        tracing::info!("Alarm disabled by configuration");
        None
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(&config, alarm, shutdown_tx.clone());

    let cleanup = match CleanupSchedule::from_limits(&config.limits) {
        Some(schedule) => Some(spawn_session_cleanup(
            state.sessions_handle(),
            schedule,
            shutdown_tx.subscribe(),
        )),
        None => {
            tracing::info!("Idle session reclaiming disabled");
            None
        }
    };

    let app = build_router(state.clone())
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    let server_future = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));

    if let Err(e) = server_future.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    if let Some(handle) = cleanup {
        // the server can also exit without a signal
        let _ = state.shutdown_tx().send(());
        let _ = handle.await;
    }
    state.sessions().stop_all().await;
    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origin.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any);
    }

    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any),
        Err(e) => {
            panic!(
                "FATAL: Invalid CORS_ORIGIN '{}': {}. \
                 Fix the CORS_ORIGIN environment variable.",
                config.cors_origin, e
            );
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
