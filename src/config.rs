use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CONSEC_FRAMES, DEFAULT_EAR_THRESHOLD, DEFAULT_FRAME_QUEUE_DEPTH,
    DEFAULT_MAX_REPLAY_FRAMES, DEFAULT_MAX_SESSIONS, DEFAULT_MAX_SSE_CONNECTIONS,
    DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
};
use crate::detection::EstimatorConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub detection: DetectionConfig,
    pub alarm: AlarmConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    pub ear_threshold: f64,
    pub consec_frames: u32,
}

#[derive(Debug, Clone)]
pub struct AlarmConfig {
    pub enabled: bool,
    pub sound_path: Option<String>,
    pub player_command: String,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_sessions: usize,
    pub max_sse_connections: usize,
    pub max_replay_frames: usize,
    pub frame_queue_depth: usize,
    /// 0 disables idle reclaiming
    pub session_idle_timeout_secs: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            consec_frames: DEFAULT_CONSEC_FRAMES,
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound_path: None,
            player_command: "paplay".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_sse_connections: DEFAULT_MAX_SSE_CONNECTIONS,
            max_replay_frames: DEFAULT_MAX_REPLAY_FRAMES,
            frame_queue_depth: DEFAULT_FRAME_QUEUE_DEPTH,
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
        }
    }
}

impl DetectionConfig {
    /// Estimator parameters for a new session, falling back to the built-in
    /// defaults when the configured pair is invalid.
    pub fn estimator_config(&self) -> EstimatorConfig {
        match EstimatorConfig::new(self.ear_threshold, self.consec_frames) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid detection config, using defaults");
                EstimatorConfig::default()
            }
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            detection: DetectionConfig {
                ear_threshold: env_or_parse("EAR_THRESHOLD", DEFAULT_EAR_THRESHOLD),
                consec_frames: env_or_parse("CONSEC_FRAMES", DEFAULT_CONSEC_FRAMES),
            },
            alarm: AlarmConfig {
                enabled: env_or_bool("ALARM_ENABLED", true),
                sound_path: env_opt("ALARM_SOUND_PATH"),
                player_command: env_or("ALARM_PLAYER", "paplay"),
            },
            limits: LimitsConfig {
                max_sessions: env_or_parse("MAX_SESSIONS", DEFAULT_MAX_SESSIONS),
                max_sse_connections: env_or_parse(
                    "MAX_SSE_CONNECTIONS",
                    DEFAULT_MAX_SSE_CONNECTIONS,
                ),
                max_replay_frames: env_or_parse("MAX_REPLAY_FRAMES", DEFAULT_MAX_REPLAY_FRAMES),
                frame_queue_depth: env_or_parse("FRAME_QUEUE_DEPTH", DEFAULT_FRAME_QUEUE_DEPTH)
                    .max(1),
                session_idle_timeout_secs: env_or_parse(
                    "SESSION_IDLE_TIMEOUT_SECS",
                    DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
                ),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
