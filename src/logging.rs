use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "drowsiness-guard";
const MAX_LOG_FILES: usize = 14;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

impl From<&Config> for LogConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            enable_file_logs: config.enable_file_logs,
            log_dir: config.log_dir.clone(),
        }
    }
}

/// Install the global subscriber. Safe to call more than once.
///
/// Frame loops run on the blocking pool, so thread names are included to
/// tell sessions apart in plain-text output.
pub fn init_tracing(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = fmt::layer().with_target(true).with_thread_names(true);

    let registry = Registry::default().with(env_filter).with(stdout_layer);

    let result = if config.enable_file_logs {
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .max_log_files(MAX_LOG_FILES)
            .build(&config.log_dir)
        {
            Ok(appender) => {
                let file_layer = fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .json();
                registry.with(file_layer).try_init()
            }
            Err(e) => {
                eprintln!(
                    "log directory {} unusable ({e}), logging to stdout only",
                    config.log_dir
                );
                registry.try_init()
            }
        }
    } else {
        registry.try_init()
    };

    // already set is expected under tests
    if let Err(e) = result {
        let msg = e.to_string();
        if !msg.contains("already been set") {
            panic!("Failed to initialize tracing: {e}");
        }
    }
}
