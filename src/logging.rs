use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how the shell logs.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Directory for log files (created if missing)
    pub log_dir: Utf8PathBuf,

    /// File name prefix, the date is appended by the daily rotation
    pub file_prefix: String,

    /// Use `debug` instead of `info` when `RUST_LOG` is not set
    pub debug_mode: bool,

    /// Mirror output to the console with ANSI colors
    pub console_output: bool,
}

impl LoggingOptions {
    pub fn new(log_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            file_prefix: crate::APP_NAME.to_string(),
            debug_mode: false,
            console_output: false,
        }
    }
}

/// Level filter: `RUST_LOG` wins, otherwise the debug flag decides.
fn env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug_mode { "debug" } else { "info" }))
}

/// Setup logging with a daily rotating file appender and optional console output.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
///
/// # Errors
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn setup_logging(options: &LoggingOptions) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    if !options.log_dir.exists() {
        fs::create_dir_all(&options.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", options.log_dir))?;
    }

    let file_appender = rolling::daily(&options.log_dir, &options.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = options.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(options.debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        options.log_dir,
        options.file_prefix,
        options.debug_mode,
        options.console_output
    );

    Ok(guard)
}
