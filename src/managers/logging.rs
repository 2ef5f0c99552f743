//! Logging setup and the logging collaborator handed to runners and managers
//!
//! Provides dual-output logging:
//! - Console: INFO level (DEBUG with `--verbose`), concise format on stderr
//! - File: optional, DEBUG level with daily rotation

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "borgdrone";

/// Sink for operational messages and child process output.
///
/// Components receive a logger instead of reaching for global state, so
/// tests can substitute [`mock::CapturingLogger`].
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Echo a child's stderr line to the user unchanged
    fn echo_stderr(&self, line: &str);
}

/// Default logger forwarding to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn echo_stderr(&self, line: &str) {
        eprintln!("{}", line);
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Console log level
    pub console_level: Level,
    /// Directory for log files (file logging disabled when unset)
    pub log_directory: Option<PathBuf>,
    /// Maximum number of log files to keep
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: Level::INFO,
            log_directory: None,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    /// Create from command line flags
    pub fn from_cli(verbose: bool, log_directory: Option<&Path>) -> Self {
        Self {
            console_level: if verbose { Level::DEBUG } else { Level::INFO },
            log_directory: log_directory.map(Path::to_path_buf),
            ..Self::default()
        }
    }
}

/// Initialize logging with console and optional file outputs
///
/// Returns a guard that must be kept alive for the duration of the program.
/// When the guard is dropped, any remaining logs are flushed to disk.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .without_time()
        .with_span_events(FmtSpan::NONE)
        .with_filter(level_filter(config.console_level));

    let (file_layer, file_guard) = match &config.log_directory {
        Some(dir) => {
            let log_dir = crate::config::expand_tilde(dir);
            fs::create_dir_all(&log_dir)
                .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

            let file_appender = RollingFileAppender::new(
                Rotation::DAILY,
                &log_dir,
                format!("{}.log", LOG_FILE_PREFIX),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_span_events(FmtSpan::NONE)
                .with_filter(level_filter(Level::DEBUG));

            cleanup_old_logs(&log_dir, config.max_files)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Create a level filter for tracing layers
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Cleanup old log files, keeping only the most recent N files
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(LOG_FILE_PREFIX)
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    for file in log_files.into_iter().skip(max_files as usize) {
        if let Err(e) = fs::remove_file(file.path()) {
            tracing::warn!("Failed to remove old log file {:?}: {}", file.path(), e);
        } else {
            tracing::debug!("Removed old log file: {:?}", file.path());
        }
    }

    Ok(())
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any remaining logs to disk.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Capturing logger for tests
/// Available for use in external test crates
pub mod mock {
    use super::Logger;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogLevel {
        Debug,
        Info,
        Warn,
        Error,
        Stderr,
    }

    /// Records every message instead of printing it
    #[derive(Clone, Default)]
    pub struct CapturingLogger {
        entries: Arc<Mutex<Vec<(LogLevel, String)>>>,
    }

    impl CapturingLogger {
        pub fn new() -> Self {
            Self::default()
        }

        /// All recorded entries in arrival order
        pub fn entries(&self) -> Vec<(LogLevel, String)> {
            self.entries.lock().unwrap().clone()
        }

        /// Messages recorded at one level
        pub fn messages(&self, level: LogLevel) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }

        /// Whether any message at any level contains `needle`
        pub fn contains(&self, needle: &str) -> bool {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .any(|(_, m)| m.contains(needle))
        }

        fn record(&self, level: LogLevel, message: &str) {
            self.entries
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }

    impl Logger for CapturingLogger {
        fn debug(&self, message: &str) {
            self.record(LogLevel::Debug, message);
        }

        fn info(&self, message: &str) {
            self.record(LogLevel::Info, message);
        }

        fn warn(&self, message: &str) {
            self.record(LogLevel::Warn, message);
        }

        fn error(&self, message: &str) {
            self.record(LogLevel::Error, message);
        }

        fn echo_stderr(&self, line: &str) {
            self.record(LogLevel::Stderr, line);
        }
    }
}
