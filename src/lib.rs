//! Borgdrone Library
//!
//! This library resolves declared backup targets into borg invocations and
//! supervises borg as a child process.

pub mod config;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, resolve_targets, Config, Target, TargetSpec};
pub use managers::logging::{init_logging, LogGuard, Logger, LoggingConfig, TracingLogger};
pub use managers::target::{exit_code_for, BatchSummary, OutputFormat, TargetManager};
