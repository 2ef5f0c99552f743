pub mod repository;
pub mod runner;
pub mod secrets;

// Re-export commonly used types and traits (used by test crate)
pub use repository::{repository_address, BorgEnv};
pub use runner::{CommandRunner, ExecutionError, ProcessRunner, RunOutcome};
pub use secrets::{ensure_file, EnsureOutcome, SecretIoError};
