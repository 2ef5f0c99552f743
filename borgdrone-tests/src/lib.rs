//! Test utilities for borgdrone
//!
//! This crate provides shared test utilities, configuration builders,
//! and helper functions for testing the borgdrone application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockRunner, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::minimal());
//!     let (manager, runner, logger) = ctx.manager(MockRunner::new());
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use borgdrone::config::{
    ArchiveDecl, Config, ConfigFile, PruneOptions, SshStoreDecl, Store, StoreKind, Target,
    TargetDecl, TargetPaths, TargetSpec,
};
pub use borgdrone::managers::target::{BatchSummary, OutputFormat, TargetManager};

// Re-export mock implementations from the main crate
pub use borgdrone::managers::logging::mock::{CapturingLogger, LogLevel};
pub use borgdrone::utils::runner::mock::{MockResponse, MockRunner, RunCall};
pub use borgdrone::utils::runner::CommandRunner;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
