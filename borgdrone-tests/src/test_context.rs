//! Test context and harness for command testing
//!
//! Owns a temporary directory holding the configuration file and the
//! per-target configuration root.

use crate::config_builder::ConfigBuilder;
use anyhow::Result;
use borgdrone::config::{Config, TargetPaths};
use borgdrone::managers::logging::mock::CapturingLogger;
use borgdrone::managers::target::TargetManager;
use borgdrone::utils::runner::mock::MockRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
    config_file: PathBuf,
    config: Config,
}

impl TestContext {
    /// Create a test context with a minimal configuration
    pub fn with_minimal_config() -> Self {
        Self::from_builder(ConfigBuilder::minimal())
    }

    /// Create a test context from a ConfigBuilder
    pub fn from_builder(builder: ConfigBuilder) -> Self {
        let (config_file, temp_dir) = builder.persist();
        let config = borgdrone::config::load_config(&config_file)
            .expect("Persisted config should load");

        Self {
            temp_dir,
            config_file,
            config,
        }
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Root under which per-target directories are created
    pub fn config_root(&self) -> PathBuf {
        self.temp_dir.path().join("config")
    }

    /// Build a manager over this context, returning handles to its mocks
    pub fn manager(&self, runner: MockRunner) -> (TargetManager, MockRunner, CapturingLogger) {
        let logger = CapturingLogger::new();
        let manager = TargetManager::new(
            self.config.clone(),
            self.config_root(),
            Arc::new(runner.clone()),
            Arc::new(logger.clone()),
        );
        (manager, runner, logger)
    }

    /// Side-channel paths of the named target
    pub fn paths(&self, target: &str) -> TargetPaths {
        let target = self
            .config
            .get(target)
            .unwrap_or_else(|| panic!("Unknown target {}", target));
        TargetPaths::new(&self.config_root(), target)
    }

    /// Create the password file and initialisation marker for a target
    pub fn mark_initialised(&self, target: &str, password: &str) {
        let paths = self.paths(target);
        std::fs::create_dir_all(paths.dir()).expect("Failed to create target dir");
        std::fs::write(paths.password_file(), password).expect("Failed to write password");
        std::fs::write(paths.initialised_marker(), "").expect("Failed to write marker");
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Read a file relative to the temp directory
    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.temp_dir.path().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}
