//! Configuration module for borgdrone
//!
//! This module handles loading, validating, and resolving the YAML
//! configuration document into targets.
//!
//! ## Document Sections
//!
//! 1. `stores` - backup destinations (`filesystem` paths and `ssh` hosts)
//! 2. `archives` - named include/exclude file selections
//! 3. `targets` - archive + store bindings with borg options
//!
//! ## Example Usage
//!
//! ```no_run
//! use borgdrone::config;
//!
//! let config = config::load_config("borgdrone.yml")?;
//! for target in config::resolve_targets(&config, "", "usb")? {
//!     println!("Target: {}", target.name);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod loader;
mod paths;
mod resolver;
mod types;

pub use loader::{
    load_config, parse_config, write_default_config, ConfigError, ConfigLoader, Result,
};
pub use paths::{default_config_file, default_config_root, TargetPaths};
pub use resolver::{resolve_spec, resolve_targets, ResolutionError, TargetSpec};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
