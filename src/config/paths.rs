//! Per-user and per-target filesystem locations
//!
//! Everything borgdrone keeps on disk lives under one configuration root,
//! `$XDG_CONFIG_HOME/borg_drone` on Linux:
//!
//! ```text
//! borg_drone/
//! ├── borgdrone.yml
//! └── <archive>_<store>/
//!     ├── passwd
//!     ├── keyfile.bin
//!     ├── keyfile.txt
//!     └── .initialised
//! ```

use super::types::Target;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "borg_drone";
const CONFIG_FILE_NAME: &str = "borgdrone.yml";

/// Get the configuration root directory
pub fn default_config_root() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default location of the configuration document inside a root directory
pub fn default_config_file(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Side-channel files owned by a single target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPaths {
    dir: PathBuf,
}

impl TargetPaths {
    pub fn new(root: &Path, target: &Target) -> Self {
        Self {
            dir: root.join(format!(
                "{}_{}",
                target.archive_name(),
                target.store_name()
            )),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the repository password
    pub fn password_file(&self) -> PathBuf {
        self.dir.join("passwd")
    }

    /// Exported binary key
    pub fn keyfile(&self) -> PathBuf {
        self.dir.join("keyfile.bin")
    }

    /// Exported paper key
    pub fn paper_keyfile(&self) -> PathBuf {
        self.dir.join("keyfile.txt")
    }

    pub fn initialised_marker(&self) -> PathBuf {
        self.dir.join(".initialised")
    }

    /// A target is initialised once its marker file exists
    pub fn is_initialised(&self) -> bool {
        self.initialised_marker().exists()
    }
}
