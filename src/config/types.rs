use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_ENCRYPTION: &str = "keyfile-blake2";
pub const DEFAULT_COMPRESSION: &str = "lz4";
pub const DEFAULT_SSH_PORT: u16 = 22;

// Raw document structures, as written by the user

/// Root of the configuration document (before validation)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub stores: StoresSection,
    pub archives: BTreeMap<String, ArchiveDecl>,
    pub targets: Vec<TargetDecl>,
}

/// Store declarations, one mapping per store type
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoresSection {
    /// Local stores: name -> base path
    pub filesystem: BTreeMap<String, PathBuf>,

    /// Remote stores reached over SSH
    pub ssh: BTreeMap<String, SshStoreDecl>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SshStoreDecl {
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ArchiveDecl {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetDecl {
    pub archive: String,
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    pub compact: bool,
    pub one_file_system: bool,
    pub prune: PruneOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rclone_upload_path: Option<String>,
}

// Resolved structures

/// Retention counts passed to `borg prune`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PruneOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_daily: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_weekly: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_monthly: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_yearly: Option<u32>,
}

impl PruneOptions {
    /// True when no retention count is configured
    pub fn is_empty(&self) -> bool {
        self.keep_daily.is_none()
            && self.keep_weekly.is_none()
            && self.keep_monthly.is_none()
            && self.keep_yearly.is_none()
    }

    /// `--keep-*` arguments for the counts that are set
    pub fn to_args(&self) -> Vec<String> {
        let counts = [
            ("--keep-daily", self.keep_daily),
            ("--keep-weekly", self.keep_weekly),
            ("--keep-monthly", self.keep_monthly),
            ("--keep-yearly", self.keep_yearly),
        ];

        let mut args = Vec::new();
        for (flag, count) in counts {
            if let Some(count) = count {
                args.push(flag.to_string());
                args.push(count.to_string());
            }
        }
        args
    }
}

/// Named include/exclude file selection policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archive {
    pub name: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// A backup destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Store {
    pub name: String,
    #[serde(flatten)]
    pub kind: StoreKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreKind {
    Local { path: PathBuf },
    Ssh(SshStore),
}

/// Remote store reached through borg's SSH transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshStore {
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
}

impl Store {
    pub fn is_remote(&self) -> bool {
        matches!(self.kind, StoreKind::Ssh(_))
    }
}

/// A fully resolved (archive, store) binding.
///
/// Archive and store are copies of their declarations so a target stays valid
/// independently of the document it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub name: String,
    pub archive: Archive,
    pub store: Store,
    pub encryption: String,
    pub compression: String,
    pub compact: bool,
    pub one_file_system: bool,
    pub prune: PruneOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rclone_upload_path: Option<String>,
}

impl Target {
    /// `<archive>:<store>`, the same form used on the command line
    pub fn label(archive: &str, store: &str) -> String {
        format!("{}:{}", archive, store)
    }

    pub fn archive_name(&self) -> &str {
        &self.archive.name
    }

    pub fn store_name(&self) -> &str {
        &self.store.name
    }
}

/// Validated configuration: every target keyed by its name
#[derive(Debug, Clone, Default)]
pub struct Config {
    targets: BTreeMap<String, Target>,
}

impl Config {
    pub(crate) fn new(targets: BTreeMap<String, Target>) -> Self {
        Self { targets }
    }

    /// Targets in name order
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn target_map(&self) -> &BTreeMap<String, Target> {
        &self.targets
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
