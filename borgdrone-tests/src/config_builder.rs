//! Fluent API for building test configurations
//!
//! Builds the raw document, so every built configuration goes through the
//! same YAML parsing and validation as a real one.

use borgdrone::config::{
    parse_config, ArchiveDecl, Config, ConfigFile, PruneOptions, SshStoreDecl, TargetDecl,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    document: ConfigFile,
}

impl ConfigBuilder {
    /// Create an empty configuration backed by a fresh temp dir
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            document: ConfigFile::default(),
        }
    }

    /// One filesystem store `local`, one archive `docs` and target `docs:local`
    pub fn minimal() -> Self {
        let builder = Self::new();
        let backup_path = builder.temp_dir.path().join("backups");
        let data_path = builder.temp_dir.path().join("data");
        fs::create_dir_all(&backup_path).expect("Failed to create backup dir");
        fs::create_dir_all(&data_path).expect("Failed to create data dir");

        builder
            .add_filesystem_store("local", &backup_path)
            .add_archive("docs", vec![data_path.display().to_string()], vec![])
            .add_target("docs", "local")
    }

    pub fn add_filesystem_store(mut self, name: &str, path: &Path) -> Self {
        self.document
            .stores
            .filesystem
            .insert(name.to_string(), path.to_path_buf());
        self
    }

    /// Add an SSH store with the given hostname and remote path
    pub fn add_ssh_store(self, name: &str, hostname: &str, path: Option<&str>) -> Self {
        self.add_ssh_store_decl(
            name,
            SshStoreDecl {
                hostname: hostname.to_string(),
                path: path.map(str::to_string),
                ..SshStoreDecl::default()
            },
        )
    }

    pub fn add_ssh_store_decl(mut self, name: &str, store: SshStoreDecl) -> Self {
        self.document.stores.ssh.insert(name.to_string(), store);
        self
    }

    pub fn add_archive(mut self, name: &str, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.document
            .archives
            .insert(name.to_string(), ArchiveDecl { include, exclude });
        self
    }

    /// Add a target with default options
    pub fn add_target(self, archive: &str, store: &str) -> Self {
        self.add_target_decl(TargetDecl {
            archive: archive.to_string(),
            store: store.to_string(),
            ..TargetDecl::default()
        })
    }

    /// Add a target with retention counts, compaction and an rclone upload path
    pub fn add_maintained_target(
        self,
        archive: &str,
        store: &str,
        prune: PruneOptions,
        upload_path: Option<&str>,
    ) -> Self {
        self.add_target_decl(TargetDecl {
            archive: archive.to_string(),
            store: store.to_string(),
            compact: true,
            prune,
            rclone_upload_path: upload_path.map(str::to_string),
            ..TargetDecl::default()
        })
    }

    pub fn add_target_decl(mut self, target: TargetDecl) -> Self {
        self.document.targets.push(target);
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Per-user configuration root used by built contexts
    pub fn config_root(&self) -> PathBuf {
        self.temp_dir.path().join("config")
    }

    pub fn document(&self) -> &ConfigFile {
        &self.document
    }

    /// Serialise the document as it would appear on disk
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.document).expect("Failed to serialise config")
    }

    /// Parse and validate the document
    pub fn build(self) -> Config {
        parse_config(&self.to_yaml()).expect("Built config should be valid")
    }

    /// Write the document to `<temp>/borgdrone.yml`, returning the path and the
    /// temp dir that owns it
    pub fn persist(self) -> (PathBuf, TempDir) {
        let path = self.temp_dir.path().join("borgdrone.yml");
        fs::write(&path, self.to_yaml()).expect("Failed to write config file");
        (path, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
