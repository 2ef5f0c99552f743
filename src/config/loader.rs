use super::expand_tilde;
use super::types::*;
use crate::managers::logging::{Logger, TracingLogger};
use crate::utils::secrets::{self, EnsureOutcome, SecretIoError};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Commented template written when no configuration file exists yet
const DEFAULT_CONFIG: &str = include_str!("default_config.yml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Store name '{0}' is declared more than once")]
    DuplicateStoreName(String),

    #[error("Target '{0}' is declared more than once")]
    DuplicateTargetName(String),

    #[error("{context}: missing required field '{field}'")]
    MissingField { context: String, field: &'static str },

    #[error("Invalid archive reference '{0}'")]
    UnknownArchiveReference(String),

    #[error("Invalid store reference '{0}'")]
    UnknownStoreReference(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Turns a configuration document into a validated [`Config`].
///
/// Validation is fail-fast: the first violation aborts loading and no partial
/// configuration is returned.
pub struct ConfigLoader<'a> {
    logger: &'a dyn Logger,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(logger: &'a dyn Logger) -> Self {
        Self { logger }
    }

    /// Load and validate configuration from a YAML (or JSON) file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();
        self.logger
            .debug(&format!("Reading configuration from {}", path.display()));
        let contents = fs::read_to_string(path)?;
        self.parse(&contents)
    }

    /// Parse and validate a configuration document
    pub fn parse(&self, contents: &str) -> Result<Config> {
        let document: ConfigFile = serde_yaml::from_str(contents)?;
        self.resolve(&document)
    }

    /// Validate a raw document and resolve every target declaration
    pub fn resolve(&self, document: &ConfigFile) -> Result<Config> {
        validate_document(document)?;

        let mut targets = BTreeMap::new();
        for decl in &document.targets {
            let target = resolve_target(decl, document)?;
            if targets.contains_key(&target.name) {
                return Err(ConfigError::DuplicateTargetName(target.name));
            }
            self.logger.debug(&format!("Resolved target {}", target.name));
            targets.insert(target.name.clone(), target);
        }

        self.logger.debug(&format!(
            "Loaded {} store(s), {} archive(s), {} target(s)",
            document.stores.filesystem.len() + document.stores.ssh.len(),
            document.archives.len(),
            targets.len()
        ));

        Ok(Config::new(targets))
    }
}

/// Load and validate configuration, logging through `tracing`
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    ConfigLoader::new(&TracingLogger).load(path)
}

/// Parse and validate a configuration document, logging through `tracing`
pub fn parse_config(contents: &str) -> Result<Config> {
    ConfigLoader::new(&TracingLogger).parse(contents)
}

/// Write the default configuration template unless a file is already there
pub fn write_default_config<P: AsRef<Path>>(
    path: P,
) -> std::result::Result<EnsureOutcome, SecretIoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        secrets::ensure_private_dir(parent)?;
    }
    secrets::ensure_file(path, DEFAULT_CONFIG.as_bytes(), 0o600)
}

/// Check store uniqueness, target references and remote store fields
fn validate_document(document: &ConfigFile) -> Result<()> {
    let stores = &document.stores;

    let mut store_names = HashSet::new();
    for name in stores.filesystem.keys().chain(stores.ssh.keys()) {
        if !store_names.insert(name.as_str()) {
            return Err(ConfigError::DuplicateStoreName(name.clone()));
        }
    }

    for (index, target) in document.targets.iter().enumerate() {
        let context = format!("targets[{}]", index);
        if target.archive.is_empty() {
            return Err(ConfigError::MissingField {
                context,
                field: "archive",
            });
        }
        if target.store.is_empty() {
            return Err(ConfigError::MissingField {
                context,
                field: "store",
            });
        }
        if !document.archives.contains_key(&target.archive) {
            return Err(ConfigError::UnknownArchiveReference(
                target.archive.clone(),
            ));
        }
        if !store_names.contains(target.store.as_str()) {
            return Err(ConfigError::UnknownStoreReference(target.store.clone()));
        }
    }

    for (name, store) in &stores.ssh {
        if store.hostname.is_empty() {
            return Err(ConfigError::MissingField {
                context: format!("stores.ssh.{}", name),
                field: "hostname",
            });
        }
    }

    Ok(())
}

/// Build a target from its declaration, applying defaults
fn resolve_target(decl: &TargetDecl, document: &ConfigFile) -> Result<Target> {
    let archive_decl = document
        .archives
        .get(&decl.archive)
        .ok_or_else(|| ConfigError::UnknownArchiveReference(decl.archive.clone()))?;

    let archive = Archive {
        name: decl.archive.clone(),
        include: archive_decl.include.clone(),
        exclude: archive_decl.exclude.clone(),
    };

    Ok(Target {
        name: Target::label(&decl.archive, &decl.store),
        archive,
        store: resolve_store(&decl.store, document)?,
        encryption: non_empty_or(&decl.encryption, DEFAULT_ENCRYPTION),
        compression: non_empty_or(&decl.compression, DEFAULT_COMPRESSION),
        compact: decl.compact,
        one_file_system: decl.one_file_system,
        prune: decl.prune.clone(),
        rclone_upload_path: decl
            .rclone_upload_path
            .clone()
            .filter(|path| !path.is_empty()),
    })
}

fn resolve_store(name: &str, document: &ConfigFile) -> Result<Store> {
    if let Some(path) = document.stores.filesystem.get(name) {
        return Ok(Store {
            name: name.to_string(),
            kind: StoreKind::Local {
                path: expand_tilde(path),
            },
        });
    }

    if let Some(ssh) = document.stores.ssh.get(name) {
        return Ok(Store {
            name: name.to_string(),
            kind: StoreKind::Ssh(SshStore {
                hostname: ssh.hostname.clone(),
                username: ssh.username.clone().filter(|u| !u.is_empty()),
                port: ssh.port.filter(|p| *p != 0).unwrap_or(DEFAULT_SSH_PORT),
                path: ssh.path.clone().filter(|p| !p.is_empty()),
                ssh_key: ssh
                    .ssh_key
                    .as_deref()
                    .filter(|k| !k.as_os_str().is_empty())
                    .map(expand_tilde),
            }),
        });
    }

    Err(ConfigError::UnknownStoreReference(name.to_string()))
}

fn non_empty_or(value: &Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.clone(),
        _ => default.to_string(),
    }
}
