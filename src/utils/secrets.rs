//! Password and marker files with exclusive-create semantics
//!
//! Creating a file that already exists is a no-op: repeated `init` runs must
//! never clobber a repository password.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

const PASSWORD_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretIoError {
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of [`ensure_file`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyPresent,
}

/// Create `path` with `contents` unless it already exists.
///
/// `mode` applies on Unix only. An existing file is left untouched and
/// reported as [`EnsureOutcome::AlreadyPresent`]; any other failure is an error.
/// A file that could not be fully written is removed again, so a later call
/// never mistakes it for a complete one.
pub fn ensure_file(
    path: &Path,
    contents: &[u8],
    mode: u32,
) -> Result<EnsureOutcome, SecretIoError> {
    ensure_file_with(path, mode, |file| {
        file.write_all(contents)?;
        file.sync_all()
    })
}

fn ensure_file_with<F>(path: &Path, mode: u32, write: F) -> Result<EnsureOutcome, SecretIoError>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("{:?} already exists, leaving it untouched", path);
            return Ok(EnsureOutcome::AlreadyPresent);
        }
        Err(source) => {
            return Err(SecretIoError::Create {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if let Err(source) = write(&mut file) {
        drop(file);
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partially written {:?}: {}", path, e);
        }
        return Err(SecretIoError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!("Created {:?}", path);
    Ok(EnsureOutcome::Created)
}

/// Create a directory (and parents) readable only by the owner
pub fn ensure_private_dir(path: &Path) -> Result<(), SecretIoError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);

    builder
        .create(path)
        .map_err(|source| SecretIoError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

/// Random alphanumeric repository password
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Read a secret file, trimming the trailing newline
pub fn read_secret(path: &Path) -> Result<String, SecretIoError> {
    fs::read_to_string(path)
        .map(|s| s.trim_end_matches(['\r', '\n']).to_string())
        .map_err(|source| SecretIoError::Read {
            path: path.to_path_buf(),
            source,
        })
}
