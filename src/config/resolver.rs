//! Target selection by `ARCHIVE:STORE` filters

use super::types::{Config, Target};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("No target matches '{archive}:{store}'")]
    NoMatchingTarget { archive: String, store: String },

    #[error("'{0}' does not match [ARCHIVE]:[STORE] format")]
    InvalidTargetSpec(String),

    #[error("'{0}' does not match ARCHIVE:STORE format. Empty values are not allowed.")]
    IncompleteTargetSpec(String),
}

/// `ARCHIVE:STORE` selector from the command line.
///
/// An empty archive or store matches every value for that dimension, so
/// `:usb` selects all archives stored on `usb`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSpec {
    pub archive: String,
    pub store: String,
}

impl TargetSpec {
    pub fn new(archive: impl Into<String>, store: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            store: store.into(),
        }
    }

    /// Selector matching every target
    pub fn all() -> Self {
        Self::default()
    }

    /// True when both dimensions are given, so at most one target can match
    pub fn is_single(&self) -> bool {
        !self.archive.is_empty() && !self.store.is_empty()
    }

    /// Fail unless both dimensions are given
    pub fn require_single(&self) -> Result<&Self, ResolutionError> {
        if self.is_single() {
            Ok(self)
        } else {
            Err(ResolutionError::IncompleteTargetSpec(self.to_string()))
        }
    }

    pub fn matches(&self, target: &Target) -> bool {
        (self.archive.is_empty() || self.archive == target.archive_name())
            && (self.store.is_empty() || self.store == target.store_name())
    }
}

impl FromStr for TargetSpec {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [archive, store] => Ok(Self::new(*archive, *store)),
            _ => Err(ResolutionError::InvalidTargetSpec(s.to_string())),
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.archive, self.store)
    }
}

/// Every target whose archive and store match the filters (empty = any).
///
/// Results come back in target name order.
pub fn resolve_targets<'a>(
    config: &'a Config,
    archive: &str,
    store: &str,
) -> Result<Vec<&'a Target>, ResolutionError> {
    resolve_spec(config, &TargetSpec::new(archive, store))
}

/// [`resolve_targets`] for an already parsed selector
pub fn resolve_spec<'a>(
    config: &'a Config,
    spec: &TargetSpec,
) -> Result<Vec<&'a Target>, ResolutionError> {
    let matches: Vec<&Target> = config.targets().filter(|t| spec.matches(t)).collect();

    if matches.is_empty() {
        return Err(ResolutionError::NoMatchingTarget {
            archive: spec.archive.clone(),
            store: spec.store.clone(),
        });
    }

    Ok(matches)
}
