//! Repository addresses and the borg environment for a target
//!
//! Both are pure functions of the resolved target; malformed stores are
//! rejected when the configuration is loaded.

use crate::config::{SshStore, StoreKind, Target};
use std::path::Path;

pub const RELOCATED_REPO_ACCESS_VAR: &str = "BORG_RELOCATED_REPO_ACCESS_IS_OK";
pub const PASSCOMMAND_VAR: &str = "BORG_PASSCOMMAND";
pub const REPO_VAR: &str = "BORG_REPO";
pub const RSH_VAR: &str = "BORG_RSH";

const RSH_BASE: &str = "ssh -o VisualHostKey=no";

/// Repository address usable by borg.
///
/// Local stores yield `<path>/<archive>`; SSH stores yield
/// `ssh://[user@]host:port/<path>` with the path forced relative.
pub fn repository_address(target: &Target) -> String {
    match &target.store.kind {
        StoreKind::Local { path } => path.join(target.archive_name()).display().to_string(),
        StoreKind::Ssh(ssh) => ssh_url(ssh),
    }
}

fn ssh_url(store: &SshStore) -> String {
    let user = match &store.username {
        Some(name) => format!("{}@", name),
        None => String::new(),
    };
    format!(
        "ssh://{}{}:{}/{}",
        user,
        store.hostname,
        store.port,
        relative_repo_path(store.path.as_deref().unwrap_or(""))
    )
}

/// `./`-prefix a remote path unless it already starts with `.`.
///
/// Borg resolves a bare suffix against the SSH user's home and a `./` suffix
/// against the connection's working directory.
fn relative_repo_path(path: &str) -> String {
    if path.starts_with('.') {
        path.to_string()
    } else {
        format!("./{}", path.trim_start_matches('/'))
    }
}

/// Quote `word` for the shlex splitting borg applies to command variables.
///
/// Words made only of safe characters are returned as-is.
fn shell_quote(word: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c);
    if !word.is_empty() && word.chars().all(safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\"'\"'"))
}

/// Ordered environment for a borg invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BorgEnv {
    vars: Vec<(String, String)>,
}

impl BorgEnv {
    /// Build the environment for `target`, reading the password from `password_file`
    pub fn for_target(target: &Target, password_file: &Path) -> Self {
        let mut env = Self::default();
        env.add(RELOCATED_REPO_ACCESS_VAR, "yes");
        env.add(
            PASSCOMMAND_VAR,
            format!("cat {}", shell_quote(&password_file.display().to_string())),
        );
        env.add(REPO_VAR, repository_address(target));

        if let StoreKind::Ssh(ssh) = &target.store.kind {
            let mut rsh = RSH_BASE.to_string();
            if let Some(key) = &ssh.ssh_key {
                rsh.push_str(&format!(" -i {}", shell_quote(&key.display().to_string())));
            }
            env.add(RSH_VAR, rsh);
        }

        env
    }

    /// Add custom environment variable
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.push((key.into(), value.into()));
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `KEY=VALUE` strings in insertion order
    pub fn to_strings(&self) -> Vec<String> {
        self.vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}
