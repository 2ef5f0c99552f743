//! Per-command orchestration over resolved targets
//!
//! Targets are processed one at a time. Each command documents what happens
//! when a single target fails:
//!
//! | Command      | Not initialised | Non-zero borg exit        | Runner error |
//! |--------------|-----------------|---------------------------|--------------|
//! | `init`       | n/a (skips initialised) | warn, continue    | abort        |
//! | `info`/`list`| warn, skip      | error, continue           | abort        |
//! | `create`     | warn, skip      | error, skip follow-ups    | abort        |
//! | `export-key` | warn, skip      | error, continue           | abort        |
//! | `import-key` | n/a             | error                     | abort        |

use crate::config::{
    expand_tilde, resolve_spec, Config, ConfigError, ResolutionError, Target, TargetPaths,
    TargetSpec,
};
use crate::managers::logging::Logger;
use crate::utils::repository::{repository_address, BorgEnv};
use crate::utils::runner::{
    CommandRunner, ExecutionError, RunOutcome, BORG_EXECUTABLE, RCLONE_EXECUTABLE,
};
use crate::utils::secrets::{
    ensure_file, ensure_private_dir, generate_password, read_secret, EnsureOutcome,
    SecretIoError,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SECRET_MODE: u32 = 0o600;

/// Output format for `list-targets`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Per-target tally of a batch command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Result of `export-key`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Repository password per target name
    pub passwords: BTreeMap<String, String>,
    /// Key files written to the local filesystem
    pub files: Vec<PathBuf>,
    pub summary: BatchSummary,
}

/// Runs borg commands for the targets of one configuration
pub struct TargetManager {
    config: Config,
    config_root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    logger: Arc<dyn Logger>,
}

impl TargetManager {
    pub fn new(
        config: Config,
        config_root: PathBuf,
        runner: Arc<dyn CommandRunner>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            config,
            config_root,
            runner,
            logger,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self, target: &Target) -> TargetPaths {
        TargetPaths::new(&self.config_root, target)
    }

    fn select(&self, spec: &TargetSpec) -> Result<Vec<&Target>, ResolutionError> {
        resolve_spec(&self.config, spec)
    }

    /// Run borg against `target` with its repository environment
    fn run_borg(&self, target: &Target, args: &[String]) -> Result<RunOutcome, ExecutionError> {
        let env = BorgEnv::for_target(target, &self.paths(target).password_file());
        self.runner.run(BORG_EXECUTABLE, env.vars(), args)
    }

    /// [`Self::run_borg`], returning stdout instead of logging it
    fn run_borg_captured(
        &self,
        target: &Target,
        args: &[String],
    ) -> Result<RunOutcome, ExecutionError> {
        let env = BorgEnv::for_target(target, &self.paths(target).password_file());
        self.runner.run_captured(BORG_EXECUTABLE, env.vars(), args)
    }

    fn banner(&self, target: &Target) {
        self.logger.info(&format!("----- {} -----", target.name));
    }

    /// Render every target in `format`
    pub fn list_targets(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self.config.target_map())
                .context("Failed to serialise targets as JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(self.config.target_map())
                .context("Failed to serialise targets as YAML"),
            OutputFormat::Text => {
                let mut out = String::new();
                for target in self.config.targets() {
                    writeln!(out, "{}", target.name)?;
                    writeln!(out, "Include     | {}", target.archive.include.join(", "))?;
                    if !target.archive.exclude.is_empty() {
                        writeln!(out, "Exclude     | {}", target.archive.exclude.join(", "))?;
                    }
                    writeln!(
                        out,
                        "Repository  | {} [{}]",
                        target.store_name(),
                        repository_address(target)
                    )?;
                    writeln!(out)?;
                }
                Ok(out)
            }
        }
    }

    /// Create the password file and borg repository for uninitialised targets
    pub fn initialise(&self, spec: &TargetSpec) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for target in self.select(spec)? {
            let paths = self.paths(target);
            if paths.is_initialised() {
                self.logger
                    .warn(&format!("{} already initialised", target.name));
                summary.skipped += 1;
                continue;
            }

            self.logger.info(&format!("Initialising {}", target.name));
            ensure_private_dir(paths.dir())?;
            if ensure_file(
                &paths.password_file(),
                generate_password().as_bytes(),
                SECRET_MODE,
            )? == EnsureOutcome::AlreadyPresent
            {
                self.logger.debug(&format!(
                    "Keeping existing password file {:?}",
                    paths.password_file()
                ));
            }

            let args = vec![
                "init".to_string(),
                "--encryption".to_string(),
                target.encryption.clone(),
            ];
            let outcome = self.run_borg(target, &args)?;
            if outcome.success {
                ensure_file(&paths.initialised_marker(), b"", SECRET_MODE)?;
                summary.succeeded += 1;
            } else {
                self.logger.warn(&format!(
                    "borg init failed for {} (exit code {})",
                    target.name,
                    describe_exit(&outcome)
                ));
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    /// `borg info` for every initialised target
    pub fn info(&self, spec: &TargetSpec) -> Result<BatchSummary> {
        self.query("info", spec)
    }

    /// `borg list` for every initialised target
    pub fn list(&self, spec: &TargetSpec) -> Result<BatchSummary> {
        self.query("list", spec)
    }

    fn query(&self, subcommand: &str, spec: &TargetSpec) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for target in self.select(spec)? {
            if !self.ensure_initialised(target) {
                summary.skipped += 1;
                continue;
            }

            self.banner(target);
            let outcome = self.run_borg_captured(target, &[subcommand.to_string()])?;
            for line in &outcome.stdout {
                self.logger.info(line);
            }

            if outcome.success {
                summary.succeeded += 1;
            } else {
                self.logger.error(&format!(
                    "borg {} failed for {} (exit code {})",
                    subcommand,
                    target.name,
                    describe_exit(&outcome)
                ));
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    /// Create a new archive for every initialised target, then prune,
    /// compact and upload as configured
    pub fn create(&self, spec: &TargetSpec) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for target in self.select(spec)? {
            if !self.ensure_initialised(target) {
                summary.skipped += 1;
                continue;
            }

            self.banner(target);
            let args = create_args(target);
            self.logger.debug(&format!("borg {}", args.join(" ")));

            let outcome = self.run_borg(target, &args)?;
            if !outcome.success {
                self.logger.error(&format!(
                    "borg create failed for {} (exit code {})",
                    target.name,
                    describe_exit(&outcome)
                ));
                summary.failed += 1;
                continue;
            }

            if self.after_create(target)? {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    /// Prune, compact and upload; false if any step exited non-zero
    fn after_create(&self, target: &Target) -> Result<bool> {
        let mut ok = true;

        if !target.prune.is_empty() {
            let mut args = vec!["prune".to_string()];
            args.extend(target.prune.to_args());
            ok &= self.follow_up(target, "prune", self.run_borg(target, &args)?);
        }

        if target.compact {
            let outcome = self.run_borg(target, &["compact".to_string()])?;
            ok &= self.follow_up(target, "compact", outcome);
        }

        if let Some(upload_path) = &target.rclone_upload_path {
            if target.store.is_remote() {
                self.logger.warn(&format!(
                    "Skipping upload for {}: rclone upload is only supported for filesystem stores",
                    target.name
                ));
            } else {
                let args = vec![
                    "sync".to_string(),
                    repository_address(target),
                    upload_path.clone(),
                ];
                let outcome = self.runner.run(RCLONE_EXECUTABLE, &[], &args)?;
                ok &= self.follow_up(target, "rclone sync", outcome);
            }
        }

        Ok(ok)
    }

    fn follow_up(&self, target: &Target, step: &str, outcome: RunOutcome) -> bool {
        if !outcome.success {
            self.logger.error(&format!(
                "{} failed for {} (exit code {})",
                step,
                target.name,
                describe_exit(&outcome)
            ));
        }
        outcome.success
    }

    /// Export binary and paper keys and collect repository passwords
    pub fn export_key(&self, spec: &TargetSpec) -> Result<ExportReport> {
        let mut report = ExportReport::default();

        for target in self.select(spec)? {
            if !self.ensure_initialised(target) {
                report.summary.skipped += 1;
                continue;
            }

            let paths = self.paths(target);
            let paper = paths.paper_keyfile();
            let key = paths.keyfile();

            let exports = [
                vec![
                    "key".to_string(),
                    "export".to_string(),
                    "--paper".to_string(),
                    "::".to_string(),
                    paper.display().to_string(),
                ],
                vec![
                    "key".to_string(),
                    "export".to_string(),
                    "::".to_string(),
                    key.display().to_string(),
                ],
            ];

            let mut exported = true;
            for args in &exports {
                let outcome = self.run_borg(target, args)?;
                if !outcome.success {
                    self.logger.error(&format!(
                        "borg key export failed for {} (exit code {})",
                        target.name,
                        describe_exit(&outcome)
                    ));
                    exported = false;
                    break;
                }
            }
            if !exported {
                report.summary.failed += 1;
                continue;
            }

            self.logger.debug(&format!("Exported {:?} and {:?}", paper, key));
            let password = read_secret(&paths.password_file())?;
            report.passwords.insert(target.name.clone(), password);
            report.files.push(key);
            report.files.push(paper);
            report.summary.succeeded += 1;
        }

        Ok(report)
    }

    /// Import a key into exactly one target and mark it initialised
    pub fn import_key(
        &self,
        spec: &TargetSpec,
        keyfile: &Path,
        password_file: Option<&Path>,
        paper: bool,
    ) -> Result<()> {
        spec.require_single()?;
        let target = self
            .select(spec)?
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NoMatchingTarget {
                archive: spec.archive.clone(),
                store: spec.store.clone(),
            })?;

        let paths = self.paths(target);
        ensure_private_dir(paths.dir())?;

        match password_file {
            Some(source) => {
                let password = read_secret(source)?;
                let outcome = ensure_file(
                    &paths.password_file(),
                    format!("{}\n", password).as_bytes(),
                    SECRET_MODE,
                )?;
                if outcome == EnsureOutcome::AlreadyPresent {
                    self.logger.warn(&format!(
                        "{} already has a password file, keeping {:?}",
                        target.name,
                        paths.password_file()
                    ));
                }
            }
            None if !paths.password_file().exists() => {
                anyhow::bail!(
                    "No password file for {}; pass --password-file with the repository password",
                    target.name
                );
            }
            None => {}
        }

        let keyfile = expand_tilde(keyfile);
        let mut args = vec!["key".to_string(), "import".to_string()];
        if paper {
            args.push("--paper".to_string());
        }
        args.push("::".to_string());
        args.push(keyfile.display().to_string());

        self.logger
            .info(&format!("Importing {:?} into {}", keyfile, target.name));
        let outcome = self.run_borg(target, &args)?;
        if !outcome.success {
            anyhow::bail!(
                "borg key import failed for {} (exit code {})",
                target.name,
                describe_exit(&outcome)
            );
        }

        ensure_file(&paths.initialised_marker(), b"", SECRET_MODE)?;
        Ok(())
    }

    /// Remove exported key files of every target, returning how many were deleted
    pub fn clean(&self) -> usize {
        let mut removed = 0;

        for target in self.config.targets() {
            let paths = self.paths(target);
            for file in [paths.keyfile(), paths.paper_keyfile()] {
                match fs::remove_file(&file) {
                    Ok(()) => {
                        self.logger.info(&format!("Removed {:?}", file));
                        removed += 1;
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => self
                        .logger
                        .warn(&format!("Failed to remove {:?}: {}", file, e)),
                }
            }
        }

        removed
    }

    fn ensure_initialised(&self, target: &Target) -> bool {
        if self.paths(target).is_initialised() {
            return true;
        }
        self.logger.warn(&format!(
            "target '{}' has not been initialised",
            target.name
        ));
        false
    }
}

/// Arguments for `borg create`, with `~/` expanded in every pattern
pub fn create_args(target: &Target) -> Vec<String> {
    let expand = |pattern: &String| expand_tilde(Path::new(pattern)).display().to_string();

    let mut args = vec![
        "create".to_string(),
        "--stats".to_string(),
        "--compression".to_string(),
        target.compression.clone(),
    ];
    if target.one_file_system {
        args.push("--one-file-system".to_string());
    }
    for pattern in &target.archive.exclude {
        args.push("--exclude".to_string());
        args.push(expand(pattern));
    }
    args.push("::{now}".to_string());
    args.extend(target.archive.include.iter().map(expand));
    args
}

fn describe_exit(outcome: &RunOutcome) -> String {
    match outcome.exit_code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

/// Process exit code for an error escaping a command
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if cause.downcast_ref::<ConfigError>().is_some()
            || cause.downcast_ref::<ResolutionError>().is_some()
        {
            return 1;
        }
        if let Some(e) = cause.downcast_ref::<ExecutionError>() {
            return e.exit_code();
        }
        if cause.downcast_ref::<SecretIoError>().is_some() {
            return 3;
        }
    }
    1
}
