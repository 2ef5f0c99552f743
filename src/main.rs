use anyhow::Result;
use borgdrone::config::{self, TargetSpec};
use borgdrone::managers::logging::{self, Logger, LoggingConfig, TracingLogger};
use borgdrone::managers::target::{exit_code_for, BatchSummary, OutputFormat, TargetManager};
use borgdrone::utils::runner::ProcessRunner;
use borgdrone::utils::secrets::EnsureOutcome;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "borgdrone")]
#[command(about = "Configuration-driven backup orchestration wrapping borg", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to borgdrone.yml in the config root)
    #[arg(short = 'c', long)]
    config_file: Option<PathBuf>,

    /// Enable debug output, including everything borg prints
    #[arg(short, long)]
    verbose: bool,

    /// Also write rotated debug logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured targets
    ListTargets {
        #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Create password files and initialise borg repositories
    Init {
        /// Targets as ARCHIVE:STORE (either side may be empty to match all)
        #[arg(value_name = "ARCHIVE:STORE")]
        target: String,
    },

    /// Show repository information
    Info {
        #[arg(value_name = "ARCHIVE:STORE")]
        target: String,
    },

    /// List archives in each repository
    List {
        #[arg(value_name = "ARCHIVE:STORE")]
        target: String,
    },

    /// Create a new backup archive, then prune, compact and upload
    Create {
        #[arg(value_name = "ARCHIVE:STORE")]
        target: String,
    },

    /// Export repository keys and show their passwords
    ExportKey {
        #[arg(value_name = "ARCHIVE:STORE")]
        target: String,
    },

    /// Import a previously exported key for a single target
    ImportKey {
        /// Target as ARCHIVE:STORE (both required)
        #[arg(value_name = "ARCHIVE:STORE")]
        target: String,

        /// Exported key file
        #[arg(long)]
        keyfile: PathBuf,

        /// File holding the repository password
        #[arg(long)]
        password_file: Option<PathBuf>,

        /// The key file is a paper key
        #[arg(long)]
        paper: bool,
    },

    /// Remove exported key files from the local filesystem
    Clean,
}

fn main() {
    let cli = Cli::parse();

    // Must stay alive until exit so file logs are flushed
    let log_guard = match logging::init_logging(&LoggingConfig::from_cli(
        cli.verbose,
        cli.log_dir.as_deref(),
    )) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {:#}", e);
            None
        }
    };

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            exit_code_for(&e)
        }
    };

    drop(log_guard);
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);

    let config_root = config::default_config_root();
    let config_file = cli
        .config_file
        .map(|path| config::expand_tilde(&path))
        .unwrap_or_else(|| config::default_config_file(&config_root));

    if config::write_default_config(&config_file)? == EnsureOutcome::Created {
        logger.info(&format!("Created default configuration at {:?}", config_file));
    }

    let config = config::ConfigLoader::new(logger.as_ref()).load(&config_file)?;
    let runner = Arc::new(ProcessRunner::new(logger.clone())?);
    let manager = TargetManager::new(config, config_root, runner, logger);

    let summary = match cli.command {
        Commands::ListTargets { format } => {
            print!("{}", manager.list_targets(format)?);
            BatchSummary::default()
        }
        Commands::Init { target } => manager.initialise(&target.parse::<TargetSpec>()?)?,
        Commands::Info { target } => manager.info(&target.parse::<TargetSpec>()?)?,
        Commands::List { target } => manager.list(&target.parse::<TargetSpec>()?)?,
        Commands::Create { target } => manager.create(&target.parse::<TargetSpec>()?)?,
        Commands::ExportKey { target } => {
            let report = manager.export_key(&target.parse::<TargetSpec>()?)?;
            print_export_report(&report);
            report.summary
        }
        Commands::ImportKey {
            target,
            keyfile,
            password_file,
            paper,
        } => {
            let spec: TargetSpec = target.parse()?;
            manager.import_key(&spec, &keyfile, password_file.as_deref(), paper)?;
            println!("✓ Key imported for {}", target);
            BatchSummary::default()
        }
        Commands::Clean => {
            let removed = manager.clean();
            println!("Removed {} exported key file(s)", removed);
            BatchSummary::default()
        }
    };

    if summary.has_failures() {
        tracing::error!(
            "{} target(s) failed, {} succeeded, {} skipped",
            summary.failed,
            summary.succeeded,
            summary.skipped
        );
        return Ok(1);
    }

    Ok(0)
}

fn print_export_report(report: &borgdrone::managers::target::ExportReport) {
    if !report.passwords.is_empty() {
        tracing::warn!("Repository passwords. You should back up these values to a safe location:");
        let width = report.passwords.keys().map(String::len).max().unwrap_or(0);
        for (name, password) in &report.passwords {
            println!("    {:<width$}    {}", name, password, width = width);
        }
        println!();
    }

    if !report.files.is_empty() {
        tracing::warn!("MAKE SURE TO BACKUP THESE FILES, AND THEN REMOVE THEM FROM THE LOCAL FILESYSTEM!");
        tracing::warn!("You can delete these files by running: `borgdrone clean`");
        for file in &report.files {
            println!("    {}", file.display());
        }
        println!();
    }
}
