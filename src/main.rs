// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gridsync::app_config::{Config, ConflictPolicy, LogLevel};
use gridsync::commands::{CommandSurface, SyncCommands};
use gridsync::model::{Operation, SyncReport};
use gridsync::text_source::JsonTextSource;
use gridsync::SyncSettings;

/// CLI Wrapper for ConflictPolicy to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliConflictPolicy {
    RemoteWins,
    LocalWins,
    Skip,
}

impl From<CliConflictPolicy> for ConflictPolicy {
    fn from(cli_policy: CliConflictPolicy) -> Self {
        match cli_policy {
            CliConflictPolicy::RemoteWins => ConflictPolicy::RemoteWins,
            CliConflictPolicy::LocalWins => ConflictPolicy::LocalWins,
            CliConflictPolicy::Skip => ConflictPolicy::Skip,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring remote changes into the local store
    Pull(SyncArgs),

    /// Send local changes to the grid
    Push(SyncArgs),

    /// Show what pull and push would do, without writing anything
    Status(SyncArgs),

    /// Check that the configured view is reachable
    Check(SyncArgs),

    /// Export one culture of the local store as a Portable Object file
    ExportPo(ExportPoArgs),

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completions for gridsync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
struct SyncArgs {
    /// Project identifier
    #[arg(long)]
    project: Option<String>,

    /// View identifier
    #[arg(long)]
    view: Option<String>,

    /// View pull and status read from (repeatable, merged in order)
    #[arg(long = "import-view", value_name = "VIEW")]
    import_views: Vec<String>,

    /// Push only source texts, leaving translation columns alone
    #[arg(long)]
    source_only: bool,

    /// How pull resolves entries changed on both sides
    #[arg(long, value_enum)]
    policy: Option<CliConflictPolicy>,

    /// Restrict the sync to a culture (repeatable)
    #[arg(long = "culture", value_name = "CULTURE")]
    cultures: Vec<String>,

    /// Records per upsert request (1-1000)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Local JSON store
    #[arg(long, value_name = "PATH")]
    local: Option<PathBuf>,

    /// API key for the grid service
    #[arg(long, env = "GRIDSYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ExportPoArgs {
    /// Culture to export, e.g. fr-FR
    #[arg(long)]
    culture: String,

    /// Output .po file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Local JSON store
    #[arg(long, value_name = "PATH")]
    local: Option<PathBuf>,
}

/// gridsync - localization sync for content grids
///
/// Keeps a local store of localization entries in sync with a remote content
/// grid, one record per text key and one column per culture.
#[derive(Parser, Debug)]
#[command(name = "gridsync")]
#[command(version)]
#[command(about = "Synchronize localized text with a content-grid service")]
#[command(long_about = "gridsync pulls and pushes localized text between a local JSON store and a content-grid view.

EXAMPLES:
    gridsync init                                  # Write gridsync.json with defaults
    gridsync status                                # Dry run: what would change
    gridsync pull --policy local-wins              # Keep local edits on conflict
    gridsync push --culture fr-FR --culture de-DE  # Push two cultures only
    gridsync push --source-only                    # Push source texts only
    gridsync pull --import-view v1 --import-view v2  # Merge two views
    gridsync pull --json > report.json             # Machine readable report
    gridsync export-po --culture fr-FR -o fr.po    # Export one culture for translators
    gridsync completions bash > gridsync.bash      # Generate bash completions

CONFIGURATION:
    Configuration is read from gridsync.json in the current directory, then from
    the user configuration directory. Flags override the file; the API key can
    also come from GRIDSYNC_API_KEY.

EXIT CODES:
    0  success
    2  partial failure (some entries failed, or the run was interrupted)
    1  fatal error")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Colored stderr logger
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and label for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level.max(log::max_level())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, label) = Self::style_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, label, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Start at info; the config or --log-level may change it later
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();
    if let Some(level) = &cli.log_level {
        log::set_max_level(LogLevel::from(level.clone()).to_level_filter());
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: CommandLineOptions) -> Result<i32> {
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "gridsync", &mut std::io::stdout());
            Ok(0)
        }
        Commands::Init { force } => {
            let path = config_path.unwrap_or_else(|| PathBuf::from(gridsync::app_config::DEFAULT_CONFIG_FILE));
            if path.exists() && !force {
                return Err(anyhow!("Config file already exists: {} (use --force to overwrite)", path.display()));
            }
            Config::default().save(&path)?;
            info!("Wrote default configuration to {}", path.display());
            Ok(0)
        }
        Commands::ExportPo(args) => {
            let mut config = load_config(config_path.as_deref(), cli.log_level.is_none())?;
            if let Some(local) = &args.local {
                config.local_path = local.to_string_lossy().into_owned();
            }
            let source = JsonTextSource::new(&config.local_path);
            let written = gridsync::po::export_from_source(&source, &args.culture, &args.output)
                .await
                .context("PO export failed")?;
            info!("Wrote {} messages to {}", written, args.output.display());
            Ok(0)
        }
        Commands::Check(args) => {
            let settings = build_settings(config_path.as_deref(), &args, cli.log_level.is_none())?;
            CommandSurface::new()
                .check_connection(&settings)
                .await
                .context("Connection check failed")?;
            info!("View {} is reachable", settings.view_id());
            Ok(0)
        }
        Commands::Pull(args) => run_sync(Operation::Pull, config_path.as_deref(), &args, cli.log_level.is_none()).await,
        Commands::Push(args) => run_sync(Operation::Push, config_path.as_deref(), &args, cli.log_level.is_none()).await,
        Commands::Status(args) => run_sync(Operation::Status, config_path.as_deref(), &args, cli.log_level.is_none()).await,
    }
}

/// Load the config file, or defaults when no file exists and none was named
fn load_config(path: Option<&Path>, apply_log_level: bool) -> Result<Config> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            Config::from_file(path)?
        }
        None => {
            let path = Config::default_path();
            if path.exists() {
                Config::from_file(&path)?
            } else {
                warn!("No config file found at '{}', using defaults and flags", path.display());
                Config::default()
            }
        }
    };

    // --log-level wins over the file
    if apply_log_level {
        log::set_max_level(config.log_level.to_level_filter());
    }
    Ok(config)
}

fn build_settings(path: Option<&Path>, args: &SyncArgs, apply_log_level: bool) -> Result<SyncSettings> {
    let mut config = load_config(path, apply_log_level)?;

    // Override config with CLI options if provided
    if let Some(project) = &args.project {
        config.project_id = project.clone();
    }
    if let Some(view) = &args.view {
        config.view_id = view.clone();
    }
    if !args.import_views.is_empty() {
        config.import_view_ids = args.import_views.clone();
    }
    if args.source_only {
        config.include_targets = false;
    }
    if let Some(policy) = &args.policy {
        config.conflict_policy = policy.clone().into();
    }
    if !args.cultures.is_empty() {
        config.cultures = args.cultures.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(local) = &args.local {
        config.local_path = local.to_string_lossy().into_owned();
    }
    if let Some(api_key) = &args.api_key {
        config.api_key = api_key.clone();
    }

    SyncSettings::from_config(&config).context("Configuration validation failed")
}

async fn run_sync(operation: Operation, path: Option<&Path>, args: &SyncArgs, apply_log_level: bool) -> Result<i32> {
    let settings = build_settings(path, args, apply_log_level)?;

    // Stdout carries the JSON report in --json mode, keep the terminal quiet
    let progress_bar = if args.json { ProgressBar::hidden() } else { ProgressBar::new(0) };
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("=>-"));
    progress_bar.set_message(match operation {
        Operation::Push => "batches",
        _ => "pages",
    });

    let bar = progress_bar.clone();
    let surface = CommandSurface::new().with_progress(Arc::new(move |done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    }));

    let cancel = surface.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next page or batch boundary");
            cancel.cancel();
        }
    });

    let report = surface.run(operation, &settings).await;
    progress_bar.finish_and_clear();

    print_report(&report, args.json)?;
    Ok(report.exit_code())
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    let mut stdout = std::io::stdout();
    if json {
        let body = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        writeln!(stdout, "{}", body)?;
    } else {
        write!(stdout, "{}", report)?;
    }
    stdout.flush()?;
    Ok(())
}
