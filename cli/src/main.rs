use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use triplog_core::{FailedItem, FailedSubject, SchemaVersion, StoreError};
use triplog_engine::{
    CurrentSettings, EngineConfig, MigrationEngine, SchemaStatus, VerificationLevel, Verifier,
    read_schema_version, upgrade_history,
};
use triplog_sqlite::{ScriptSource, SqliteStore, script_name};

/// Exit code when verification ran but found problems.
const VERIFY_FAILED_EXIT: i32 = 2;

/// CLI-specific verification level with clap argument parsing support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliLevel {
    Physical,
    MasterData,
    TransactionalData,
}

impl From<CliLevel> for VerificationLevel {
    fn from(level: CliLevel) -> Self {
        match level {
            CliLevel::Physical => Self::Physical,
            CliLevel::MasterData => Self::MasterData,
            CliLevel::TransactionalData => Self::TransactionalData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "triplog-schema", version)]
#[command(about = "Trip logbook schema upgrades and integrity verification")]
struct Cli {
    /// Increase log output (-v info, -vv debug). Without it RUST_LOG applies.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Engine configuration YAML file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the schema version, upgrade history and current selections.
    Status(DbArgs),
    /// Create an empty logbook database at the current schema version.
    Create(DbArgs),
    /// Upgrade a logbook database in place to the current schema version.
    Upgrade(UpgradeArgs),
    /// Copy a logbook database, validate the copy, and upgrade the copy.
    UpgradeCopy(UpgradeCopyArgs),
    /// Verify the integrity of a logbook database.
    Verify(VerifyArgs),
    /// List the migration chain.
    Chain,
}

#[derive(Debug, Args)]
struct DbArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
}

#[derive(Debug, Args)]
struct UpgradeArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Do not write the SQLite user_version stamp.
    #[arg(long)]
    skip_native_pragma: bool,
}

#[derive(Debug, Args)]
struct UpgradeCopyArgs {
    /// Source database file path; never modified.
    #[arg(long)]
    db: PathBuf,
    /// Path of the upgraded copy; must not exist.
    #[arg(long)]
    dest: PathBuf,
    /// Schema version of the source (default: read from the source).
    #[arg(long)]
    from: Option<i32>,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Highest level to verify.
    #[arg(long, default_value = "transactional-data")]
    level: CliLevel,
    /// Stop after this many failures (overrides the config file).
    #[arg(long)]
    max_failures: Option<usize>,
    /// Replace failure descriptions with "?".
    #[arg(long)]
    no_descriptions: bool,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Status(args) => run_status(args, &config).map(|()| 0),
        Command::Create(args) => run_create(args, &config).map(|()| 0),
        Command::Upgrade(args) => run_upgrade(args, &config).map(|()| 0),
        Command::UpgradeCopy(args) => run_upgrade_copy(args, &config).map(|()| 0),
        Command::Verify(args) => {
            run_verify(args, &config).map(|clean| if clean { 0 } else { VERIFY_FAILED_EXIT })
        }
        Command::Chain => run_chain().map(|()| 0),
    });

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn script_source(config: &EngineConfig) -> ScriptSource {
    match &config.migration.scripts_dir {
        Some(dir) => ScriptSource::Directory(dir.clone()),
        None => ScriptSource::Bundled,
    }
}

fn open_store(db: &Path, config: &EngineConfig) -> Result<SqliteStore, String> {
    let store = SqliteStore::open(db)
        .map_err(|e| format!("Failed to open database '{}': {e}", db.display()))?;
    Ok(store.with_scripts(script_source(config)))
}

fn open_existing(db: &Path, config: &EngineConfig) -> Result<SqliteStore, String> {
    if !db.is_file() {
        return Err(format!("Database '{}' does not exist", db.display()));
    }
    open_store(db, config)
}

fn engine() -> Result<MigrationEngine, String> {
    MigrationEngine::standard().map_err(|e| format!("Invalid migration chain: {e}"))
}

// ---------------------------------------------------------------------------
// status / create / upgrade commands
// ---------------------------------------------------------------------------

fn run_status(args: DbArgs, config: &EngineConfig) -> Result<(), String> {
    let store = open_existing(&args.db, config)?;
    let engine = engine()?;
    let version = read_schema_version(&store).map_err(|e| format!("Failed to read schema version: {e}"))?;
    let status = engine
        .schema_status(&store)
        .map_err(|e| format!("Failed to classify schema version: {e}"))?;
    let native = store
        .native_version()
        .map_err(|e| format!("Failed to read native version: {e}"))?;

    println!("Database: {}", args.db.display());
    println!("  Schema version: {} ({})", version.padded(), version.release_label());
    println!("  Native version: {native}");
    println!("  Status: {}", describe_status(status, engine.current_version()));

    if status == SchemaStatus::Current {
        let history = upgrade_history(&store).map_err(|e| format!("Failed to read upgrade history: {e}"))?;
        println!("  Upgrades recorded: {}", history.len());
        for record in &history {
            println!("    {} -> {} at {}", record.from.padded(), record.to.padded(), record.upgraded_at);
        }

        let mut settings = CurrentSettings::new();
        let vehicle = settings
            .vehicle(&store)
            .map_err(|e| format!("Failed to read settings: {e}"))?
            .map(|v| v.nickname.clone().unwrap_or_else(|| format!("#{}", v.id)));
        let driver = settings
            .driver(&store)
            .map_err(|e| format!("Failed to read settings: {e}"))?
            .map(|p| p.name.clone());
        let area = settings
            .area(&store)
            .map_err(|e| format!("Failed to read settings: {e}"))?
            .map(|a| a.name.clone());
        println!("  Current vehicle: {}", vehicle.as_deref().unwrap_or("none"));
        println!("  Current driver: {}", driver.as_deref().unwrap_or("none"));
        println!("  Current area: {}", area.as_deref().unwrap_or("none"));
    }
    Ok(())
}

fn describe_status(status: SchemaStatus, current: SchemaVersion) -> String {
    match status {
        SchemaStatus::Current => "current".to_string(),
        SchemaStatus::UpgradeNeeded(from) => format!("upgrade needed ({from} -> {current})"),
        SchemaStatus::TooOld(v) => format!("too old to upgrade ({v})"),
        SchemaStatus::TooNew(v) => format!("newer than this tool ({v} > {current})"),
        SchemaStatus::Unknown(v) => format!("unknown version {v}"),
    }
}

fn run_create(args: DbArgs, config: &EngineConfig) -> Result<(), String> {
    if args.db.exists() {
        return Err(format!("Database '{}' already exists", args.db.display()));
    }
    let store = open_store(&args.db, config)?;
    let engine = engine()?;
    engine
        .create_current(&store, config.migration.skip_native_version_pragma)
        .map_err(|e| format!("Create failed: {e}"))?;
    println!(
        "Created '{}' at schema version {}.",
        args.db.display(),
        engine.current_version().padded()
    );
    Ok(())
}

fn run_upgrade(args: UpgradeArgs, config: &EngineConfig) -> Result<(), String> {
    let store = open_existing(&args.db, config)?;
    let engine = engine()?;
    let from = read_schema_version(&store).map_err(|e| format!("Failed to read schema version: {e}"))?;
    let skip = args.skip_native_pragma || config.migration.skip_native_version_pragma;
    let report = engine
        .upgrade_to_current(&store, from, skip)
        .map_err(|e| format!("Upgrade failed: {e}"))?;
    if report.is_noop() {
        println!("'{}' is already at schema version {}.", args.db.display(), report.to.padded());
    } else {
        println!("Upgrade complete: {} -> {}", report.from.padded(), report.to.padded());
        println!("  Steps applied: {}", report.steps_applied);
        println!("  Scripts run: {}", report.scripts_run.len());
    }
    Ok(())
}

fn run_upgrade_copy(args: UpgradeCopyArgs, config: &EngineConfig) -> Result<(), String> {
    let from = match args.from {
        Some(v) => SchemaVersion::new(v),
        None => {
            let source = open_existing(&args.db, config)?;
            read_schema_version(&source).map_err(|e| format!("Failed to read source schema version: {e}"))?
        }
    };
    debug!(from = %from, "Source schema version");
    let engine = engine()?;
    let scripts = script_source(config);
    let report = engine
        .upgrade_copy_to_current(&args.db, &args.dest, from, |path| {
            Ok::<_, StoreError>(SqliteStore::open(path)?.with_scripts(scripts))
        })
        .map_err(|e| format!("Upgrade of copy failed: {e}"))?;
    println!(
        "Copied '{}' to '{}' and upgraded {} -> {}.",
        args.db.display(),
        args.dest.display(),
        report.from.padded(),
        report.to.padded()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// verify command
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct VerifyReport<'a> {
    database: String,
    requested: VerificationLevel,
    failed_level: Option<VerificationLevel>,
    highest_completed: Option<VerificationLevel>,
    failures: &'a [FailedItem],
}

/// Returns whether every requested level passed.
fn run_verify(args: VerifyArgs, config: &EngineConfig) -> Result<bool, String> {
    let store = open_existing(&args.db, config)?;
    let mut verify_config = config.verify.clone();
    if let Some(max) = args.max_failures {
        verify_config.max_failure_items = max;
    }
    if args.no_descriptions {
        verify_config.store_descriptions = false;
    }

    let requested = VerificationLevel::from(args.level);
    let mut verifier = Verifier::with_config(&store, &verify_config);
    let failed_level = verifier
        .verify(requested)
        .map_err(|e| format!("Verification failed to run: {e}"))?;
    verifier.release();

    let report = VerifyReport {
        database: args.db.display().to_string(),
        requested,
        failed_level,
        highest_completed: verifier.highest_completed(),
        failures: verifier.failed_items(),
    };
    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("Failed to serialize report: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Text => print_verify_report(&report),
    }
    Ok(failed_level.is_none())
}

fn print_verify_report(report: &VerifyReport<'_>) {
    match report.failed_level {
        None => println!("{}: {} passed", report.database, report.requested),
        Some(level) => {
            println!(
                "{}: {} failed ({} problem{})",
                report.database,
                level,
                report.failures.len(),
                if report.failures.len() == 1 { "" } else { "s" }
            );
            for item in report.failures {
                println!("  {}", format_failure(item));
            }
        }
    }
}

fn format_failure(item: &FailedItem) -> String {
    let subject = match &item.subject {
        FailedSubject::Id { kind, id } => format!("{kind} {id}"),
        FailedSubject::Record(record) => record.to_string(),
        FailedSubject::Database => "database".to_string(),
    };
    match &item.related {
        Some(related) => format!("[{subject}] {} (in {related})", item.description),
        None => format!("[{subject}] {}", item.description),
    }
}

// ---------------------------------------------------------------------------
// chain command
// ---------------------------------------------------------------------------

fn run_chain() -> Result<(), String> {
    let engine = engine()?;
    let chain = engine.chain();
    println!(
        "Migration chain {} -> {} ({} steps):",
        chain.minimum().padded(),
        chain.current().padded(),
        chain.steps().len()
    );
    for step in chain.steps() {
        let action = if step.has_script {
            script_name(step.to)
        } else {
            "(version only)".to_string()
        };
        println!("  {} -> {}  {action}", step.from.padded(), step.to.padded());
    }
    Ok(())
}
