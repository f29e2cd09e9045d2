//! Top-level CLI definition and dispatch.
//!
//! Every command that touches lots or vehicles runs as one session: take the
//! state lock, load the saved document, run the request, save if anything
//! changed, then flush the activity logger.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::thread::JoinHandle;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use lot_allocator::core::config::Config;
use lot_allocator::core::errors::{ErrorCategory, LotError};
use lot_allocator::core::kind::Kind;
use lot_allocator::ledger::snapshot::LotStatus;
use lot_allocator::logger::dual::{
    ActivityEvent, ActivityLoggerHandle, DualLoggerConfig, spawn_logger,
};
use lot_allocator::logger::sqlite::SqliteLogger;
use lot_allocator::service::state::{
    DEFAULT_LOCK_WAIT, PersistedState, StateLock, load_state, save_state,
};
use lot_allocator::service::{ParkRequest, ParkingService};

/// Parking lot space allocator.
#[derive(Debug, Parser)]
#[command(
    name = "lota",
    author,
    version,
    about = "Parking lot space allocation and release",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override state file path.
    #[arg(long, global = true, value_name = "PATH")]
    state: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create and inspect lots.
    Lot(LotArgs),
    /// Park a vehicle.
    Park(ParkArgs),
    /// Show how long a vehicle has been parked.
    Vehicle(PlateArgs),
    /// Remove a vehicle and free its spaces.
    Exit(PlateArgs),
    /// Show recent activity.
    History(HistoryArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct LotArgs {
    #[command(subcommand)]
    command: LotCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum LotCommand {
    /// Create a lot. Kinds are listed in space order (1/motorcycle, 2/car, 3/van).
    Create {
        name: String,
        #[arg(value_name = "KIND")]
        kinds: Vec<Kind>,
    },
    /// Show availability for one lot.
    Status { name: String },
    /// List every lot with its availability.
    List,
}

#[derive(Debug, Clone, Args)]
struct ParkArgs {
    /// Vehicle kind (1/motorcycle, 2/car, 3/van).
    #[arg(long, value_name = "KIND")]
    kind: Kind,
    /// Lot name.
    #[arg(long, value_name = "NAME")]
    lot: String,
    /// License plate.
    #[arg(long, value_name = "PLATE")]
    plate: String,
}

#[derive(Debug, Clone, Args)]
struct PlateArgs {
    plate: String,
}

#[derive(Debug, Clone, Args)]
struct HistoryArgs {
    /// Maximum entries to show.
    #[arg(long, default_value_t = 20)]
    limit: u32,
    /// Only entries for this plate.
    #[arg(long, value_name = "PLATE")]
    plate: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print config file path.
    Path,
    /// Print effective config.
    Show,
    /// Validate config.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Rejected or malformed request.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or unreadable data.
    #[error("{0}")]
    Internal(String),
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<LotError> for CliError {
    fn from(err: LotError) -> Self {
        match (&err, err.category()) {
            (_, ErrorCategory::NotFound | ErrorCategory::Rejected)
            | (_, ErrorCategory::Conflict | ErrorCategory::Invalid)
            | (
                LotError::InvalidConfig { .. }
                | LotError::MissingConfig { .. }
                | LotError::ConfigParse { .. },
                _,
            ) => Self::User(err.to_string()),
            (LotError::Serialization { .. } | LotError::CorruptState { .. }, _) => {
                Self::Internal(err.to_string())
            }
            _ => Self::Runtime(err.to_string()),
        }
    }
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Lot(args) => run_lot(cli, args),
        Command::Park(args) => run_park(cli, args),
        Command::Vehicle(args) => run_vehicle(cli, args),
        Command::Exit(args) => run_exit(cli, args),
        Command::History(args) => run_history(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Lot(LotArgs {
            command: LotCommand::Create { .. },
        }) => "lot create",
        Command::Lot(LotArgs {
            command: LotCommand::Status { .. },
        }) => "lot status",
        Command::Lot(LotArgs {
            command: LotCommand::List,
        }) => "lot list",
        Command::Park(_) => "park",
        Command::Vehicle(_) => "vehicle",
        Command::Exit(_) => "exit",
        Command::History(_) => "history",
        Command::Config(_) => "config",
        Command::Completions(_) => "completions",
    }
}

// ──────────────────── session ────────────────────

/// Loaded service plus everything that must be released when a command ends.
struct Session {
    service: ParkingService,
    state_path: PathBuf,
    logger: Option<(ActivityLoggerHandle, JoinHandle<()>)>,
    _lock: StateLock,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let config = load_config(cli)?;
        let state_path = cli
            .state
            .clone()
            .unwrap_or_else(|| config.paths.state_file.clone());
        let lock = StateLock::acquire(&state_path, DEFAULT_LOCK_WAIT)?;

        let logger = match spawn_logger(DualLoggerConfig::from_config(&config)) {
            Ok(pair) => Some(pair),
            Err(e) => {
                eprintln!("[LOT-CLI] activity logging disabled: {e}");
                None
            }
        };

        let mut service = ParkingService::new(&config);
        if let Some((handle, _)) = &logger {
            handle.send(ActivityEvent::SessionStarted {
                version: env!("CARGO_PKG_VERSION").to_string(),
                config_hash: config.stable_hash().unwrap_or_default(),
                command: command_label(&cli.command).to_string(),
            });
            service = service.with_logger(handle.clone());
        }

        if let Some(state) = load_state(&state_path)? {
            state.restore(&service)?;
        }
        if cli.verbose {
            eprintln!(
                "[LOT-CLI] state={} lots={} vehicles={}",
                state_path.display(),
                service.lot_names().len(),
                service.vehicles().len()
            );
        }

        Ok(Self {
            service,
            state_path,
            logger,
            _lock: lock,
        })
    }

    /// Persist the service if `dirty`, then flush the logger.
    fn close(self, dirty: bool) -> Result<(), CliError> {
        let saved = if dirty {
            save_state(&self.state_path, &PersistedState::capture(&self.service))
        } else {
            Ok(())
        };
        if let Some((handle, join)) = self.logger {
            handle.shutdown();
            let _ = join.join();
        }
        saved.map_err(CliError::from)
    }

    /// Close the session whatever `outcome` was; a changed service is saved.
    fn finish<T>(
        self,
        dirty: bool,
        outcome: Result<T, LotError>,
    ) -> Result<T, CliError> {
        let closed = self.close(dirty && outcome.is_ok());
        let value = outcome?;
        closed?;
        Ok(value)
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

// ──────────────────── lot ────────────────────

fn run_lot(cli: &Cli, args: &LotArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let session = Session::open(cli)?;
    match &args.command {
        LotCommand::Create { name, kinds } => {
            let outcome = session.service.create_lot_with_kinds(name, kinds);
            let status = session.finish(true, outcome)?;
            match mode {
                OutputMode::Human => {
                    if !cli.quiet {
                        println!(
                            "{} lot {} with {} spaces",
                            "created".green().bold(),
                            status.name.bold(),
                            kinds.len()
                        );
                        print_status_human(&status);
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "lot create",
                    "lot": status_json(&status),
                    "spaces": kinds.iter().map(|k| k.code()).collect::<Vec<u8>>(),
                }))?,
            }
        }
        LotCommand::Status { name } => {
            let outcome = session.service.lot_status(name);
            let status = session.finish(false, outcome)?;
            match mode {
                OutputMode::Human => print_status_human(&status),
                OutputMode::Json => write_json_line(&json!({
                    "command": "lot status",
                    "lot": status_json(&status),
                }))?,
            }
        }
        LotCommand::List => {
            let outcome = session
                .service
                .lot_names()
                .iter()
                .map(|name| session.service.lot_status(name))
                .collect::<Result<Vec<LotStatus>, LotError>>();
            let statuses = session.finish(false, outcome)?;
            match mode {
                OutputMode::Human => {
                    if statuses.is_empty() {
                        println!("no lots");
                    }
                    for status in &statuses {
                        print_status_human(status);
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "lot list",
                    "lots": statuses.iter().map(status_json).collect::<Vec<Value>>(),
                }))?,
            }
        }
    }
    Ok(())
}

fn status_json(status: &LotStatus) -> Value {
    serde_json::to_value(status).unwrap_or(Value::Null)
}

fn print_status_human(status: &LotStatus) {
    let state = if status.full {
        "FULL".red().bold()
    } else {
        "open".green()
    };
    println!("{} [{state}]", status.name.bold());
    println!("  motorcycle spots free: {}", status.motorcycle_spots_available);
    println!("  car spots free:        {}", status.car_spots_available);
    println!("  van spots free:        {}", status.van_spots_available);
    println!("  spots taken by vans:   {}", status.spots_taken_by_vans);
}

// ──────────────────── vehicles ────────────────────

fn run_park(cli: &Cli, args: &ParkArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let session = Session::open(cli)?;
    let outcome = session.service.park(&ParkRequest {
        kind: args.kind.code(),
        lot_name: args.lot.clone(),
        license_plate: args.plate.clone(),
    });
    let parked = session.finish(true, outcome)?;

    match mode {
        OutputMode::Human => {
            if !cli.quiet {
                println!(
                    "{} {} ({}) in {} at spaces {:?}",
                    "parked".green().bold(),
                    parked.license_plate.bold(),
                    args.kind,
                    args.lot.trim(),
                    parked.occupied_space_indices
                );
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "park",
            "vehicle_id": parked.vehicle_id,
            "license_plate": parked.license_plate,
            "occupied_space_indices": parked.occupied_space_indices,
        }))?,
    }
    Ok(())
}

fn run_vehicle(cli: &Cli, args: &PlateArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let session = Session::open(cli)?;
    let outcome = session.service.vehicle_status(&args.plate);
    let status = session.finish(false, outcome)?;

    match mode {
        OutputMode::Human => println!(
            "{} parked for {} minute(s)",
            status.license_plate.bold(),
            status.minutes_parked
        ),
        OutputMode::Json => write_json_line(&json!({
            "command": "vehicle",
            "license_plate": status.license_plate,
            "minutes_parked": status.minutes_parked,
        }))?,
    }
    Ok(())
}

fn run_exit(cli: &Cli, args: &PlateArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let session = Session::open(cli)?;
    let outcome = session.service.exit(&args.plate);
    let report = session.finish(true, outcome)?;

    match mode {
        OutputMode::Human => {
            if !cli.quiet {
                println!(
                    "{} {} from {} after {} minute(s); freed spaces {:?}",
                    "released".green().bold(),
                    report.vehicle.license_plate.bold(),
                    report.vehicle.lot,
                    report.minutes_parked,
                    report.freed
                );
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "exit",
            "license_plate": report.vehicle.license_plate,
            "lot": report.vehicle.lot,
            "freed_spaces": report.freed,
            "minutes_parked": report.minutes_parked,
        }))?,
    }
    Ok(())
}

// ──────────────────── history ────────────────────

fn run_history(cli: &Cli, args: &HistoryArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    if !config.logging.sqlite_enabled {
        return Err(CliError::User(
            "history needs SQLite activity logging (logging.sqlite_enabled = true)".to_string(),
        ));
    }
    let db = SqliteLogger::open(&config.paths.sqlite_db)?;
    let rows = match &args.plate {
        Some(plate) => db.activity_for_plate(plate.trim(), args.limit)?,
        None => db.recent_activity(args.limit)?,
    };

    match output_mode(cli) {
        OutputMode::Human => {
            if rows.is_empty() {
                println!("no activity recorded in {}", db.path().display());
            }
            for row in &rows {
                let outcome = if row.success == 1 {
                    row.event_type.green()
                } else {
                    row.event_type.yellow()
                };
                let mut line = format!("{}  {outcome}", row.timestamp);
                for (label, value) in [
                    ("lot", row.lot.as_deref()),
                    ("plate", row.license_plate.as_deref()),
                    ("kind", row.vehicle_kind.as_deref()),
                    ("spaces", row.spaces.as_deref()),
                    ("code", row.error_code.as_deref()),
                ] {
                    if let Some(value) = value {
                        line.push_str(&format!("  {label}={value}"));
                    }
                }
                if let Some(minutes) = row.minutes_parked {
                    line.push_str(&format!("  minutes={minutes}"));
                }
                println!("{line}");
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "history",
            "entries": serde_json::to_value(&rows)?,
        }))?,
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                    "exists": exists,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config show",
                    "config": serde_json::to_value(&config)?,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": true,
                        "path": config.paths.config_file.to_string_lossy(),
                        "hash": hash,
                    }))?,
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "error": e.to_string(),
                        "code": e.code(),
                    }))?,
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("LOT_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
