#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{error, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use unitstate::capture::{self, WifiField};
use unitstate::config::{resolve, ConfigFatal, ConfigPaths, EffectiveConfig};
use unitstate::constants::config::{APP_DIR, DEFAULTS_RESOURCE, STAGING_MOUNT, SYSTEM_CONFIG_DIR};
use unitstate::persistence::{DataFormat, Payload, StatusFile};
use unitstate::session::{self, StatsView};

#[derive(Parser)]
#[command(name = "unitstate", about = "Configuration, status and capture tooling for a wireless unit", version)]
struct Cli {
    /// Directory holding defaults.toml and config.toml
    #[arg(long, global = true, default_value = SYSTEM_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Baseline shipped with this build
    #[arg(long, global = true, default_value = DEFAULTS_RESOURCE)]
    defaults: PathBuf,

    /// Removable volume checked for staged overrides
    #[arg(long, global = true, default_value = STAGING_MOUNT)]
    staging_mount: PathBuf,

    /// Never look for staged overrides
    #[arg(long, global = true)]
    no_staging: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the configuration and print it as TOML
    Config,
    /// Pull wireless fields out of a capture file
    Extract {
        pcap: PathBuf,
        #[arg(long = "field", required = true)]
        fields: Vec<WifiField>,
        /// Report every field separately instead of failing on the first missing one
        #[arg(long)]
        each: bool,
    },
    /// Inspect or write a status file
    Status {
        file: PathBuf,
        /// Plain text file instead of JSON
        #[arg(long)]
        raw: bool,
        #[command(subcommand)]
        action: StatusAction,
    },
    /// List recorded session files
    Sessions { dir: Option<PathBuf> },
    /// Print plot series for a stats view
    Series {
        dir: PathBuf,
        view: StatsView,
        /// Session file name (defaults to the most recent one)
        #[arg(long)]
        session: Option<String>,
    },
}

#[derive(Subcommand)]
enum StatusAction {
    Show,
    /// Write a heartbeat timestamp
    Touch,
    Set { value: String },
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn config_paths(cli: &Cli) -> ConfigPaths {
    let staging = (!cli.no_staging).then(|| cli.staging_mount.clone());
    ConfigPaths::in_dir(&cli.defaults, &cli.config_dir).with_staging_mount(staging)
}

/// Resolve or die: a broken configuration is not something to run with
fn load_config(paths: &ConfigPaths) -> EffectiveConfig {
    resolve(paths).unwrap_or_else(|e| exit_with(paths, &e))
}

fn exit_with(paths: &ConfigPaths, e: &ConfigFatal) -> ! {
    error!(config_dir = %paths.config_dir().display(), error = %e, "Configuration could not be resolved");
    eprintln!("fatal: {e}");
    eprintln!("Fix {} (or remove it to start from the defaults).", paths.user.display());
    std::process::exit(1);
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_extract(pcap: &Path, fields: &[WifiField], each: bool) -> Result<()> {
    if each {
        let report: serde_json::Map<String, Value> = capture::extract_each(pcap, fields)
            .into_iter()
            .map(|(field, result)| {
                let value = match result {
                    Ok(value) => serde_json::to_value(value).unwrap_or(Value::Null),
                    Err(e) => json!({ "error": e.to_string() }),
                };
                (field.to_string().to_lowercase(), value)
            })
            .collect();
        return print_json(&report);
    }

    let found = capture::extract(pcap, fields).with_context(|| format!("extracting from {}", pcap.display()))?;
    print_json(&found)
}

fn run_status(file: PathBuf, raw: bool, action: StatusAction) -> Result<()> {
    let format = if raw { DataFormat::Raw } else { DataFormat::Json };
    let status = StatusFile::open(&file, format)?;

    match action {
        StatusAction::Show => {
            let (updated, data) = status.snapshot();
            let data = match data {
                Some(Payload::Text(text)) => Value::String(text),
                Some(Payload::Json(value)) => value,
                None => Value::Null,
            };
            print_json(&json!({
                "path": file.display().to_string(),
                "format": format.to_string(),
                "updated": updated.map(|t| DateTime::<Local>::from(t).to_rfc3339()),
                "newer_than_1h": status.newer_than_hours(1),
                "data": data,
            }))
        }
        StatusAction::Touch => Ok(status.heartbeat()?),
        StatusAction::Set { value } => {
            let payload = match format {
                DataFormat::Raw => Payload::Text(value),
                DataFormat::Json => Payload::Json(
                    serde_json::from_str(&value).context("status value is not valid JSON")?,
                ),
            };
            Ok(status.update(Some(payload))?)
        }
    }
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    let paths = config_paths(&cli);

    match cli.command {
        Command::Config => {
            let config = load_config(&paths);
            print!("{}", config.to_toml_string().context("rendering configuration")?);
            Ok(())
        }
        Command::Extract { pcap, fields, each } => run_extract(&pcap, &fields, each),
        Command::Status { file, raw, action } => run_status(file, raw, action),
        Command::Sessions { dir } => {
            let dir = dir.unwrap_or_else(default_data_dir);
            for name in session::list_sessions(&dir)? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Series { dir, view, session } => {
            let name = match session {
                Some(name) => name,
                None => session::list_sessions(&dir)?
                    .pop()
                    .with_context(|| format!("no sessions recorded in {}", dir.display()))?,
            };
            print_json(&session::load_series(&dir, &name, view)?)
        }
    }
}
