/// Version injected at compile time via FINSYNC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("FINSYNC_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use finsync::config::Config;
use finsync::resource::{descriptor, refresh_all};
use finsync::{Generation, Operation, ResourceKind, SyncClient};
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Command-line client for the finance tracker API
#[derive(Parser, Debug)]
#[command(name = "finsync", version, about, long_about = None)]
struct Args {
    /// Backend base URL
    #[arg(short, long)]
    base_url: Option<String>,

    /// Backend generation (legacy or modern)
    #[arg(short, long)]
    generation: Option<Generation>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List active entities
    List { resource: ResourceKind },
    /// Fetch one entity by key
    Get { resource: ResourceKind, key: String },
    /// Fetch the totals of one account
    Totals { account: String },
    /// List the children of one parent entity
    ListBy {
        resource: ResourceKind,
        parent: ResourceKind,
        key: String,
    },
    /// Create an entity from JSON (inline or @file)
    Insert { resource: ResourceKind, data: String },
    /// Update an entity; BEFORE addresses it, AFTER is the new content
    Update {
        resource: ResourceKind,
        before: String,
        after: String,
    },
    /// Delete an entity described by JSON
    Delete { resource: ResourceKind, data: String },
    /// List every resource concurrently
    Refresh,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG, when set, refines the --log-level ceiling per module
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("finsync {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("finsync").join("finsync.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".finsync").join("finsync.log");
    }
    PathBuf::from("finsync.log")
}

/// Parse a JSON argument, reading it from a file when prefixed with `@`
fn parse_json_arg(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Argument is not valid JSON")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let mut config = Config::load();
    let base_url = config.effective_base_url(args.base_url.as_deref());
    let generation = config.effective_generation(args.generation);
    tracing::info!("Using {} ({})", base_url, generation);

    let client = config.apply_overrides(SyncClient::new(&base_url, generation)?);

    let touched = run(&client, args.command).await?;

    if let Some(kind) = touched {
        if let Err(e) = config.set_last_resource(kind) {
            tracing::warn!("Failed to save config: {}", e);
        }
    }
    Ok(())
}

/// Execute one command; returns the resource it operated on, if any
async fn run(client: &SyncClient, command: Command) -> Result<Option<ResourceKind>> {
    let kind = match command {
        Command::List { resource } => {
            let items = client.list(resource).await?;
            print_json(&Value::Array(items))?;
            resource
        },
        Command::Get { resource, key } => {
            print_json(&client.get(resource, &key).await?)?;
            resource
        },
        Command::Totals { account } => {
            print_json(&client.totals(&account).await?)?;
            ResourceKind::Totals
        },
        Command::ListBy { resource, parent, key } => {
            let items = client.list_by(resource, parent, &key).await?;
            print_json(&Value::Array(items))?;
            resource
        },
        Command::Insert { resource, data } => {
            let payload = parse_json_arg(&data)?;
            print_json(&client.insert(resource, &payload).await?)?;
            resource
        },
        Command::Update { resource, before, after } => {
            let before = parse_json_arg(&before)?;
            let after = parse_json_arg(&after)?;
            print_json(&client.update(resource, &before, &after).await?)?;
            resource
        },
        Command::Delete { resource, data } => {
            let before = parse_json_arg(&data)?;
            match client.delete(resource, &before).await? {
                finsync::DeleteOutcome::Deleted(value) => print_json(&value)?,
                finsync::DeleteOutcome::AlreadyGone => println!("{} was already deleted", resource),
            }
            resource
        },
        Command::Refresh => {
            refresh(client).await;
            return Ok(None);
        },
    };
    Ok(Some(kind))
}

async fn refresh(client: &SyncClient) {
    let kinds: Vec<ResourceKind> = ResourceKind::ALL
        .into_iter()
        .filter(|kind| descriptor(*kind).operations.contains(&Operation::List))
        .collect();

    for (kind, result) in refresh_all(client, &kinds).await {
        match result {
            Ok(items) => println!("{:<12} {} entries", kind, items.len()),
            Err(e) => eprintln!("{:<12} failed: {}", kind, e),
        }
    }
}
