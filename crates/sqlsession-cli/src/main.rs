//! sqlsession operator CLI.
//!
//! ```bash
//! # Create the session tables
//! sqlsession --db sessions.db init-schema
//!
//! # Delete expired sessions once, or every 60 seconds
//! sqlsession --db sessions.db sweep
//! sqlsession --db sessions.db sweep --every 60
//!
//! # Inspect
//! sqlsession --db sessions.db show <session-id>
//! sqlsession --db sessions.db by-principal amy
//! ```
//!
//! Settings come from `--config <file.toml>` (see `SessionStoreConfig`);
//! `--table` overrides the configured table name.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use sqlsession_store::{SessionRepository, SessionStoreConfig, SqliteDatabase};
use sqlsession_types::Session;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect and maintain a sqlsession database.
#[derive(Parser, Debug)]
#[command(name = "sqlsession")]
#[command(about = "Inspect and maintain a sqlsession SQLite database")]
struct Cli {
    /// SQLite database file
    #[arg(long, default_value = "sessions.db")]
    db: PathBuf,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session table name (overrides the config file)
    #[arg(long)]
    table: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Create the session and attribute tables if missing
    InitSchema,

    /// Delete expired sessions
    Sweep {
        /// Repeat every N seconds instead of running once
        #[arg(long)]
        every: Option<u64>,
    },

    /// Print one session as JSON
    Show { id: String },

    /// Print every session for a principal as JSON
    ByPrincipal { name: String },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => SessionStoreConfig::load(path)?,
        None => SessionStoreConfig::default(),
    };
    if let Some(table) = &cli.table {
        config = config.with_table_name(table.clone());
    }

    let db = Arc::new(
        SqliteDatabase::open(&cli.db)
            .with_context(|| format!("opening {}", cli.db.display()))?,
    );
    let repo = SessionRepository::builder()
        .config(&config)
        .database(db.clone())
        .build()?;

    match cli.command {
        Command::InitSchema => {
            db.init_schema(&config.table_name)?;
            tracing::info!("Schema ready in {}", cli.db.display());
        }
        Command::Sweep { every: None } => {
            repo.clean_up_expired_sessions()?;
        }
        Command::Sweep { every: Some(secs) } => {
            let period = Duration::from_secs(secs.max(1));
            tracing::info!("Sweeping every {:?}", period);
            loop {
                if let Err(e) = repo.clean_up_expired_sessions() {
                    tracing::warn!("Sweep failed: {}", e);
                }
                std::thread::sleep(period);
            }
        }
        Command::Show { id } => match repo.find_by_id(&id)? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session_json(&session))?),
            None => anyhow::bail!("no live session {id}"),
        },
        Command::ByPrincipal { name } => {
            let mut sessions: Vec<_> = repo.find_by_principal_name(&name)?.into_values().collect();
            sessions.sort_by_key(|s| s.creation_time());
            let out: Vec<_> = sessions.iter().map(session_json).collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn session_json(session: &Session) -> serde_json::Value {
    let attributes: serde_json::Map<String, serde_json::Value> = session
        .attribute_names()
        .into_iter()
        .filter_map(|name| {
            let value = session.peek_attribute(&name)?.clone();
            Some((name, value))
        })
        .collect();
    json!({
        "id": session.id().as_str(),
        "primary_key": session.primary_key().to_string(),
        "principal": session.principal_name(),
        "creation_time": session.creation_time(),
        "last_accessed_time": session.last_accessed_time(),
        "max_inactive_interval_secs": session.max_inactive_interval().as_secs(),
        "expiry_time": session.expiry_time(),
        "attributes": attributes,
    })
}
