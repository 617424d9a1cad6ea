//! factsync CLI - fetch facts, keep them locally, watch the list change

use anyhow::Context;
use clap::{Parser, Subcommand};
use factsync::config::{self, FactsyncConfig};
use factsync::storage::Store;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "factsync")]
#[command(version)]
#[command(about = "Fetch facts from a remote API, persist them locally and watch the list update live")]
#[command(long_about = r#"
factsync keeps a local list of facts fetched from a remote JSON API.

Example usage:
  factsync init
  factsync fetch
  factsync watch
  factsync clear
  factsync serve --bind 127.0.0.1:7878
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Remote facts endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Number of facts to request per fetch
    #[arg(long, global = true)]
    count: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter factsync.toml and ignore the database directory
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Fetch a batch of facts and store them
    Fetch,

    /// Delete every stored fact
    Clear,

    /// Delete specific facts by id
    Delete {
        /// Fact ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Print the stored facts
    List {
        /// Render as a table
        #[arg(short, long)]
        table: bool,
    },

    /// Show the fact list and follow changes until interrupted
    Watch,

    /// Show statistics about the local store
    Stats,

    /// Serve the fact list and actions over HTTP
    Serve {
        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputMode::Human)
    }
}

/// Print a command result; JSON mode wraps it in a success envelope
pub fn emit_success(mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    let out = match mode {
        OutputMode::Json => serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        }),
        OutputMode::Human => data,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Settings resolved from flags, config file and defaults
pub struct Settings {
    pub config: FactsyncConfig,
    pub database: PathBuf,
}

impl Settings {
    fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
        if let Some(endpoint) = &cli.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(count) = cli.count {
            config.count = Some(count);
        }
        let database = cli
            .database
            .clone()
            .unwrap_or_else(|| config.database_path(Path::new(".")));
        Ok(Self { config, database })
    }

    /// Open the store, creating the database directory if needed
    pub fn open_store(&self) -> anyhow::Result<Store> {
        config::ensure_db_dir(&self.database)?;
        Store::open(&self.database)
            .with_context(|| format!("failed to open fact store at {}", self.database.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    // Init must not depend on the existing config parsing
    if let Commands::Init { force } = cli.command {
        return commands::run_init(mode, cli.config.as_deref(), force);
    }
    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Fetch => {
            commands::run_fetch(mode, &settings).await?;
        }
        Commands::Clear => {
            commands::run_clear(mode, &settings).await?;
        }
        Commands::Delete { ids } => {
            commands::run_delete(mode, &settings, &ids).await?;
        }
        Commands::List { table } => {
            commands::run_list(mode, &settings, table).await?;
        }
        Commands::Watch => {
            commands::run_watch(&settings).await?;
        }
        Commands::Stats => {
            commands::run_stats(mode, &settings).await?;
        }
        Commands::Serve { bind } => {
            commands::run_serve(&settings, bind).await?;
        }
        Commands::Version => {
            commands::run_version(mode)?;
        }
    }

    Ok(())
}
