use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::{opener_from_config, App, PopupState};
use crate::catalog::Catalog;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore, StoreAdapter};

pub mod commands;

use self::commands::{ListArgs, MoveArgs, OpenArgs, PinArgs};

const LOG_FILE: &str = "shortcut-deck.log";

#[derive(Parser, Debug)]
#[command(
    name = "shortcut-deck",
    version,
    about = "Pinned and recent shortcuts to internal browser pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over SHORTCUT_DECK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over SHORTCUT_DECK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Keep pins and recents in memory only; nothing is written to disk
    #[arg(long)]
    pub in_memory: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive popup (default)
    Tui,
    /// Print the composed link list
    List(ListArgs),
    /// Pin a link, or unpin it if already pinned
    Pin(PinArgs),
    /// Record an open and launch the link
    Open(OpenArgs),
    /// Move a pinned link before (or after) another pinned link
    Move(MoveArgs),
    /// Move pins from the legacy local area into synced storage
    Migrate,
}

enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    // The popup owns the terminal, so its logs go to a file.
    let log_target = match command {
        Commands::Tui => LogTarget::File(paths.log_dir.join(LOG_FILE)),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);

    let backend: Arc<dyn KeyValueStore> = if cli.in_memory {
        Arc::new(MemoryStore::default())
    } else {
        Arc::new(SqliteStore::open(&config.storage)?)
    };
    let store = StoreAdapter::from_options(backend, &config.storage)
        .context("starting background store writer")?;

    if !matches!(command, Commands::Migrate) {
        match store.migrate_storage() {
            Ok(outcome) => tracing::debug!(?outcome, "startup storage migration"),
            Err(err) => tracing::warn!(?err, "startup storage migration failed"),
        }
    }

    let catalog = Arc::new(Catalog::builtin(&config.links.uri_scheme));
    let now = OffsetDateTime::now_utc();
    let mut popup = PopupState::load(
        catalog,
        store.clone(),
        &config.recency,
        opener_from_config(&config.links),
        now,
    );

    let result = match command {
        Commands::Tui => {
            let mut app = App::new(config.clone(), popup);
            commands::run_tui(&mut app)
        }
        Commands::List(args) => commands::list_links(&popup, &args, now),
        Commands::Pin(args) => commands::pin_link(&mut popup, &args),
        Commands::Open(args) => commands::open_link(&mut popup, &args, now),
        Commands::Move(args) => commands::move_pin(&mut popup, &args),
        Commands::Migrate => commands::migrate(&store),
    };
    store.flush();
    result
}

fn init_tracing(level: &str, target: LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
