//! CLI entry point for task-organizer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use task_organizer_app::{ProjectConfig, StoreConfig};
use task_organizer_store::{FileStore, FirebaseStore, MemoryStore};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use view::TaskRef;

mod commands;
mod view;

/// How long commands wait for the first snapshot of the collection.
const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Realtime task list kept in a shared record store.
#[derive(Parser, Debug)]
#[command(
    name = "task-organizer",
    version,
    about = "task-organizer: a shared task list synced through a record store"
)]
struct Cli {
    /// Project directory holding `.task-organizer/` (defaults to current).
    #[arg(long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default configuration.
    Init {
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,
    },

    /// Add a task at the end of the list.
    Add {
        #[arg(long)]
        text: String,
    },

    /// List tasks and completed tasks.
    Ls {
        /// Case-insensitive text filter.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = ListFormat::Text)]
        format: ListFormat,
    },

    /// Replace the text of a task.
    Edit {
        /// Record key or `#N` display number.
        #[arg(long, allow_hyphen_values = true)]
        task: TaskRef,
        #[arg(long)]
        text: String,
    },

    /// Delete a task.
    Rm {
        /// Record key or `#N` display number.
        #[arg(long, allow_hyphen_values = true)]
        task: TaskRef,
    },

    /// Toggle completion; a task that ends up completed is removed.
    Done {
        /// Record key or `#N` display number.
        #[arg(long, allow_hyphen_values = true)]
        task: TaskRef,
    },

    /// Print the list again on every change.
    Watch {
        /// Case-insensitive text filter.
        #[arg(long)]
        search: Option<String>,
    },
}

/// Output format for `ls`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let Cli { dir, cmd } = Cli::parse();
    install_tracing();

    let project_dir = dir.unwrap_or_else(|| PathBuf::from("."));
    execute_command(&project_dir, cmd)
}

fn execute_command(project_dir: &Path, command: Command) -> Result<()> {
    if let Command::Init { force } = command {
        let path = ProjectConfig::init(project_dir, force)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let config = ProjectConfig::load(project_dir)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let collection = config.collection();
        match config.store() {
            StoreConfig::Memory => commands::run(command, MemoryStore::new(), collection).await,
            StoreConfig::File { .. } => {
                let path = config
                    .data_file(project_dir)
                    .context("file backend has no data file")?;
                let store = FileStore::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                commands::run(command, store, collection).await
            }
            StoreConfig::Firebase { url } => {
                let store = FirebaseStore::new(url)
                    .with_context(|| format!("failed to configure store at {url}"))?;
                commands::run(command, store, collection).await
            }
        }
    })
}

fn install_tracing() {
    // RUST_LOG overrides the INFO default; stdout stays reserved for command output.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .try_init();
}
