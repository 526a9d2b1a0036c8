use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::path::PathBuf;
use std::process;
use tasklist::{Config, TaskList, TaskStore, TaskStoreError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "Keep a persistent list of short tasks")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (overrides config)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all tasks
    List {
        /// Include ids and creation times
        #[arg(short, long)]
        long: bool,
    },

    /// Add a task
    Add {
        #[arg(required = true)]
        title: Vec<String>,
    },

    /// Rename the task at row N
    Edit {
        #[arg(value_parser = parse_row)]
        row: usize,
        #[arg(required = true)]
        title: Vec<String>,
    },

    /// Delete the task at row N
    Rm {
        #[arg(value_parser = parse_row)]
        row: usize,
    },

    /// Rebuild the cache from the task log
    Sync,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(path) = cli.store_path {
        config.data_dir = path;
    }

    // Setup tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    info!(config = ?cli.config, data_dir = ?config.data_dir, log_level = %config.log_level, "Configuration loaded");

    // Without storage there is nothing to do
    let mut store = TaskStore::open(&config.data_dir)?;
    info!(path = ?store.base_path(), "Task store ready");
    let mut list = TaskList::new();

    let outcome = run(cli.command, &mut store, &mut list);
    store.close()?;

    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            eprintln!("{} {}", "error:".red().bold(), e);
            process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn run(command: Commands, store: &mut TaskStore, list: &mut TaskList) -> Result<(), TaskStoreError> {
    list.load(store)?;

    match command {
        Commands::List { long } => print_list(list, long),
        Commands::Add { title } => {
            let index = list.add(store, &title.join(" "))?;
            println!("{} {}", "Added".green(), row_label(index));
        }
        Commands::Edit { row, title } => {
            let index = row - 1;
            list.rename(store, index, &title.join(" "))?;
            println!("{} {}", "Renamed".green(), row_label(index));
        }
        Commands::Rm { row } => {
            let index = row - 1;
            let task = list.remove(store, index)?;
            println!("{} {}", "Deleted".green(), task.title);
        }
        Commands::Sync => {
            let count = store.sync()?;
            println!("Synced {} tasks", count);
        }
    }

    Ok(())
}

fn print_list(list: &TaskList, long: bool) {
    if list.is_empty() {
        println!("{}", "No tasks".dimmed());
        return;
    }

    for (index, task) in list.tasks().iter().enumerate() {
        let label = format!("{:>3}.", index + 1).bold();
        if long {
            println!(
                "{} {}  {}  {}",
                label,
                task.title,
                task.id.to_string().dimmed(),
                format_time(task.created_at).dimmed()
            );
        } else {
            println!("{} {}", label, task.title);
        }
    }
}

/// Parse a 1-based row number
fn parse_row(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("rows are numbered from 1".to_string()),
        Ok(row) => Ok(row),
        Err(e) => Err(format!("invalid row number: {}", e)),
    }
}

fn row_label(index: usize) -> String {
    format!("row {}", index + 1)
}

fn format_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
