// todo-plus/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use todo_plus::{ReminderScheduler, ScanTrigger, TodoItem, Workspace};

#[derive(Parser)]
#[command(name = "todo-plus", version, about = "Track TODO comments with durable ids and sidecar metadata")]
struct Args {
    /// Project root (defaults to the current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the workspace and list every annotation
    Scan {
        /// Emit machine-readable JSON instead of the plain listing
        #[arg(long)]
        json: bool,
    },
    /// Assign stable ids to untracked annotations and persist their records
    Track {
        /// Limit to one file (default: every relevant file)
        file: Option<PathBuf>,
    },
    /// Drop sidecar records whose annotation no longer exists in source
    Purge,
    /// Watch the workspace and re-scan files as their changes settle
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let workspace = Workspace::open(&args.root)?;
    match args.command {
        Command::Scan { json } => scan(&workspace, json).await,
        Command::Track { file } => track(&workspace, file).await,
        Command::Purge => workspace.resolver().purge().await,
        Command::Watch => watch(&workspace).await,
    }
}

async fn scan(workspace: &Workspace, json: bool) -> Result<()> {
    workspace.initialize().await?;
    let items = workspace.scan_all().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    for item in &items {
        print_item(item);
    }
    Ok(())
}

fn print_item(item: &TodoItem) {
    let id = item.id.as_deref().unwrap_or("untracked");
    println!(
        "{}:{} [{}] {}",
        item.file_uri,
        item.todo_line_index() + 1,
        id,
        item.text.trim()
    );
}

async fn track(workspace: &Workspace, file: Option<PathBuf>) -> Result<()> {
    let files = match file {
        Some(path) => vec![path],
        None => workspace.relevant_files(),
    };
    let mut total = 0;
    for path in files {
        total += workspace.track_file(&path).await?;
    }
    info!(total, "annotations tracked");
    Ok(())
}

async fn watch(workspace: &Workspace) -> Result<()> {
    workspace.initialize().await?;
    let window = Duration::from_millis(workspace.settings().scan_debounce_ms);
    let mut trigger = ScanTrigger::new(workspace.root(), window)?;
    let (scheduler, mut reminders) = ReminderScheduler::new();

    // Arm reminders from the initial scan; OnStartup ones fire here.
    for item in workspace.scan_all().await? {
        if let (Some(id), Some(reminder)) = (&item.id, &item.reminder) {
            scheduler.arm(id, &item.file_uri, &item.text, reminder, true);
        }
    }
    info!(root = %workspace.root().display(), "watching");

    loop {
        tokio::select! {
            changed = trigger.next() => {
                let Some(path) = changed else { break };
                match workspace.scan_file(&path).await {
                    Ok(Some(items)) => {
                        for item in &items {
                            print_item(item);
                            if let (Some(id), Some(reminder)) = (&item.id, &item.reminder) {
                                scheduler.arm(id, &item.file_uri, &item.text, reminder, false);
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(path = %path.display(), %err, "re-scan failed"),
                }
            }
            due = reminders.recv() => {
                let Some(event) = due else { break };
                println!("reminder [{}] {}: {}", event.id, event.file_uri, event.text.trim());
            }
        }
    }
    Ok(())
}
