use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use parley::api::{Backend, HttpBackend, KnowledgeSource};
use parley::clipboard::SystemClipboard;
use parley::config::Config;
use parley::conversation::ConversationController;
use parley::ui::ChatApp;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version = "0.1.0")]
#[command(about = "Terminal chat client with history, suggestions, and snippet copy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reload a knowledge source on the backend
    Refresh {
        #[arg(value_enum)]
        source: KnowledgeSource,
    },
    /// Print the outcome of the last knowledge-source load
    Outcome,
}

/// Logs go to a file in TUI mode so they don't tear the alternate screen.
fn init_file_logging(config: &Config) -> Result<()> {
    let path = config.log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = fs::File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_chat(config: Config) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(&config)?);
    let clipboard = Box::new(SystemClipboard::new()?);
    let controller = Arc::new(Mutex::new(ConversationController::new(
        backend, clipboard, &config,
    )));
    ChatApp::new(controller).run().await
}

async fn run_refresh(config: Config, source: KnowledgeSource) -> Result<()> {
    let backend = HttpBackend::new(&config)?;
    let response = backend.refresh_source(source).await?;
    println!("{}: {}", source.display_name(), response);
    Ok(())
}

async fn run_outcome(config: Config) -> Result<()> {
    let backend = HttpBackend::new(&config)?;
    let outcome = backend.last_load_outcome().await;
    println!("{outcome}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        None => {
            init_file_logging(&config)?;
            run_chat(config).await
        }
        Some(Commands::Refresh { source }) => {
            init_stderr_logging();
            run_refresh(config, source).await
        }
        Some(Commands::Outcome) => {
            init_stderr_logging();
            run_outcome(config).await
        }
    }
}
