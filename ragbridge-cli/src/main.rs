//! RagBridge CLI: ask grounded questions, inspect payloads and replies, and
//! run the HTTP gateway.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// RagBridge: grounded answers from an orchestration service
#[derive(Parser, Debug)]
#[command(name = "ragbridge", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (replaces the user and workspace config files)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Ask a question against the live orchestration service
    Ask {
        /// The question to answer
        question: String,
        /// Vector repository to ground against
        #[arg(long)]
        repository_id: Option<String>,
        /// Conversation id echoed in the answer
        #[arg(long)]
        conversation_id: Option<String>,
        /// JSON file with prior turns: `[{"role": "user", "content": "..."}]`
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Print the orchestration request body without sending it
    Payload {
        /// The question to build the request for
        question: String,
        /// Vector repository to ground against
        #[arg(long)]
        repository_id: Option<String>,
        /// JSON file with prior turns
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Normalize a raw orchestration response (reads stdin when no file is given)
    Parse {
        /// File containing the raw response body
        file: Option<PathBuf>,
    },
    /// Run the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
    /// Check the configuration and print warnings
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    let log_dir = directories::ProjectDirs::from("dev", "ragbridge", "ragbridge")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ragbridge.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}
