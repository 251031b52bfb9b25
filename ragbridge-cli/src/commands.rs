//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use ragbridge_core::config::{self, BridgeConfig};
use ragbridge_core::{AskQuestion, ChatService, ChatTurn, build_payload, normalize_body};
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Ask {
            question,
            repository_id,
            conversation_id,
            history,
        } => {
            let config = load(workspace, config_file)?;
            let ask = AskQuestion {
                question,
                repository_id,
                conversation_id,
                history: read_history(history.as_deref())?,
                correlation_id: None,
            };
            handle_ask(&config, ask).await
        }
        Commands::Payload {
            question,
            repository_id,
            history,
        } => {
            let config = load(workspace, config_file)?;
            let turns = read_history(history.as_deref())?;
            let request = build_payload(
                question.trim(),
                repository_id.as_deref(),
                &turns,
                &config.orchestration,
            );
            println!("{}", serde_json::to_string_pretty(&request)?);
            Ok(())
        }
        Commands::Parse { file } => {
            let body = read_input(file.as_deref())?;
            let reply = normalize_body(&body);
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
        Commands::Serve { host, port } => {
            let mut config = load(workspace, config_file)?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            handle_serve(config).await
        }
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

fn load(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    let loaded = match config_file {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Some(workspace), None),
    };
    loaded.map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

async fn handle_ask(config: &BridgeConfig, ask: AskQuestion) -> anyhow::Result<()> {
    let service = ChatService::from_config(config)?;
    let answer = service.ask(ask).await.map_err(|e| {
        anyhow::anyhow!("{} (HTTP {}, {})", e, e.status_code(), e.code())
    })?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

async fn handle_serve(config: BridgeConfig) -> anyhow::Result<()> {
    for warning in config.validate() {
        warn!("{}", warning);
    }
    eprintln!(
        "RagBridge gateway listening on http://{}:{}",
        config.gateway.host, config.gateway.port
    );
    ragbridge_core::gateway::serve_gateway(&config).await?;
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = config::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml_str = toml::to_string_pretty(&BridgeConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_file)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Validate => {
            let config = load(workspace, config_file)?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings ({}):", warnings.len());
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
            Ok(())
        }
    }
}

/// Read conversation history from a JSON file. No file means no history.
fn read_history(path: Option<&Path>) -> anyhow::Result<Vec<ChatTurn>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read history {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Invalid history file {}: {}", path.display(), e))
}

/// Read a response body from a file, or from stdin when no file is given.
fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            Ok(body)
        }
    }
}
