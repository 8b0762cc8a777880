use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app::App;
use crate::errors::ToolError;
use crate::mcp::server::run_stdio;
use crate::services::config::{Config, ToolGroup};
use crate::services::credentials::{CredentialStore, FileCredentialStore, TokenSource};

#[derive(Parser)]
#[command(name = "relay")]
#[command(author, version, about = "MCP server exposing task, weather, calendar and GraphQL tools", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,
    /// Manage stored API tokens
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Print the tool registry as JSON
    Tools,
    /// Print the resolved configuration (secrets redacted)
    Config,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Read a token from stdin and store it
    Set {
        #[arg(long, value_enum)]
        template: ToolGroup,
    },
    /// Report whether a token is stored
    Check {
        #[arg(long, value_enum)]
        template: ToolGroup,
    },
    /// Delete the stored token
    Remove {
        #[arg(long, value_enum)]
        template: ToolGroup,
    },
}

fn token_source(config: &Config, group: ToolGroup) -> Result<TokenSource, ToolError> {
    let store: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::open(config.credentials_path.clone())?);
    TokenSource::for_group(store, group).ok_or_else(|| {
        ToolError::invalid_params(format!(
            "Template '{}' does not use a stored token",
            group
        ))
        .with_hint("The weather template reads OPENWEATHER_API_KEY from the environment.")
    })
}

async fn read_token_from_stdin() -> Result<String, ToolError> {
    eprintln!("Paste the API token and press Enter:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

async fn run_auth(command: AuthCommands) -> Result<(), ToolError> {
    let config = Config::from_env()?;
    match command {
        AuthCommands::Set { template } => {
            let source = token_source(&config, template)?;
            let token = read_token_from_stdin().await?;
            source.set_token(&token).await?;
            if source.get_token().await? != token {
                return Err(ToolError::internal("Stored token could not be read back"));
            }
            println!("✅ Token stored for {} ({})", template, source.service());
        }
        AuthCommands::Check { template } => {
            let source = token_source(&config, template)?;
            if source.has_token().await? {
                println!("✅ Token found for {}", template);
            } else {
                println!("❌ No token stored for {}", template);
            }
        }
        AuthCommands::Remove { template } => {
            let source = token_source(&config, template)?;
            if source.remove_token().await? {
                println!("🗑️  Token removed for {}", template);
            } else {
                println!("No token stored for {}", template);
            }
        }
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), ToolError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| ToolError::internal(err.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

pub async fn run() -> Result<(), ToolError> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_stdio(App::from_env()?).await,
        Commands::Auth { command } => run_auth(command).await,
        Commands::Tools => {
            let app = App::from_env()?;
            print_json(&serde_json::json!({"tools": app.dispatcher.registry().descriptors()}))
        }
        Commands::Config => print_json(&Config::from_env()?),
    }
}
