use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use multistep_forms::config::{Config, LOCAL_CONFIG_FILE};
use multistep_forms::logging;
use multistep_forms::rest::{self, demo, AppState};

#[derive(Parser)]
#[command(name = "multistep-forms")]
#[command(about = "Session-backed multi-step form server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo sign-up form (default)
    Serve {
        /// Address to bind (default: 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: 7010)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect or write configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write the effective configuration to a file
    Init {
        /// Destination (default: ./multistep-forms.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    let logging_handle = logging::init_logging(&config, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Some(Commands::Config { action }) => cmd_config(&config, action),
        Some(Commands::Serve { host, port }) => cmd_serve(config, host, port).await,
        None => cmd_serve(config, None, None).await,
    }
}

async fn cmd_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr = config.server.socket_addr()?;
    let state = AppState::with_configured_views(config, demo::definition());
    rest::serve(state, addr).await
}

fn cmd_config(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Init { output, force } => {
            let path = output.unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            config.save(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
