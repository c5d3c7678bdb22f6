mod app;
mod check_config_cmd;
mod config;
mod output;
mod sign_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use devauth_config::load_and_prepare;
use devauth_logging::{init_logger, LoggingOptions};

use config::{resolve_config_path, Settings};

#[derive(Parser)]
#[command(name = "devauth")]
#[command(about = "devauth: device authentication and token service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the devauth HTTP server
    Serve {
        /// Config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Load and validate a config file without starting the server
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Sign an auth request body with a device private key
    Sign {
        /// Device private key (PEM)
        #[arg(short, long)]
        key: PathBuf,
        /// Request body; stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let path = resolve_config_path(config);
            let (config, warnings) = load_and_prepare(&path).await?;
            let mut settings = Settings::from_config(&config)?;
            if let Some(port) = port {
                settings.port = port;
            }
            init_logger(&settings.logging)?;
            for warning in &warnings {
                warn!(path = %warning.path, message = %warning.message, "Config warning");
            }
            info!(config = %path.display(), "Configuration loaded");
            app::run_server(settings).await?;
        }
        Commands::CheckConfig { config } => {
            init_logger(&LoggingOptions { level: "warn".into(), ..Default::default() })?;
            check_config_cmd::run(&resolve_config_path(config)).await?;
        }
        Commands::Sign { key, file } => {
            sign_cmd::run(&key, file.as_deref()).await?;
        }
    }

    Ok(())
}
