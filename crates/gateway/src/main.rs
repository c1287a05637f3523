//! Repository Gateway - serves access-controlled file repositories over HTTP.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_lib::config::GatewayConfig;

#[derive(Parser)]
#[command(name = "repository-gateway")]
#[command(about = "Access-controlled multi-repository file server")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository definitions file
    #[arg(long, global = true, env = "REPOSITORIES_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long, env = "SERVER_HOST")]
        host: Option<String>,
        #[arg(long, env = "SERVER_PORT")]
        port: Option<u16>,
    },
    /// Validate configuration and repository definitions, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GatewayConfig::from_env()?;
    if let Some(path) = cli.config {
        config.repositories_file = path;
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            gateway_lib::run_server_with_config(config).await?;
        }
        Commands::CheckConfig => {
            let registry = gateway_lib::load_registry(&config)?;
            for repository in registry.iter() {
                info!(
                    name = %repository.name,
                    public = repository.is_public,
                    groups = repository.access_groups.len(),
                    users = repository.access_users.len(),
                    expression = repository.expression().is_some(),
                    cache_rules = repository.cache_rules.len(),
                    "Repository"
                );
            }
            info!(
                "Configuration OK: {} repositories from {}",
                registry.len(),
                config.repositories_file.display()
            );
        }
    }

    Ok(())
}
