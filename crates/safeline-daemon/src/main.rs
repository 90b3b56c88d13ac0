//! Safeline Daemon - safety incident lifecycle service
//!
//! The daemon provides:
//! - Public site resolution and report intake behind scanned site codes
//! - Staff APIs for status changes, assignment and listing
//! - Dashboard statistics

use clap::Parser;
use safeline_daemon::config::{DaemonConfig, DirectoryConfig, StorageConfig};
use safeline_daemon::error::{DaemonError, DaemonResult};
use safeline_daemon::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Safeline Daemon CLI
#[derive(Parser)]
#[command(name = "safelined")]
#[command(about = "Safeline Daemon - safety incident lifecycle service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SAFELINE_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "SAFELINE_LISTEN_ADDR")]
    listen: Option<String>,

    /// Directory fixture for the in-memory directory
    #[arg(long, env = "SAFELINE_SEED")]
    seed: Option<String>,

    /// Log level
    #[arg(long, env = "SAFELINE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SAFELINE_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if let Some(seed) = cli.seed {
        config.directory = DirectoryConfig::Memory {
            seed_path: Some(seed),
        };
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let storage = match &config.storage {
        StorageConfig::Memory => "memory",
        StorageConfig::Postgres { .. } => "postgres",
    };
    let directory = match &config.directory {
        DirectoryConfig::Memory { .. } => "memory",
        DirectoryConfig::Postgres { .. } => "postgres",
    };

    // Print startup banner
    println!(
        r#"
  ____         __      _ _
 / ___|  __ _ / _| ___| (_)_ __   ___
 \___ \ / _` | |_ / _ \ | | '_ \ / _ \
  ___) | (_| |  _|  __/ | | | | |  __/
 |____/ \__,_|_|  \___|_|_|_| |_|\___|

  Safeline - Incident Lifecycle Service
  Version: {}
  Storage: {}
  Directory: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        storage,
        directory,
        config.server.listen_addr
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await
}
