//! Origin binary

use clap::{Parser, Subcommand};
use fedplane::{common::Config, OriginServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fedplane-origin")]
#[command(about = "fedplane origin: director test endpoint and heartbeat watchdog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start origin server
    Serve {
        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Config file (defaults to $FEDPLANE_CONFIG, then fedplane.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Seconds without a director test report before the director is marked critical
        #[arg(long)]
        director_test_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            id,
            config,
            bind,
            director_test_timeout,
        } => {
            // Load config from file, then override with CLI arguments
            let config = match config {
                Some(path) => Config::load_from(&path)?,
                None => Config::load()?,
            };

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.as_str().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let mut origin_config = config.origin.ok_or_else(|| {
                anyhow::anyhow!("[origin] section with [origin.auth] is required to run an origin")
            })?;
            if let Some(bind) = bind {
                origin_config.bind_addr = bind;
            }
            if let Some(secs) = director_test_timeout {
                anyhow::ensure!(secs > 0, "--director-test-timeout must be non-zero");
                origin_config.director_test_timeout_secs = secs;
            }

            let node_id = id.unwrap_or(config.node_id);
            OriginServer::new(origin_config, node_id).serve().await?;
        }
    }

    Ok(())
}
